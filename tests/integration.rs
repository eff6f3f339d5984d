//! End-to-end coverage of both watch engines against real temp directories,
//! plus a smoke test of the `dirwatch` binary via subprocess (Cargo sets
//! `CARGO_BIN_EXE_dirwatch` to the compiled binary for the current profile).
//!
//! Timing strategy: workers attach asynchronously after `start()`, so tests
//! give them a short head start, then poll a shared batch log with a
//! generous deadline instead of sleeping fixed amounts.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use dirwatch::{Batch, EventMask, Filter, Monitor, Poller};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Thread-safe log of delivered batches, stored as their canonical paths.
#[derive(Clone, Default)]
struct BatchLog {
    batches: Arc<Mutex<Vec<Vec<PathBuf>>>>,
}

impl BatchLog {
    /// Handler to pass to `connect`.
    fn recorder(&self) -> impl Fn(&Batch) + Send + Sync + 'static {
        let batches = Arc::clone(&self.batches);
        move |batch: &Batch| {
            let paths: Vec<PathBuf> = batch.paths().map(Path::to_path_buf).collect();
            batches.lock().unwrap().push(paths);
        }
    }

    fn len(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    fn snapshot(&self) -> Vec<Vec<PathBuf>> {
        self.batches.lock().unwrap().clone()
    }
}

/// Poll `ready` every 10ms until it holds or `deadline` passes.
fn wait_until(deadline: Duration, mut ready: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if ready() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    ready()
}

/// Give freshly-started workers time to register their watches.
fn settle() {
    thread::sleep(Duration::from_millis(300));
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().expect("fixture path should canonicalize")
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[test]
fn monitor_delivers_one_batch_for_one_close_write() {
    let dir = tempfile::tempdir().expect("tempdir");
    let monitor = Monitor::new();
    monitor
        .add_directory(
            dir.path(),
            Filter::default().with_events(EventMask::CLOSE_WRITE),
        )
        .expect("register tempdir");

    let log = BatchLog::default();
    let _tap = monitor.connect(log.recorder());

    monitor.start();
    settle();
    fs::write(dir.path().join("a.txt"), "payload").unwrap();

    assert!(
        wait_until(Duration::from_secs(5), || log.len() >= 1),
        "a close-after-write should produce a batch"
    );
    monitor.stop();

    let batches = log.snapshot();
    assert_eq!(
        batches.len(),
        1,
        "exactly one batch for one close-after-write, got {batches:?}"
    );
    assert_eq!(batches[0], vec![canonical(&dir.path().join("a.txt"))]);
}

#[test]
fn monitor_skips_records_outside_the_event_mask() {
    let dir = tempfile::tempdir().expect("tempdir");
    let monitor = Monitor::new();
    // fs::write raises create, modify and close-write; none is a delete.
    monitor
        .add_directory(dir.path(), Filter::default().with_events(EventMask::DELETE))
        .expect("register tempdir");

    let log = BatchLog::default();
    let _tap = monitor.connect(log.recorder());

    monitor.start();
    settle();
    fs::write(dir.path().join("a.txt"), "payload").unwrap();

    assert!(
        !wait_until(Duration::from_millis(500), || log.len() >= 1),
        "no record intersects a delete-only mask, got {:?}",
        log.snapshot()
    );
    monitor.stop();
}

#[test]
fn monitor_pattern_admits_only_matching_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    let monitor = Monitor::new();
    monitor
        .add_directory(
            dir.path(),
            Filter::new("logs", r"\.log$").with_events(EventMask::CLOSE_WRITE),
        )
        .expect("register tempdir");

    let log = BatchLog::default();
    let _tap = monitor.connect(log.recorder());

    monitor.start();
    settle();
    fs::write(dir.path().join("noise.txt"), "skipped").unwrap();
    fs::write(dir.path().join("kept.log"), "reported").unwrap();

    let expected = canonical(&dir.path().join("kept.log"));
    assert!(
        wait_until(Duration::from_secs(5), || log
            .snapshot()
            .iter()
            .any(|batch| batch.contains(&expected))),
        "the matching file should be delivered"
    );
    monitor.stop();

    let noise = canonical(&dir.path().join("noise.txt"));
    assert!(
        log.snapshot().iter().all(|batch| !batch.contains(&noise)),
        "a path that fails the pattern search must never be delivered"
    );
}

#[test]
fn monitor_registration_failure_faults_one_worker_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let good = dir.path().join("good");
    let doomed = dir.path().join("doomed");
    fs::create_dir(&good).unwrap();
    fs::create_dir(&doomed).unwrap();

    let monitor = Monitor::new();
    monitor
        .add_directory(&good, Filter::default().with_events(EventMask::CLOSE_WRITE))
        .expect("register good");
    monitor
        .add_directory(&doomed, Filter::default())
        .expect("register doomed");
    // Gone before start(): its worker must fail to register its watch.
    fs::remove_dir(&doomed).unwrap();

    let log = BatchLog::default();
    let _tap = monitor.connect(log.recorder());
    let faults: Arc<Mutex<Vec<(PathBuf, String)>>> = Arc::default();
    let fault_log = Arc::clone(&faults);
    let _sentinel = monitor.connect_faults(move |fault| {
        fault_log
            .lock()
            .unwrap()
            .push((fault.path.clone(), fault.error.to_string()));
    });

    monitor.start();
    assert!(
        wait_until(Duration::from_secs(5), || !faults.lock().unwrap().is_empty()),
        "the doomed worker should publish a fault"
    );
    {
        let faults = faults.lock().unwrap();
        assert_eq!(faults[0].0, doomed);
        assert!(
            faults[0].1.contains("failed to register a watch"),
            "unexpected fault: {}",
            faults[0].1
        );
    }

    // The sibling worker is unaffected.
    settle();
    fs::write(good.join("alive.txt"), "still watching").unwrap();
    let expected = canonical(&good.join("alive.txt"));
    assert!(
        wait_until(Duration::from_secs(5), || log
            .snapshot()
            .iter()
            .any(|batch| batch.contains(&expected))),
        "the healthy worker should keep delivering"
    );
    monitor.stop();
}

#[test]
fn monitor_stop_completes_without_any_filesystem_activity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let monitor = Arc::new(Monitor::new());
    monitor
        .add_directory(dir.path(), Filter::default())
        .expect("register tempdir");
    monitor.start();
    settle();

    let stopper = {
        let monitor = Arc::clone(&monitor);
        thread::spawn(move || monitor.stop())
    };
    assert!(
        wait_until(Duration::from_secs(5), || stopper.is_finished()),
        "stop() must unblock workers parked in a read"
    );
}

// ---------------------------------------------------------------------------
// Poller
// ---------------------------------------------------------------------------

/// Three top-level files and one nested file used by the scan-shape tests.
fn scan_fixture() -> (tempfile::TempDir, Vec<PathBuf>, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut top = Vec::new();
    for name in ["one.txt", "two.txt", "three.txt"] {
        let path = dir.path().join(name);
        fs::write(&path, name).unwrap();
        top.push(canonical(&path));
    }
    top.sort();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    let nested = sub.join("nested.txt");
    fs::write(&nested, "nested").unwrap();
    let nested = canonical(&nested);
    (dir, top, nested)
}

#[test]
fn poller_top_level_scan_reports_exactly_the_regular_files() {
    let (dir, top, nested) = scan_fixture();

    let poller = Poller::new();
    poller
        .add_directory(dir.path(), Filter::default(), Duration::from_millis(50))
        .expect("register tempdir");
    let log = BatchLog::default();
    let _tap = poller.connect(log.recorder());

    poller.start();
    assert!(
        wait_until(Duration::from_secs(5), || log.len() >= 1),
        "a scan should deliver within a few intervals"
    );
    poller.stop();

    let mut first = log.snapshot().remove(0);
    first.sort();
    assert_eq!(
        first, top,
        "a non-recursive scan delivers the three top-level files and nothing else"
    );
    assert!(!first.contains(&nested));
}

#[test]
fn poller_recursive_scan_includes_nested_files() {
    let (dir, top, nested) = scan_fixture();

    let poller = Poller::new();
    poller
        .add_directory(
            dir.path(),
            Filter::default().with_recursive(true),
            Duration::from_millis(50),
        )
        .expect("register tempdir");
    let log = BatchLog::default();
    let _tap = poller.connect(log.recorder());

    poller.start();
    assert!(wait_until(Duration::from_secs(5), || log.len() >= 1));
    poller.stop();

    let first = log.snapshot().remove(0);
    assert_eq!(first.len(), top.len() + 1);
    assert!(
        first.contains(&nested),
        "a recursive scan must descend into the subdirectory"
    );
}

#[test]
fn poller_fans_every_batch_out_to_every_subscriber() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("seed.txt"), "x").unwrap();

    let poller = Poller::new();
    poller
        .add_directory(dir.path(), Filter::default(), Duration::from_millis(50))
        .expect("register tempdir");

    let first = BatchLog::default();
    let second = BatchLog::default();
    let _a = poller.connect(first.recorder());
    let _b = poller.connect(second.recorder());

    poller.start();
    assert!(wait_until(Duration::from_secs(5), || {
        first.len() >= 2 && second.len() >= 2
    }));
    poller.stop();

    let shorter = first.len().min(second.len());
    assert!(shorter >= 2);
    assert_eq!(
        first.snapshot()[..shorter],
        second.snapshot()[..shorter],
        "both subscribers observe the same batches in the same order"
    );
}

#[test]
fn poller_min_size_excludes_small_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("small.dat"), "abc").unwrap();
    fs::write(dir.path().join("large.dat"), vec![0u8; 4096]).unwrap();

    let poller = Poller::new();
    poller
        .add_directory(
            dir.path(),
            Filter::default().with_min_size(1024),
            Duration::from_millis(50),
        )
        .expect("register tempdir");
    let log = BatchLog::default();
    let _tap = poller.connect(log.recorder());

    poller.start();
    assert!(wait_until(Duration::from_secs(5), || log.len() >= 1));
    poller.stop();

    let first = log.snapshot().remove(0);
    assert_eq!(first, vec![canonical(&dir.path().join("large.dat"))]);
}

#[test]
fn poller_min_age_suppresses_fresh_files_entirely() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("fresh.txt"), "just written").unwrap();

    let poller = Poller::new();
    poller
        .add_directory(
            dir.path(),
            Filter::default().with_min_age(3600),
            Duration::from_millis(50),
        )
        .expect("register tempdir");
    let log = BatchLog::default();
    let _tap = poller.connect(log.recorder());

    poller.start();
    assert!(
        !wait_until(Duration::from_millis(500), || log.len() >= 1),
        "an empty batch is never published, so nothing should arrive"
    );
    poller.stop();
}

#[test]
fn poller_deleted_registration_spawns_no_worker() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("seed.txt"), "x").unwrap();

    let poller = Poller::new();
    poller
        .add_directory(dir.path(), Filter::default(), Duration::from_millis(50))
        .expect("register tempdir");
    poller.del_directory(dir.path());

    let log = BatchLog::default();
    let _tap = poller.connect(log.recorder());
    poller.start();

    assert!(
        !wait_until(Duration::from_millis(500), || log.len() >= 1),
        "a removed query must not be scanned"
    );
    poller.stop();
}

#[test]
fn poller_stop_interrupts_a_long_interval_wait() {
    let dir = tempfile::tempdir().expect("tempdir");
    let poller = Arc::new(Poller::new());
    poller
        .add_directory(dir.path(), Filter::default(), Duration::from_secs(600))
        .expect("register tempdir");
    poller.start();
    thread::sleep(Duration::from_millis(100));

    let stopper = {
        let poller = Arc::clone(&poller);
        thread::spawn(move || poller.stop())
    };
    assert!(
        wait_until(Duration::from_secs(2), || stopper.is_finished()),
        "stop() must wake a worker parked in its inter-scan wait"
    );
}

// ---------------------------------------------------------------------------
// Binary smoke tests
// ---------------------------------------------------------------------------

fn binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dirwatch"))
}

#[test]
fn cli_poll_reports_existing_files_as_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("seed.txt"), "x").unwrap();

    let out = Command::new(binary())
        .args([
            "poll",
            dir.path().to_str().unwrap(),
            "--interval",
            "50",
            "--duration",
            "1",
            "--json",
        ])
        .output()
        .expect("failed to invoke dirwatch binary");
    let stdout = String::from_utf8_lossy(&out.stdout);
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        out.status.success(),
        "poll run failed\nstdout: {stdout}\nstderr: {stderr}"
    );

    let first = stdout.lines().next().expect("at least one message line");
    let parsed: serde_json::Value =
        serde_json::from_str(first).expect("each output line is a JSON object");
    assert_eq!(parsed["engine"], "poll");
    assert!(
        parsed["path"]
            .as_str()
            .is_some_and(|path| path.ends_with("seed.txt")),
        "unexpected record: {parsed}"
    );
}

#[test]
fn cli_rejects_a_missing_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent");

    let out = Command::new(binary())
        .args(["monitor", missing.to_str().unwrap(), "--duration", "1"])
        .output()
        .expect("failed to invoke dirwatch binary");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        !out.status.success(),
        "watching a missing directory must fail"
    );
    assert!(
        stderr.contains("is not a valid directory entry"),
        "stderr should carry the validation error\nstderr: {stderr}"
    );
}
