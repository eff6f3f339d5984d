use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, trace};

use crate::error::{WatchError, WorkerFault};
use crate::filter::{self, Filter};
use crate::message::{Batch, Message};
use crate::query::{self, Query};
use crate::signal::{self, Connection, Signal};

/// Scanning directory watcher.
///
/// One worker thread per registered query sleeps on a timed, interruptible
/// wait, re-enumerates its directory, and publishes one deduplicated
/// [`Batch`] of every matching regular file per scan.
pub struct Poller {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    /// Best-effort stop flag, observed at loop boundaries.
    running: AtomicBool,
    queries: Mutex<BTreeMap<PathBuf, Query>>,
    /// Pairs with `tick` for the inter-scan wait, which doubles as the
    /// earliest cancellation-observation point.
    pace: Mutex<()>,
    tick: Condvar,
    batches: Signal<Batch>,
    faults: Signal<WorkerFault>,
}

impl Poller {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                queries: Mutex::new(BTreeMap::new()),
                pace: Mutex::new(()),
                tick: Condvar::new(),
                batches: Signal::new(),
                faults: Signal::new(),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Register a directory to be scanned every `interval`. A zero
    /// interval is coerced to one millisecond. Fails synchronously if
    /// `path` is not an existing directory or the filter's pattern does
    /// not compile; re-adding an already-registered path is a no-op.
    pub fn add_directory(
        &self,
        path: impl AsRef<Path>,
        filter: Filter,
        interval: Duration,
    ) -> Result<(), WatchError> {
        let path = path.as_ref();
        let mut queries = signal::lock(&self.shared.queries);
        query::require_directory(path)?;
        if queries.contains_key(path) {
            return Ok(());
        }
        let query = Query::new(path.to_path_buf(), filter, interval)?;
        queries.insert(query.path.clone(), query);
        Ok(())
    }

    /// Remove a registration if present; unknown paths are a no-op.
    pub fn del_directory(&self, path: impl AsRef<Path>) {
        signal::lock(&self.shared.queries).remove(path.as_ref());
    }

    /// Subscribe to delivered batches. Every subscriber receives every
    /// batch, synchronously, on the producing worker's thread.
    pub fn connect(&self, handler: impl Fn(&Batch) + Send + Sync + 'static) -> Connection {
        self.shared.batches.connect(handler)
    }

    /// Subscribe to worker-failure events.
    pub fn connect_faults(
        &self,
        handler: impl Fn(&WorkerFault) + Send + Sync + 'static,
    ) -> Connection {
        self.shared.faults.connect(handler)
    }

    /// Spawn one worker per currently-registered query. Queries added
    /// afterwards are not picked up until the watcher is stopped and
    /// started again.
    pub fn start(&self) {
        self.shared.running.store(true, Ordering::SeqCst);
        let queries: Vec<Query> = signal::lock(&self.shared.queries)
            .values()
            .cloned()
            .collect();
        let mut workers = signal::lock(&self.workers);
        for query in queries {
            let shared = Arc::clone(&self.shared);
            workers.push(thread::spawn(move || shared.work(query)));
        }
    }

    /// Stop every worker and block until all have exited. There is no
    /// descriptor to tear down; cancellation plus the join is the whole
    /// shutdown.
    pub fn stop(&self) {
        self.interrupt();
        self.join();
    }

    /// Request cooperative cancellation without waiting, waking workers
    /// parked in their inter-scan wait.
    pub fn interrupt(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        // Notify under the pace lock: a worker between its flag check and
        // parking would otherwise miss the wakeup and sleep a full interval.
        let _pace = signal::lock(&self.shared.pace);
        self.shared.tick.notify_all();
    }

    /// Block until every spawned worker has exited.
    pub fn join(&self) {
        let workers: Vec<JoinHandle<()>> = signal::lock(&self.workers).drain(..).collect();
        for worker in workers {
            let _ = worker.join();
        }
    }

    #[cfg(test)]
    fn query_count(&self) -> usize {
        signal::lock(&self.shared.queries).len()
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    fn work(&self, query: Query) {
        debug!(
            path = %query.path.display(),
            interval = ?query.interval,
            recursive = query.filter.recursive,
            "poller worker scanning"
        );
        while self.running.load(Ordering::SeqCst) {
            self.wait(query.interval);
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            // The watched root going away is fatal to this worker; losing
            // single entries mid-scan is not.
            if !query.path.is_dir() {
                let error = WatchError::NotADirectory {
                    path: query.path.clone(),
                };
                error!(path = %query.path.display(), "watched directory is gone");
                self.faults.publish(&WorkerFault {
                    path: query.path.clone(),
                    error,
                });
                return;
            }

            let batch = self.scan(&query);
            if !batch.is_empty() && self.batches.is_connected() {
                trace!(path = %query.path.display(), count = batch.len(), "publishing batch");
                self.batches.publish(&batch);
            }
            thread::yield_now();
        }
        debug!(path = %query.path.display(), "poller worker exiting");
    }

    /// Timed wait between scans; returns early when interrupted.
    fn wait(&self, interval: Duration) {
        let guard = signal::lock(&self.pace);
        let _wait = self
            .tick
            .wait_timeout_while(guard, interval, |_| self.running.load(Ordering::SeqCst))
            .unwrap_or_else(PoisonError::into_inner);
        thread::yield_now();
    }

    /// Enumerate the directory once and collect every matching regular
    /// file. A failed entry never aborts the cycle.
    fn scan(&self, query: &Query) -> Batch {
        let mut walker = ignore::WalkBuilder::new(&query.path);
        walker.standard_filters(false).follow_links(false);
        if !query.filter.recursive {
            // Depth 1 covers the root itself plus its direct children.
            walker.max_depth(Some(1));
        }

        let mut batch = Batch::default();
        for entry in walker.build() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    trace!(%err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|kind| kind.is_file()) {
                continue;
            }
            let Ok(canonical) = entry.path().canonicalize() else {
                trace!(path = %entry.path().display(), "entry vanished mid-scan, skipped");
                continue;
            };
            let Some(metadata) = filter::probe(&canonical, query.matcher.as_ref()) else {
                continue;
            };
            if !query.filter.meets_thresholds(&metadata) {
                continue;
            }
            batch.insert(Message {
                path: canonical,
                metadata,
                filter: query.filter.clone(),
                event: None,
            });
            thread::yield_now();
        }
        batch
    }
}
