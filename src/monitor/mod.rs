mod inotify;

use std::collections::BTreeMap;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, trace};

use crate::error::{WatchError, WorkerFault};
use crate::filter::{self, Filter};
use crate::message::{Batch, Message};
use crate::query::{self, Query};
use crate::signal::{self, Connection, Signal};

use inotify::{BUFFER_LEN, Inotify, read_into, records, wait_readable};

/// Cancellation backstop for workers parked waiting for events.
const PARK_TIMEOUT_MS: i32 = 500;

/// Event-driven directory watcher.
///
/// One worker thread per registered query blocks reading raw records from
/// a single inotify descriptor shared across the instance, filters them,
/// and publishes one deduplicated [`Batch`] per read to every connected
/// subscriber.
pub struct Monitor {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    /// Best-effort stop flag, observed at loop boundaries.
    running: AtomicBool,
    /// Queries, the lazily-created descriptor and the active watch list
    /// share one lock; descriptor reads happen outside it.
    state: Mutex<State>,
    batches: Signal<Batch>,
    faults: Signal<WorkerFault>,
}

#[derive(Default)]
struct State {
    queries: BTreeMap<PathBuf, Query>,
    handle: Option<Inotify>,
    watches: Vec<i32>,
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                running: AtomicBool::new(false),
                state: Mutex::new(State::default()),
                batches: Signal::new(),
                faults: Signal::new(),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Register a directory. Fails synchronously if `path` is not an
    /// existing directory or the filter's pattern does not compile.
    /// Re-adding an already-registered path is a no-op, not an update.
    pub fn add_directory(
        &self,
        path: impl AsRef<Path>,
        filter: Filter,
    ) -> Result<(), WatchError> {
        let path = path.as_ref();
        let mut state = signal::lock(&self.shared.state);
        query::require_directory(path)?;
        if state.queries.contains_key(path) {
            return Ok(());
        }
        let query = Query::new(path.to_path_buf(), filter, Duration::ZERO)?;
        state.queries.insert(query.path.clone(), query);
        Ok(())
    }

    /// Remove a registration if present; unknown paths are a no-op.
    pub fn del_directory(&self, path: impl AsRef<Path>) {
        signal::lock(&self.shared.state)
            .queries
            .remove(path.as_ref());
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
        let queries: Vec<Query> = signal::lock(&self.shared.state)
            .queries
            .values()
            .cloned()
            .collect();
        let mut workers = signal::lock(&self.workers);
        for query in queries {
            let shared = Arc::clone(&self.shared);
            workers.push(thread::spawn(move || shared.work(query)));
        }
    }

    /// Stop every worker and block until all have exited.
    ///
    /// Tears down the watch registrations and the shared descriptor first:
    /// removing the watches queues IN_IGNORED records that wake parked
    /// workers promptly, and the poll timeout bounds any that miss them.
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        {
            let mut state = signal::lock(&self.shared.state);
            if let Some(handle) = state.handle.take() {
                for wd in state.watches.drain(..) {
                    handle.remove_watch(wd);
                }
                // Dropping the handle closes the descriptor.
            }
        }
        self.interrupt();
        self.join();
    }

    /// Request cooperative cancellation without waiting. A worker may
    /// complete up to one more inner step before observing it.
    pub fn interrupt(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
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
        signal::lock(&self.shared.state).queries.len()
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    /// Create the shared descriptor on first use and register this
    /// worker's watch, all under the instance lock. Either failure is
    /// fatal to this worker only.
    fn attach(&self, query: &Query) -> Result<RawFd, WatchError> {
        let mut state = signal::lock(&self.state);
        let handle = match state.handle.take() {
            Some(handle) => handle,
            None => Inotify::init().map_err(WatchError::Init)?,
        };
        let fd = handle.raw_fd();
        let registered = handle.add_watch(&query.path, query.filter.events);
        state.handle = Some(handle);
        let wd = registered.map_err(|source| WatchError::Register {
            path: query.path.clone(),
            source,
        })?;
        state.watches.push(wd);
        Ok(fd)
    }

    fn work(&self, query: Query) {
        let fd = match self.attach(&query) {
            Ok(fd) => fd,
            Err(error) => {
                // Losing the attach race against stop() is not a fault.
                if self.running.load(Ordering::SeqCst) {
                    error!(path = %query.path.display(), %error, "monitor worker failed to attach");
                    self.faults.publish(&WorkerFault {
                        path: query.path.clone(),
                        error,
                    });
                }
                return;
            }
        };
        debug!(path = %query.path.display(), events = %query.filter.events, "monitor worker watching");

        let mut buf = vec![0u8; BUFFER_LEN];
        while self.running.load(Ordering::SeqCst) {
            match wait_readable(fd, PARK_TIMEOUT_MS) {
                Ok(true) => {}
                // Timeout: nothing queued, recheck the running flag.
                Ok(false) => continue,
                // The descriptor was closed by stop(), or EINTR; the loop
                // condition decides which.
                Err(err) => {
                    trace!(path = %query.path.display(), %err, "event wait interrupted");
                    continue;
                }
            }
            let len = match read_into(fd, &mut buf) {
                Ok(len) => len,
                // A sibling worker drained the queue first.
                Err(err) => {
                    trace!(path = %query.path.display(), %err, "event read yielded nothing");
                    continue;
                }
            };

            let mut batch = Batch::default();
            for record in records(&buf[..len]) {
                if !self.running.load(Ordering::SeqCst) {
                    break;
                }
                let kind = record.mask & query.filter.events;
                if kind.is_empty() {
                    continue;
                }
                let path = match &record.name {
                    Some(name) => query.path.join(name),
                    // Self events (delete-self, move-self) carry no name.
                    None => query.path.clone(),
                };
                let Ok(canonical) = path.canonicalize() else {
                    trace!(path = %path.display(), "entry vanished before resolution, skipped");
                    continue;
                };
                if let Some(metadata) = filter::probe(&canonical, query.matcher.as_ref()) {
                    batch.insert(Message {
                        path: canonical,
                        metadata,
                        filter: query.filter.clone(),
                        event: Some(kind),
                    });
                }
                thread::yield_now();
            }

            if !batch.is_empty() && self.batches.is_connected() {
                trace!(path = %query.path.display(), count = batch.len(), "publishing batch");
                self.batches.publish(&batch);
            }
            thread::yield_now();
        }
        debug!(path = %query.path.display(), "monitor worker exiting");
    }
}
