//! Batched, filtered directory-change notifications.
//!
//! Two interchangeable engines watch a set of registered directories and
//! publish deduplicated [`Batch`]es of change [`Message`]s to any number of
//! subscribers:
//!
//! - [`Monitor`] reacts to inotify events, reading and decoding raw record
//!   buffers from one descriptor shared across its workers.
//! - [`Poller`] re-enumerates each directory on a configurable interval.
//!
//! Both spawn one worker thread per registered directory when started, and
//! share the same contract: `add_directory` / `del_directory` to manage
//! registrations, `connect` to subscribe, `start` / `stop` / `interrupt` /
//! `join` for the lifecycle, and `connect_faults` to observe workers that
//! die on fatal errors. Delivery is synchronous and best-effort; a slow
//! subscriber delays the worker that is publishing to it.
//!
//! ```no_run
//! use std::time::Duration;
//! use dirwatch::{EventMask, Filter, Monitor, Poller};
//!
//! # fn main() -> Result<(), dirwatch::WatchError> {
//! let monitor = Monitor::new();
//! monitor.add_directory(
//!     "/var/spool/incoming",
//!     Filter::new("spool", r"\.csv$").with_events(EventMask::CLOSE_WRITE),
//! )?;
//! let _tap = monitor.connect(|batch| {
//!     for message in batch.iter() {
//!         println!("changed: {}", message.path.display());
//!     }
//! });
//! monitor.start();
//! // ...
//! monitor.stop();
//!
//! let poller = Poller::new();
//! poller.add_directory(
//!     "/var/spool/archive",
//!     Filter::default().with_recursive(true).with_min_age(60),
//!     Duration::from_millis(5000),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod event;
pub mod filter;
pub mod message;
pub mod monitor;
pub mod poller;
pub mod query;
pub mod signal;

pub use error::{WatchError, WorkerFault};
pub use event::EventMask;
pub use filter::Filter;
pub use message::{Batch, Message};
pub use monitor::Monitor;
pub use poller::Poller;
pub use query::Query;
pub use signal::{Connection, Signal};
