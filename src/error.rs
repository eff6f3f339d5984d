use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the watch engines.
///
/// `NotADirectory` and `BadPattern` are configuration errors returned
/// synchronously by `add_directory`, before any worker exists. `Init` and
/// `Register` are fatal resource errors raised inside a worker; they
/// terminate that worker only and reach the caller as a [`WorkerFault`] on
/// the fault channel.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The registered path does not name an existing directory.
    #[error("{} is not a valid directory entry", .path.display())]
    NotADirectory { path: PathBuf },

    /// The filter's pattern is not a valid regular expression.
    #[error("invalid pattern {pattern:?}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The shared change-notification descriptor could not be created.
    #[error("failed to create the change-notification descriptor")]
    Init(#[source] io::Error),

    /// A watch could not be registered for a directory.
    #[error("failed to register a watch for {}", .path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A worker thread terminated on a fatal error.
///
/// Published on an engine's fault channel so callers never have to infer a
/// dead worker from the absence of further batches. Sibling workers are
/// unaffected and the fault is not retried.
#[derive(Debug)]
pub struct WorkerFault {
    /// Path of the query whose worker terminated.
    pub path: PathBuf,
    /// The error that terminated it.
    pub error: WatchError,
}
