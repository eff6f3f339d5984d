use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use crate::error::WatchError;
use crate::filter::Filter;

/// One watch registration: a directory path plus the criteria applied to
/// candidates found under it.
///
/// A watcher instance holds at most one query per distinct path.
#[derive(Debug, Clone)]
pub struct Query {
    /// The watched directory; also the registration key.
    pub path: PathBuf,
    pub filter: Filter,
    /// The filter's pattern, compiled once at registration time.
    /// `None` means match-all.
    pub(crate) matcher: Option<Regex>,
    /// Delay between poller scans. The monitor ignores this.
    pub interval: Duration,
}

impl Query {
    pub(crate) fn new(
        path: PathBuf,
        filter: Filter,
        interval: Duration,
    ) -> Result<Self, WatchError> {
        let matcher = if filter.pattern.is_empty() {
            None
        } else {
            Some(
                Regex::new(&filter.pattern).map_err(|source| WatchError::BadPattern {
                    pattern: filter.pattern.clone(),
                    source,
                })?,
            )
        };

        // A zero interval would spin; clamp to the smallest useful wait.
        let interval = interval.max(Duration::from_millis(1));

        Ok(Self {
            path,
            filter,
            matcher,
            interval,
        })
    }
}

/// Registration-time validation shared by both engines.
pub(crate) fn require_directory(path: &Path) -> Result<(), WatchError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(WatchError::NotADirectory {
            path: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_is_coerced_to_one_millisecond() {
        let query = Query::new(PathBuf::from("/tmp"), Filter::default(), Duration::ZERO)
            .expect("match-all query");
        assert_eq!(query.interval, Duration::from_millis(1));
    }

    #[test]
    fn configured_interval_is_preserved() {
        let query = Query::new(
            PathBuf::from("/tmp"),
            Filter::default(),
            Duration::from_millis(250),
        )
        .expect("match-all query");
        assert_eq!(query.interval, Duration::from_millis(250));
    }

    #[test]
    fn bad_pattern_is_rejected_at_registration() {
        let err = Query::new(
            PathBuf::from("/tmp"),
            Filter::new("broken", "["),
            Duration::ZERO,
        )
        .expect_err("an unclosed class is not a valid pattern");
        assert!(matches!(err, WatchError::BadPattern { .. }));
    }

    #[test]
    fn require_directory_rejects_files_and_missing_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(require_directory(dir.path()).is_ok());

        let file = dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(
            require_directory(&file),
            Err(WatchError::NotADirectory { .. })
        ));
        assert!(matches!(
            require_directory(&dir.path().join("absent")),
            Err(WatchError::NotADirectory { .. })
        ));
    }
}
