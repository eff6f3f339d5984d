use std::fs;
use std::path::Path;
use std::time::SystemTime;

use regex::Regex;

use crate::event::EventMask;

/// Declarative match criteria applied to candidate changes.
///
/// The default filter admits everything: empty pattern, all event kinds,
/// no size or age threshold. `events` is consulted only by the monitor;
/// `recursive`, `min_size` and `min_age` only by the poller.
#[derive(Debug, Clone)]
pub struct Filter {
    /// Informational label, carried through to delivered messages.
    pub name: String,
    /// Regular expression evaluated as an unanchored *search* over the
    /// canonical path. Empty means match-all. An unanchored pattern
    /// therefore behaves as "contains".
    pub pattern: String,
    /// Event kinds the monitor registers for and reacts to.
    pub events: EventMask,
    /// Whether the poller descends into subdirectories.
    pub recursive: bool,
    /// Smallest file size, in bytes, the poller reports. Zero disables.
    pub min_size: u64,
    /// Minimum age of the last modification, in seconds, before the poller
    /// reports a file. Zero disables.
    pub min_age: u64,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            name: String::new(),
            pattern: String::new(),
            events: EventMask::ALL,
            recursive: false,
            min_size: 0,
            min_age: 0,
        }
    }
}

impl Filter {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: EventMask) -> Self {
        self.events = events;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_min_size(mut self, bytes: u64) -> Self {
        self.min_size = bytes;
        self
    }

    pub fn with_min_age(mut self, seconds: u64) -> Self {
        self.min_age = seconds;
        self
    }

    /// Poller-only thresholds: the snapshot must be at least `min_size`
    /// bytes and its last modification at least `min_age` seconds old.
    pub(crate) fn meets_thresholds(&self, metadata: &fs::Metadata) -> bool {
        if self.min_size > 0 && metadata.len() < self.min_size {
            return false;
        }
        if self.min_age > 0 {
            let old_enough = metadata
                .modified()
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok())
                .is_some_and(|age| age.as_secs() >= self.min_age);
            if !old_enough {
                return false;
            }
        }
        true
    }
}

/// The shared match predicate.
///
/// An entry matches iff its metadata can still be obtained and, when a
/// compiled pattern is present, an unanchored search over the canonical
/// path succeeds. Returns the metadata snapshot that becomes part of the
/// message.
pub(crate) fn probe(path: &Path, matcher: Option<&Regex>) -> Option<fs::Metadata> {
    let metadata = fs::metadata(path).ok()?;
    match matcher {
        Some(regex) if !regex.is_match(&path.to_string_lossy()) => None,
        _ => Some(metadata),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    #[test]
    fn empty_pattern_matches_every_existing_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("anything.bin");
        File::create(&path).unwrap();

        assert!(probe(&path, None).is_some(), "match-all should admit {path:?}");
    }

    #[test]
    fn pattern_is_searched_not_anchored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("report.log");
        File::create(&path).unwrap();

        let contains = Regex::new(r"report\.log").unwrap();
        assert!(
            probe(&path, Some(&contains)).is_some(),
            "unanchored search should find the basename inside the full path"
        );

        let elsewhere = Regex::new(r"\.csv$").unwrap();
        assert!(probe(&path, Some(&elsewhere)).is_none());
    }

    #[test]
    fn missing_entry_never_matches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vanished.txt");
        assert!(probe(&path, None).is_none(), "a stat failure must not match");
    }

    #[test]
    fn min_size_gates_small_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("small");
        File::create(&path).unwrap().write_all(b"abc").unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let filter = Filter::default().with_min_size(10);
        assert!(!filter.meets_thresholds(&metadata));
        assert!(Filter::default().meets_thresholds(&metadata));
    }

    #[test]
    fn min_age_gates_fresh_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fresh");
        File::create(&path).unwrap();
        let metadata = fs::metadata(&path).unwrap();

        let filter = Filter::default().with_min_age(3600);
        assert!(
            !filter.meets_thresholds(&metadata),
            "a file modified moments ago is not an hour old"
        );
    }
}
