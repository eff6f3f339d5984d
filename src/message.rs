use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use crate::event::EventMask;
use crate::filter::Filter;

/// One matched change record.
#[derive(Debug, Clone)]
pub struct Message {
    /// Fully resolved absolute path of the entry.
    pub path: PathBuf,
    /// Metadata snapshot captured when the match was evaluated.
    pub metadata: Metadata,
    /// The filter that admitted the entry.
    pub filter: Filter,
    /// The raw event kind that triggered the record; `None` for messages
    /// produced by a poller scan.
    pub event: Option<EventMask>,
}

/// The set of messages produced by one detection cycle, unique by
/// canonical path.
///
/// A batch is built fresh each cycle by its producing worker and never
/// mutated after publication. Uniqueness is the only guaranteed property
/// of its contents; iteration order is not part of the contract.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    entries: BTreeMap<PathBuf, Message>,
}

impl Batch {
    /// Insert a message; a later message for an already-present canonical
    /// path is dropped.
    pub(crate) fn insert(&mut self, message: Message) {
        self.entries.entry(message.path.clone()).or_insert(message);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub fn get(&self, path: &Path) -> Option<&Message> {
        self.entries.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.values()
    }

    /// The canonical paths currently held, mainly useful to tests and
    /// subscribers that only care which entries changed.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.keys().map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_for(path: &Path) -> Message {
        Message {
            path: path.to_path_buf(),
            metadata: std::fs::metadata(path).expect("fixture metadata"),
            filter: Filter::default(),
            event: Some(EventMask::CREATE),
        }
    }

    #[test]
    fn duplicate_canonical_paths_collapse() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "one").unwrap();

        let mut batch = Batch::default();
        batch.insert(message_for(&file));
        batch.insert(message_for(&file));

        assert_eq!(batch.len(), 1, "a batch never holds the same path twice");
        assert!(batch.contains(&file));
    }

    #[test]
    fn distinct_paths_accumulate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "one").unwrap();
        std::fs::write(&b, "two").unwrap();

        let mut batch = Batch::default();
        batch.insert(message_for(&a));
        batch.insert(message_for(&b));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.iter().count(), 2);
    }
}
