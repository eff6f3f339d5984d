use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::bail;
use serde::Deserialize;

use dirwatch::{EventMask, Filter};

/// Which engine(s) a watch entry drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    Monitor,
    Poll,
    #[default]
    Both,
}

/// One `[[watch]]` entry from the config file.
#[derive(Debug, Deserialize)]
pub struct WatchEntry {
    pub path: PathBuf,
    /// Informational filter label.
    #[serde(default)]
    pub name: String,
    /// Unanchored regular expression; empty matches everything.
    #[serde(default)]
    pub pattern: String,
    /// Kebab-case event kind names; empty means all events.
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub min_size: u64,
    #[serde(default)]
    pub min_age: u64,
    /// Poll interval in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub engine: Engine,
}

fn default_interval_ms() -> u64 {
    1000
}

impl WatchEntry {
    pub fn filter(&self) -> anyhow::Result<Filter> {
        Ok(Filter::new(&self.name, &self.pattern)
            .with_events(parse_event_kinds(&self.events)?)
            .with_recursive(self.recursive)
            .with_min_size(self.min_size)
            .with_min_age(self.min_age))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Combine kebab-case kind names into one mask. An empty list means all
/// events, matching the default filter.
pub fn parse_event_kinds(names: &[String]) -> anyhow::Result<EventMask> {
    if names.is_empty() {
        return Ok(EventMask::ALL);
    }
    let mut mask = EventMask::NONE;
    for name in names {
        match EventMask::from_name(name.trim()) {
            Some(kind) => mask |= kind,
            None => bail!("unknown event kind {name:?}"),
        }
    }
    Ok(mask)
}

/// Watch list loaded from `dirwatch.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct DirwatchConfig {
    #[serde(default, rename = "watch")]
    pub watches: Vec<WatchEntry>,
}

impl DirwatchConfig {
    /// Load the watch list from `path`.
    ///
    /// Returns an empty configuration (and a stderr warning) if the file
    /// does not exist or cannot be parsed.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!(
                        "warning: failed to parse {}: {err}. Using defaults.",
                        path.display()
                    );
                    Self::default()
                }
            },
            Err(err) => {
                eprintln!(
                    "warning: failed to read {}: {err}. Using defaults.",
                    path.display()
                );
                Self::default()
            }
        }
    }
}
