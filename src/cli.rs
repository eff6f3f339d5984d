use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Watch directories and print batched, filtered change notifications.
///
/// dirwatch registers one watch per directory and prints every delivered
/// batch until interrupted, using either the event-driven inotify engine
/// or the interval-scanning engine.
#[derive(Parser, Debug)]
#[command(
    name = "dirwatch",
    version,
    about,
    long_about = None,
    propagate_version = true,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch directories with the event-driven inotify engine.
    Monitor {
        /// Directories to watch.
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Unanchored regular expression searched against each canonical
        /// path; empty matches everything.
        #[arg(short, long, default_value = "")]
        pattern: String,

        /// Event kinds to react to (comma-separated: access, attrib,
        /// close-write, close-nowrite, create, delete, delete-self,
        /// modify, move-self, moved-from, moved-to, open, all).
        #[arg(long, value_delimiter = ',', default_value = "all")]
        events: Vec<String>,

        /// Stop automatically after this many seconds.
        #[arg(long)]
        duration: Option<u64>,

        /// Emit one JSON object per message instead of human-readable lines.
        #[arg(long)]
        json: bool,
    },

    /// Watch directories with the interval-scanning engine.
    Poll {
        /// Directories to scan.
        #[arg(required = true)]
        dirs: Vec<PathBuf>,

        /// Unanchored regular expression searched against each canonical
        /// path; empty matches everything.
        #[arg(short, long, default_value = "")]
        pattern: String,

        /// Scan interval in milliseconds.
        #[arg(long, default_value_t = 1000)]
        interval: u64,

        /// Descend into subdirectories.
        #[arg(short, long)]
        recursive: bool,

        /// Only report files of at least this many bytes.
        #[arg(long, default_value_t = 0)]
        min_size: u64,

        /// Only report files whose last modification is at least this many
        /// seconds old.
        #[arg(long, default_value_t = 0)]
        min_age: u64,

        /// Stop automatically after this many seconds.
        #[arg(long)]
        duration: Option<u64>,

        /// Emit one JSON object per message instead of human-readable lines.
        #[arg(long)]
        json: bool,
    },

    /// Drive a monitor and a poller side by side from a config file.
    Watch {
        /// Path to the TOML watch list.
        #[arg(long, default_value = "dirwatch.toml")]
        config: PathBuf,

        /// Stop automatically after this many seconds.
        #[arg(long)]
        duration: Option<u64>,

        /// Emit one JSON object per message instead of human-readable lines.
        #[arg(long)]
        json: bool,
    },
}
