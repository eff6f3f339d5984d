use std::time::UNIX_EPOCH;

use serde::Serialize;

use dirwatch::{Batch, Message};

/// One delivered message, flattened for printing.
#[derive(Debug, Serialize)]
pub struct MessageRecord {
    /// Which engine produced the message.
    pub engine: &'static str,
    pub path: String,
    pub size: u64,
    /// Seconds since the epoch of the last modification, if known.
    pub modified: Option<u64>,
    /// Kind names of the triggering event bits; empty for polled scans.
    pub events: Vec<&'static str>,
    /// Label of the filter that matched.
    pub filter: String,
}

impl MessageRecord {
    pub fn new(engine: &'static str, message: &Message) -> Self {
        let modified = message
            .metadata
            .modified()
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map(|since| since.as_secs());
        Self {
            engine,
            path: message.path.display().to_string(),
            size: message.metadata.len(),
            modified,
            events: message
                .event
                .map(|mask| mask.kind_names())
                .unwrap_or_default(),
            filter: message.filter.name.clone(),
        }
    }
}

/// Print one line (or one JSON object) per message in the batch.
///
/// Warnings go to stderr so stdout stays clean for JSON consumers.
pub fn print_batch(engine: &'static str, batch: &Batch, json: bool) {
    for message in batch.iter() {
        let record = MessageRecord::new(engine, message);
        if json {
            match serde_json::to_string(&record) {
                Ok(line) => println!("{line}"),
                Err(err) => eprintln!("error serialising message: {err}"),
            }
        } else if record.events.is_empty() {
            println!("{engine}: {} ({} bytes)", record.path, record.size);
        } else {
            println!(
                "{engine}: {} ({} bytes) [{}]",
                record.path,
                record.size,
                record.events.join(",")
            );
        }
    }
}
