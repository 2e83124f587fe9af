//! Daily-rotated JSON Lines writer.
//!
//! Each record is one line, appended and flushed immediately:
//! - A crash loses at most the line being written
//! - Re-opening a day's file appends rather than truncates

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::PersistenceResult;

/// Open file for one date.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: NaiveDate,
    records_written: usize,
}

/// Append-only writer producing `{prefix}_{YYYY-MM-DD}.jsonl` files.
pub struct JsonLinesWriter {
    base_dir: PathBuf,
    prefix: String,
    active_writer: Option<ActiveWriter>,
}

impl JsonLinesWriter {
    pub fn new(base_dir: impl AsRef<Path>, prefix: impl Into<String>) -> PersistenceResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            base_dir,
            prefix: prefix.into(),
            active_writer: None,
        })
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.base_dir
            .join(format!("{}_{}.jsonl", self.prefix, date.format("%Y-%m-%d")))
    }

    /// Append `record` to the file for `date`, rotating if the date changed.
    pub fn append<T: Serialize>(&mut self, date: NaiveDate, record: &T) -> PersistenceResult<()> {
        let line = serde_json::to_string(record)?;

        let needs_rotation = self
            .active_writer
            .as_ref()
            .map(|w| w.date != date)
            .unwrap_or(false);
        if needs_rotation {
            self.close_active_writer();
        }

        let active = match self.active_writer.take() {
            Some(active) => active,
            None => self.open(date)?,
        };
        let active = self.active_writer.insert(active);

        writeln!(active.writer, "{line}")?;
        active.writer.flush()?;
        active.records_written += 1;
        Ok(())
    }

    fn open(&self, date: NaiveDate) -> PersistenceResult<ActiveWriter> {
        let path = self.path_for(date);
        info!(path = %path.display(), "Opening JSON Lines writer (append mode)");
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(ActiveWriter {
            writer: BufWriter::new(file),
            date,
            records_written: 0,
        })
    }

    fn close_active_writer(&mut self) {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, prefix = %self.prefix, "Failed to flush writer on close");
            }
            debug!(
                prefix = %self.prefix,
                date = %active.date,
                records = active.records_written,
                "Closed JSON Lines writer"
            );
        }
    }
}

impl Drop for JsonLinesWriter {
    fn drop(&mut self) {
        self.close_active_writer();
    }
}
