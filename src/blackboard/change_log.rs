//! Append-only change log for the data store.
//!
//! Every effective write is rendered as one line:
//!
//! ```text
//! [2026-10-18 14:03:12] user:isPointing := true (PointingDetector: pointing started)
//! ```
//!
//! Logging is best effort. A sink that fails to write reports the first
//! failure through `log::warn!` and silently drops everything after it;
//! the store write that triggered the line always succeeds.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use parking_lot::Mutex;

use super::value::Value;
use crate::clock::Timestamp;

/// Default file name for the store's change log.
pub const DEFAULT_LOG_FILE: &str = "DataStore.log";

/// One effective store change, as handed to a [`ChangeLogSink`].
#[derive(Debug, Clone, Copy)]
pub struct ChangeRecord<'a> {
    pub at: Timestamp,
    pub key: &'a str,
    /// `None` when the key was cleared.
    pub value: Option<&'a Value>,
    pub writer: &'a str,
    pub comment: &'a str,
}

impl ChangeRecord<'_> {
    /// Render the record in the `DataStore.log` line format.
    pub fn to_line(&self) -> String {
        let timestamp = self.at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S");
        match self.value {
            Some(value) => format!(
                "[{}] {} := {} ({}: {})",
                timestamp, self.key, value, self.writer, self.comment
            ),
            None => format!(
                "[{}] {} cleared ({}: {})",
                timestamp, self.key, self.writer, self.comment
            ),
        }
    }
}

/// Destination for change records.
pub trait ChangeLogSink: Send + Sync {
    fn append(&self, record: &ChangeRecord<'_>) -> io::Result<()>;
}

/// Appends change lines to a file, opening it lazily on the first write.
#[derive(Debug)]
pub struct FileChangeLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileChangeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChangeLogSink for FileChangeLog {
    fn append(&self, record: &ChangeRecord<'_>) -> io::Result<()> {
        let mut guard = self.file.lock();
        if guard.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            *guard = Some(file);
        }
        match guard.as_mut() {
            Some(file) => writeln!(file, "{}", record.to_line()),
            None => Ok(()),
        }
    }
}

/// Keeps rendered lines in memory; handy for inspection and tests.
#[derive(Debug, Default)]
pub struct MemoryChangeLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}

impl ChangeLogSink for MemoryChangeLog {
    fn append(&self, record: &ChangeRecord<'_>) -> io::Result<()> {
        self.lines.lock().push(record.to_line());
        Ok(())
    }
}

impl<T: ChangeLogSink + ?Sized> ChangeLogSink for std::sync::Arc<T> {
    fn append(&self, record: &ChangeRecord<'_>) -> io::Result<()> {
        (**self).append(record)
    }
}

/// Wraps a sink so that write failures are swallowed.
pub(crate) struct BestEffortLog {
    sink: Box<dyn ChangeLogSink>,
    failed: AtomicBool,
}

impl BestEffortLog {
    pub fn new(sink: Box<dyn ChangeLogSink>) -> Self {
        Self {
            sink,
            failed: AtomicBool::new(false),
        }
    }

    pub fn record(&self, record: &ChangeRecord<'_>) {
        if let Err(e) = self.sink.append(record) {
            if !self.failed.swap(true, Ordering::Relaxed) {
                log::warn!("[DataStore] change log write failed, further failures are ignored: {}", e);
            }
        }
    }
}
