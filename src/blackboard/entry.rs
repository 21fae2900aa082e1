//! Store entry — a single key's current value plus who wrote it and when.

use serde::Serialize;

use super::value::Value;
use crate::clock::Timestamp;

/// Metadata attached to a stored value.
#[derive(Debug, Clone, Serialize)]
pub struct EntryMeta {
    /// Module that performed the write (e.g. `"PointingDetector"`).
    pub writer: String,
    /// Free-form note supplied with the write.
    pub comment: String,
    /// When the value last changed.
    pub changed_at: Timestamp,
    /// Number of effective changes since the key was created.
    pub version: u64,
}

/// A single entry in the data store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreEntry {
    pub value: Value,
    pub meta: EntryMeta,
}

impl StoreEntry {
    pub fn new(
        value: Value,
        writer: impl Into<String>,
        comment: impl Into<String>,
        changed_at: Timestamp,
    ) -> Self {
        Self {
            value,
            meta: EntryMeta {
                writer: writer.into(),
                comment: comment.into(),
                changed_at,
                version: 1,
            },
        }
    }

    /// Replace the value in place, bumping the version.
    pub(crate) fn replace(
        &mut self,
        value: Value,
        writer: impl Into<String>,
        comment: impl Into<String>,
        changed_at: Timestamp,
    ) {
        self.value = value;
        self.meta.writer = writer.into();
        self.meta.comment = comment.into();
        self.meta.changed_at = changed_at;
        self.meta.version += 1;
    }
}
