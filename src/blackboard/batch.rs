//! Scoped write batches.
//!
//! A module that updates several related keys in one tick (for example a
//! pointed-at location and the object name at that location) buffers them
//! in a [`WriteBatch`]. The batch is applied as a unit when committed or
//! dropped: every entry is updated before any subscriber runs, so nobody
//! observes the location without its matching name.

use super::store::DataStore;
use super::value::Value;

/// One queued write. `value == None` means "clear the key".
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    pub key: String,
    pub value: Option<Value>,
    pub writer: String,
    pub comment: String,
}

impl PendingWrite {
    pub fn set(
        key: impl Into<String>,
        value: impl Into<Value>,
        writer: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            writer: writer.into(),
            comment: comment.into(),
        }
    }

    pub fn clear(
        key: impl Into<String>,
        writer: impl Into<String>,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: None,
            writer: writer.into(),
            comment: comment.into(),
        }
    }
}

/// Buffered writes against a [`DataStore`], applied on drop.
///
/// # Example
///
/// ```
/// use embodia::blackboard::{DataStore, Vec3};
///
/// let store = DataStore::new();
/// {
///     let mut batch = store.batch("PointingDetector");
///     batch.set("user:lastPointedAt:location", Vec3::new(1.0, 0.0, 2.0), "pointed");
///     batch.set("user:lastPointedAt:name", "cup", "pointed");
/// } // applied here
/// assert_eq!(store.get_typed("user:lastPointedAt:name", String::new()), "cup");
/// ```
pub struct WriteBatch<'a> {
    store: &'a DataStore,
    writer: String,
    pending: Vec<PendingWrite>,
    done: bool,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn begin(store: &'a DataStore, writer: impl Into<String>) -> Self {
        Self {
            store,
            writer: writer.into(),
            pending: Vec::new(),
            done: false,
        }
    }

    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        comment: impl Into<String>,
    ) -> &mut Self {
        self.pending
            .push(PendingWrite::set(key, value, self.writer.clone(), comment));
        self
    }

    pub fn clear(&mut self, key: impl Into<String>, comment: impl Into<String>) -> &mut Self {
        self.pending
            .push(PendingWrite::clear(key, self.writer.clone(), comment));
        self
    }

    pub fn writer(&self) -> &str {
        &self.writer
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply the queued writes now. Returns how many changed the store.
    pub fn commit(mut self) -> usize {
        self.flush()
    }

    /// Drop the queued writes without applying them.
    pub fn discard(mut self) {
        self.pending.clear();
        self.done = true;
    }

    fn flush(&mut self) -> usize {
        self.done = true;
        if self.pending.is_empty() {
            return 0;
        }
        let writes = std::mem::take(&mut self.pending);
        self.store.apply(writes)
    }
}

impl Drop for WriteBatch<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.flush();
        }
    }
}
