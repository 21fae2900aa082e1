//! Inbox — marshals writes from other threads onto the tick thread.
//!
//! The store's write path is meant to be driven from the host's tick
//! thread. Work that runs elsewhere (a network bridge, a slow recognizer)
//! gets a cloneable [`RemoteWriter`] and queues its writes; the host drains
//! the [`Inbox`] at the start of each tick, applying queued groups in the
//! order they were sent.

use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use super::batch::PendingWrite;
use super::store::DataStore;
use super::value::Value;

/// Receiving end, owned by whoever drives the tick loop.
#[derive(Debug)]
pub struct Inbox {
    tx: UnboundedSender<Vec<PendingWrite>>,
    rx: UnboundedReceiver<Vec<PendingWrite>>,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbox {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Hand out a writer that queues writes under `name`.
    pub fn writer(&self, name: impl Into<String>) -> RemoteWriter {
        RemoteWriter {
            name: name.into(),
            tx: self.tx.clone(),
        }
    }

    /// Apply everything queued so far. Returns the number of effective changes.
    pub fn drain(&mut self, store: &DataStore) -> usize {
        let mut changed = 0;
        loop {
            match self.rx.try_recv() {
                Ok(writes) => changed += store.apply(writes),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        changed
    }
}

/// Sending end; cheap to clone and `Send`.
#[derive(Debug, Clone)]
pub struct RemoteWriter {
    name: String,
    tx: UnboundedSender<Vec<PendingWrite>>,
}

impl RemoteWriter {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a write. Returns `false` if the inbox is gone.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>, comment: impl Into<String>) -> bool {
        self.send(vec![PendingWrite::set(key, value, self.name.clone(), comment)])
    }

    /// Queue a key removal. Returns `false` if the inbox is gone.
    pub fn clear(&self, key: impl Into<String>, comment: impl Into<String>) -> bool {
        self.send(vec![PendingWrite::clear(key, self.name.clone(), comment)])
    }

    /// Queue several `(key, value)` writes applied as one group.
    pub fn set_all<K, V>(&self, writes: impl IntoIterator<Item = (K, V)>, comment: &str) -> bool
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let group = writes
            .into_iter()
            .map(|(k, v)| PendingWrite::set(k, v, self.name.clone(), comment))
            .collect();
        self.send(group)
    }

    fn send(&self, group: Vec<PendingWrite>) -> bool {
        self.tx.send(group).is_ok()
    }
}
