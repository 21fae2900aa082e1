//! Blackboard — the typed, observable store modules communicate through.
//!
//! Modules never call each other. A sensor module writes raw readings
//! (`user:pointPos`), a classifier reads them and writes intents
//! (`user:isPointing`), and behavior modules subscribe to the intents.
//!
//! # Change semantics
//!
//! A write whose value equals the stored value does nothing at all. An
//! effective write updates the entry and its timestamp, appends a line to
//! the change log, fires the global change broadcast, then runs the key's
//! subscribers synchronously in registration order.
//!
//! # Reads never fail
//!
//! Missing keys and kind mismatches both fall back to the caller's default
//! in [`DataStore::get_typed`]. The optional [`KeySchema`] only logs
//! mismatches in debug builds.
//!
//! # Threads
//!
//! The store is driven from one tick thread. Work on other threads queues
//! writes through an [`Inbox`] that the host drains each tick.

pub mod batch;
pub mod change_log;
pub mod entry;
pub mod inbox;
pub mod keys;
pub mod schema;
pub mod store;
pub mod subscription;
pub mod value;

pub use batch::{PendingWrite, WriteBatch};
pub use change_log::{ChangeLogSink, ChangeRecord, FileChangeLog, MemoryChangeLog, DEFAULT_LOG_FILE};
pub use entry::{EntryMeta, StoreEntry};
pub use inbox::{Inbox, RemoteWriter};
pub use schema::KeySchema;
pub use store::{DataStore, DataStoreBuilder};
pub use subscription::{ChangeCallback, KeyCallback, SubscriptionId};
pub use value::{FromValue, Quat, Value, ValueKind, Vec3};
