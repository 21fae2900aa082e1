//! DataStore — the central shared-state structure.
//!
//! The store holds every key/value pair flowing between modules. A write
//! whose value equals the stored one is a no-op: no timestamp update, no
//! log line, no notification. That rule is what lets modules re-set their
//! outputs every tick without flooding subscribers.
//!
//! Subscribers run synchronously, in registration order, after the new
//! value is stored and after the lock is released, so a callback may read
//! the store (and observe its triggering value) or write other keys.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;

use super::batch::{PendingWrite, WriteBatch};
use super::change_log::{BestEffortLog, ChangeLogSink, ChangeRecord, FileChangeLog};
use super::entry::StoreEntry;
use super::schema::KeySchema;
use super::subscription::{ChangeSubscriber, KeySubscriber, SubscriptionId};
use super::value::{FromValue, Value};
use crate::clock::{system_clock, Clock, Timestamp};

/// Writer name used for changes the store makes on its own behalf.
const STORE_WRITER: &str = "DataStore";

/// The shared blackboard.
///
/// # Example
///
/// ```
/// use embodia::blackboard::DataStore;
///
/// let store = DataStore::new();
/// assert!(store.set("user:isEngaged", true, "EngagementSensor", "face detected"));
/// // Same value again: nothing happens.
/// assert!(!store.set("user:isEngaged", true, "EngagementSensor", "face detected"));
/// assert!(store.get_typed("user:isEngaged", false));
/// ```
pub struct DataStore {
    entries: RwLock<HashMap<String, StoreEntry>>,
    subscribers: RwLock<HashMap<String, Vec<KeySubscriber>>>,
    change_listeners: RwLock<Vec<ChangeSubscriber>>,
    change_log: Option<BestEffortLog>,
    schema: KeySchema,
    clock: Arc<dyn Clock>,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore {
    /// Create an empty store on the system clock, without a change log.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> DataStoreBuilder {
        DataStoreBuilder::default()
    }

    // --- Write operations ---

    /// Store `value` under `key` if it differs from the current value.
    ///
    /// Returns `true` when the value changed. On change the entry is
    /// updated, a change-log line is appended, change listeners fire with
    /// the key, then key subscribers fire with `(key, value)`.
    pub fn set(&self, key: &str, value: impl Into<Value>, writer: &str, comment: &str) -> bool {
        self.apply(vec![PendingWrite::set(key, value, writer, comment)]) == 1
    }

    /// Remove `key` entirely. Returns whether it existed.
    pub fn clear(&self, key: &str) -> bool {
        self.clear_as(key, STORE_WRITER, "clear")
    }

    /// Remove `key`, attributing the removal to `writer`.
    ///
    /// Change listeners are told about the removal; key subscribers are not,
    /// since there is no value to hand them.
    pub fn clear_as(&self, key: &str, writer: &str, comment: &str) -> bool {
        self.apply(vec![PendingWrite::clear(key, writer, comment)]) == 1
    }

    /// Apply `writes` in order and return how many changed the store.
    ///
    /// All entries are updated under one lock before any log line or
    /// callback runs, so a subscriber to the first key already sees the
    /// last key's new value. Repeated writes to one key collapse into the
    /// last of them, so every callback is handed what the store now holds.
    pub(crate) fn apply(&self, writes: Vec<PendingWrite>) -> usize {
        let writes = last_write_per_key(writes);
        if cfg!(debug_assertions) {
            for write in &writes {
                if let Some(value) = &write.value {
                    if let Some(expected) = self.schema.mismatch(&write.key, value) {
                        log::warn!(
                            "[DataStore] {} writes {} to '{}', schema expects {}",
                            write.writer,
                            value.kind(),
                            write.key,
                            expected
                        );
                    }
                }
            }
        }

        let now = self.clock.now();
        let mut applied = Vec::with_capacity(writes.len());
        {
            let mut entries = self.entries.write();
            for write in writes {
                let changed = match &write.value {
                    Some(value) => match entries.get_mut(&write.key) {
                        Some(entry) if entry.value == *value => false,
                        Some(entry) => {
                            entry.replace(value.clone(), &write.writer, &write.comment, now);
                            true
                        }
                        None => {
                            entries.insert(
                                write.key.clone(),
                                StoreEntry::new(value.clone(), &write.writer, &write.comment, now),
                            );
                            true
                        }
                    },
                    None => entries.remove(&write.key).is_some(),
                };
                if changed {
                    applied.push(write);
                }
            }
        }

        for write in &applied {
            match &write.value {
                Some(value) => log::trace!(
                    "[DataStore] {} := {} ({}: {})",
                    write.key,
                    value,
                    write.writer,
                    write.comment
                ),
                None => log::trace!(
                    "[DataStore] {} cleared ({}: {})",
                    write.key,
                    write.writer,
                    write.comment
                ),
            }

            if let Some(change_log) = &self.change_log {
                change_log.record(&ChangeRecord {
                    at: now,
                    key: &write.key,
                    value: write.value.as_ref(),
                    writer: &write.writer,
                    comment: &write.comment,
                });
            }

            self.broadcast(&write.key);
            if let Some(value) = &write.value {
                self.notify(&write.key, value);
            }
        }

        applied.len()
    }

    /// Start a batch of writes applied together on commit (or drop).
    pub fn batch(&self, writer: impl Into<String>) -> WriteBatch<'_> {
        WriteBatch::begin(self, writer)
    }

    // --- Read operations ---

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).map(|e| e.value.clone())
    }

    /// Read a key as `T`, falling back to `default` when the key is missing
    /// or holds a value of another kind.
    pub fn get_typed<T: FromValue>(&self, key: &str, default: T) -> T {
        let entries = self.entries.read();
        let Some(entry) = entries.get(key) else {
            return default;
        };
        match T::from_value(&entry.value) {
            Some(v) => v,
            None => {
                log::debug!(
                    "[DataStore] '{}' holds {}, returning caller default",
                    key,
                    entry.value.kind()
                );
                default
            }
        }
    }

    /// True when the key exists and its value is not empty.
    pub fn has(&self, key: &str) -> bool {
        self.entries
            .read()
            .get(key)
            .map(|e| !e.value.is_empty())
            .unwrap_or(false)
    }

    /// Full entry (value plus writer metadata).
    pub fn entry(&self, key: &str) -> Option<StoreEntry> {
        self.entries.read().get(key).cloned()
    }

    pub fn last_changed(&self, key: &str) -> Option<Timestamp> {
        self.entries.read().get(key).map(|e| e.meta.changed_at)
    }

    /// Seconds since `key` last changed.
    ///
    /// Returns `f64::NEG_INFINITY` for keys that were never set, which
    /// compares below any real elapsed time.
    pub fn seconds_since_change(&self, key: &str) -> f64 {
        match self.last_changed(key) {
            Some(at) => {
                let elapsed = self.clock.now() - at;
                elapsed.num_milliseconds() as f64 / 1000.0
            }
            None => f64::NEG_INFINITY,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    // --- Query operations ---

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys starting with `prefix` (e.g. `"user:hands:"`), sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Copy of every current key/value pair, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries
            .read()
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// The snapshot as a JSON object, for debug inspection surfaces.
    pub fn snapshot_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .snapshot()
            .into_iter()
            .map(|(k, v)| {
                let json = serde_json::to_value(&v).unwrap_or(serde_json::Value::Null);
                (k, json)
            })
            .collect();
        serde_json::Value::Object(map)
    }

    // --- Subscriptions ---

    /// Call `callback(key, value)` after every change of `key`.
    pub fn subscribe(
        &self,
        key: &str,
        callback: impl Fn(&str, &Value) + Send + Sync + 'static,
    ) -> SubscriptionId {
        if cfg!(debug_assertions) && !self.schema.is_empty() && !self.schema.is_declared(key) {
            log::debug!("[DataStore] subscription to undeclared key '{}'", key);
        }

        let id = SubscriptionId::next();
        self.subscribers
            .write()
            .entry(key.to_string())
            .or_default()
            .push(KeySubscriber {
                id,
                callback: Arc::new(callback),
            });
        id
    }

    /// Call `callback(key)` after any key changes or is cleared.
    pub fn on_any_change(&self, callback: impl Fn(&str) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.change_listeners.write().push(ChangeSubscriber {
            id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Remove a subscription or change listener. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        {
            let mut subscribers = self.subscribers.write();
            let owner = subscribers
                .iter()
                .find(|(_, list)| list.iter().any(|s| s.id == id))
                .map(|(key, _)| key.clone());
            if let Some(key) = owner {
                if let Some(list) = subscribers.get_mut(&key) {
                    list.retain(|s| s.id != id);
                    if list.is_empty() {
                        subscribers.remove(&key);
                    }
                }
                return true;
            }
        }

        let mut listeners = self.change_listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Number of callbacks registered for `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.subscribers.read().get(key).map(Vec::len).unwrap_or(0)
    }

    // --- Time ---

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    // --- Dispatch ---

    fn broadcast(&self, key: &str) {
        let listeners: Vec<ChangeSubscriber> = self.change_listeners.read().clone();
        for listener in &listeners {
            (listener.callback)(key);
        }
    }

    fn notify(&self, key: &str, value: &Value) {
        let subscribers: Vec<KeySubscriber> = match self.subscribers.read().get(key) {
            Some(list) => list.clone(),
            None => return,
        };
        for subscriber in &subscribers {
            (subscriber.callback)(key, value);
        }
    }
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("entries", &self.len())
            .field("subscribed_keys", &self.subscribers.read().len())
            .field("change_listeners", &self.change_listeners.read().len())
            .field("change_log", &self.change_log.is_some())
            .finish_non_exhaustive()
    }
}

/// Drop every write that a later write in the same group overrides.
fn last_write_per_key(writes: Vec<PendingWrite>) -> Vec<PendingWrite> {
    if writes.len() < 2 {
        return writes;
    }
    let mut last: HashMap<&str, usize> = HashMap::with_capacity(writes.len());
    for (i, write) in writes.iter().enumerate() {
        last.insert(write.key.as_str(), i);
    }
    if last.len() == writes.len() {
        return writes;
    }
    let keep: Vec<bool> = writes
        .iter()
        .enumerate()
        .map(|(i, write)| last.get(write.key.as_str()) == Some(&i))
        .collect();
    writes
        .into_iter()
        .zip(keep)
        .filter_map(|(write, keep)| keep.then_some(write))
        .collect()
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Configures a [`DataStore`] before construction.
#[derive(Default)]
pub struct DataStoreBuilder {
    clock: Option<Arc<dyn Clock>>,
    change_log: Option<Box<dyn ChangeLogSink>>,
    schema: KeySchema,
}

impl DataStoreBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn change_log(mut self, sink: impl ChangeLogSink + 'static) -> Self {
        self.change_log = Some(Box::new(sink));
        self
    }

    /// Append change lines to the file at `path`.
    pub fn log_to_file(self, path: impl Into<PathBuf>) -> Self {
        self.change_log(FileChangeLog::new(path))
    }

    pub fn schema(mut self, schema: KeySchema) -> Self {
        self.schema.extend(&schema);
        self
    }

    pub fn build(self) -> DataStore {
        DataStore {
            entries: RwLock::new(HashMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            change_listeners: RwLock::new(Vec::new()),
            change_log: self.change_log.map(BestEffortLog::new),
            schema: self.schema,
            clock: self.clock.unwrap_or_else(system_clock),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackboard::change_log::MemoryChangeLog;
    use crate::blackboard::value::{Vec3, ValueKind};
    use crate::clock::ManualClock;
    use parking_lot::Mutex;

    fn store_with_clock() -> (DataStore, Arc<ManualClock>) {
        let clock = ManualClock::shared();
        let store = DataStore::builder().clock(clock.clone()).build();
        (store, clock)
    }

    #[test]
    fn test_store_new() {
        let store = DataStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_set_unchanged_is_noop() {
        let (store, clock) = store_with_clock();
        let calls = Arc::new(Mutex::new(0));
        let c = calls.clone();
        store.subscribe("user:isPointing", move |_, _| *c.lock() += 1);

        assert!(store.set("user:isPointing", true, "PointingDetector", "start"));
        let first = store.last_changed("user:isPointing").unwrap();

        clock.advance_ms(500);
        assert!(!store.set("user:isPointing", true, "PointingDetector", "again"));

        assert_eq!(store.last_changed("user:isPointing"), Some(first));
        assert_eq!(*calls.lock(), 1);
        assert_eq!(store.entry("user:isPointing").unwrap().meta.comment, "start");
    }

    #[test]
    fn test_set_different_tag_is_a_change() {
        let store = DataStore::new();
        store.set("k", 1i64, "w", "");
        assert!(store.set("k", 1.0f64, "w", ""));
        assert_eq!(store.get("k"), Some(Value::Float(1.0)));
    }

    #[test]
    fn test_subscribers_fire_in_registration_order() {
        let store = Arc::new(DataStore::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = order.clone();
            store.subscribe("me:intent:action", move |_, _| order.lock().push(i));
        }
        store.set("me:intent:action", "wave", "Planner", "");
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_subscriber_observes_its_value_on_reread() {
        let store = Arc::new(DataStore::new());
        let seen = Arc::new(Mutex::new(None));

        let s = Arc::downgrade(&store);
        let seen2 = seen.clone();
        store.subscribe("user:lastPointedAt:name", move |key, value| {
            let store = s.upgrade().unwrap();
            assert_eq!(store.get(key).as_ref(), Some(value));
            *seen2.lock() = store.get(key);
        });

        store.set("user:lastPointedAt:name", "cup", "PointingDetector", "");
        assert_eq!(*seen.lock(), Some(Value::from("cup")));
    }

    #[test]
    fn test_double_subscription_fires_twice() {
        let store = DataStore::new();
        let calls = Arc::new(Mutex::new(0));
        for _ in 0..2 {
            let c = calls.clone();
            store.subscribe("k", move |_, _| *c.lock() += 1);
        }
        store.set("k", 1i64, "w", "");
        assert_eq!(*calls.lock(), 2);
        assert_eq!(store.subscriber_count("k"), 2);
    }

    #[test]
    fn test_unsubscribe() {
        let store = DataStore::new();
        let calls = Arc::new(Mutex::new(0));
        let c = calls.clone();
        let id = store.subscribe("k", move |_, _| *c.lock() += 1);

        store.set("k", 1i64, "w", "");
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.set("k", 2i64, "w", "");

        assert_eq!(*calls.lock(), 1);
        assert_eq!(store.subscriber_count("k"), 0);
    }

    #[test]
    fn test_change_broadcast_precedes_key_subscribers() {
        let store = DataStore::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        store.subscribe("k", move |_, _| o.lock().push("key"));
        let o = order.clone();
        let listener = store.on_any_change(move |key| o.lock().push(if key == "k" { "any" } else { "?" }));

        store.set("k", true, "w", "");
        assert_eq!(*order.lock(), vec!["any", "key"]);

        assert!(store.unsubscribe(listener));
        store.set("k", false, "w", "");
        assert_eq!(*order.lock(), vec!["any", "key", "key"]);
    }

    #[test]
    fn test_callback_may_write_other_keys() {
        let store = Arc::new(DataStore::new());
        let s = Arc::downgrade(&store);
        store.subscribe("user:isPointing", move |_, value| {
            if value.as_bool() == Some(false) {
                if let Some(store) = s.upgrade() {
                    store.clear_as("user:lastPointedAt:name", "Forgetter", "pointing stopped");
                }
            }
        });

        store.set("user:lastPointedAt:name", "cup", "PointingDetector", "");
        store.set("user:isPointing", false, "PointingDetector", "");
        assert!(!store.contains("user:lastPointedAt:name"));
    }

    #[test]
    fn test_get_typed_defaults() {
        let store = DataStore::new();
        assert_eq!(store.get_typed("missing", 42i64), 42);
        assert_eq!(store.get_typed("missing", "dflt".to_string()), "dflt");

        store.set("user:pointPos", Vec3::new(1.0, 0.0, 2.0), "PointingSensor", "");
        // Wrong type requested: default comes back.
        assert_eq!(store.get_typed("user:pointPos", 7.5f64), 7.5);
        assert_eq!(
            store.get_typed("user:pointPos", Vec3::ZERO),
            Vec3::new(1.0, 0.0, 2.0)
        );
    }

    #[test]
    fn test_has_respects_emptiness() {
        let store = DataStore::new();
        assert!(!store.has("speech:text"));
        store.set("speech:text", "", "Recognizer", "");
        assert!(store.contains("speech:text"));
        assert!(!store.has("speech:text"));
        store.set("speech:text", "hello", "Recognizer", "");
        assert!(store.has("speech:text"));
        store.set("user:isEngaged", false, "EngagementSensor", "");
        assert!(store.has("user:isEngaged"));
    }

    #[test]
    fn test_clear() {
        let store = DataStore::new();
        let broadcasts = Arc::new(Mutex::new(Vec::new()));
        let b = broadcasts.clone();
        store.on_any_change(move |key| b.lock().push(key.to_string()));

        store.set("user:pointPos", Vec3::ZERO, "PointingSensor", "");
        assert!(store.clear("user:pointPos"));
        assert!(!store.clear("user:pointPos"));

        assert!(!store.has("user:pointPos"));
        assert_eq!(store.get("user:pointPos"), None);
        assert_eq!(store.seconds_since_change("user:pointPos"), f64::NEG_INFINITY);
        assert_eq!(*broadcasts.lock(), vec!["user:pointPos", "user:pointPos"]);
    }

    #[test]
    fn test_seconds_since_change() {
        let (store, clock) = store_with_clock();
        assert_eq!(store.seconds_since_change("never"), f64::NEG_INFINITY);

        store.set("user:isEngaged", true, "EngagementSensor", "");
        clock.advance_ms(1500);
        assert_eq!(store.seconds_since_change("user:isEngaged"), 1.5);
        assert!(store.seconds_since_change("never") < store.seconds_since_change("user:isEngaged"));
    }

    #[test]
    fn test_change_log_lines() {
        let log = Arc::new(MemoryChangeLog::new());
        let store = DataStore::builder().change_log(log.clone()).build();

        store.set("user:isPointing", true, "PointingDetector", "pointing started");
        store.set("user:isPointing", true, "PointingDetector", "pointing started");
        store.clear_as("user:isPointing", "Reset", "shutdown");

        let lines = log.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("user:isPointing := true (PointingDetector: pointing started)"));
        assert!(lines[1].ends_with("user:isPointing cleared (Reset: shutdown)"));
    }

    #[test]
    fn test_log_failure_does_not_block_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::builder().log_to_file(dir.path()).build();
        assert!(store.set("k", 1i64, "w", ""));
        assert_eq!(store.get_typed("k", 0i64), 1);
    }

    #[test]
    fn test_schema_mismatch_still_writes() {
        let schema = KeySchema::new().with("user:isEngaged", ValueKind::Bool);
        let store = DataStore::builder().schema(schema).build();
        assert!(store.set("user:isEngaged", 1i64, "Confused", ""));
        assert_eq!(store.get("user:isEngaged"), Some(Value::Int(1)));
    }

    #[test]
    fn test_keys_with_prefix_and_snapshot() {
        let store = DataStore::new();
        store.set("user:hands:left", Vec3::new(0.1, 1.0, 0.3), "Skeleton", "");
        store.set("user:hands:right", Vec3::new(-0.1, 1.0, 0.3), "Skeleton", "");
        store.set("me:intent:action", "idle", "Planner", "");

        assert_eq!(
            store.keys_with_prefix("user:hands:"),
            vec!["user:hands:left", "user:hands:right"]
        );
        assert_eq!(store.keys().len(), 3);

        let snapshot = store.snapshot();
        assert_eq!(snapshot["me:intent:action"], Value::from("idle"));

        let json = store.snapshot_json();
        assert_eq!(json["me:intent:action"]["value"], "idle");
        assert_eq!(json["user:hands:left"]["kind"], "vector3");
    }

    #[test]
    fn test_entry_metadata() {
        let (store, clock) = store_with_clock();
        store.set("k", 1i64, "A", "first");
        clock.advance_ms(10);
        store.set("k", 2i64, "B", "second");

        let entry = store.entry("k").unwrap();
        assert_eq!(entry.meta.writer, "B");
        assert_eq!(entry.meta.version, 2);
        assert_eq!(entry.meta.changed_at, clock.now());
    }
}
