//! The module contract and the store handle each module writes through.

use std::fmt;
use std::sync::Arc;

use crate::blackboard::{DataStore, FromValue, SubscriptionId, Value, WriteBatch};

use super::error::ModuleError;

/// Display hook: `(module, key, value)` after a module changed a key.
///
/// Stands in for the on-screen status panel of the host application.
pub type DisplayHook = Arc<dyn Fn(&str, &str, &Value) + Send + Sync>;

/// A unit of behavior that reads and writes only through the store.
pub trait Module: Send {
    /// Unique name; used as the writer id for every store write.
    fn name(&self) -> &str;

    /// Called once before the first tick. Subscriptions go here.
    fn start(&mut self) -> Result<(), ModuleError> {
        Ok(())
    }

    /// Called once per frame of the host loop.
    fn tick(&mut self) -> Result<(), ModuleError>;

    /// Called once when the host stops.
    fn stop(&mut self) {}
}

/// A module's view of the store: writes are attributed to the module and
/// changed values are forwarded to the display hook.
#[derive(Clone)]
pub struct ModuleContext {
    name: String,
    store: Arc<DataStore>,
    display: Option<DisplayHook>,
}

impl ModuleContext {
    pub fn new(name: impl Into<String>, store: Arc<DataStore>) -> Self {
        Self {
            name: name.into(),
            store,
            display: None,
        }
    }

    pub fn with_display(mut self, display: DisplayHook) -> Self {
        self.display = Some(display);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    /// Write `value` under `key` as this module and tell the display when
    /// it actually changed. Returns whether it changed.
    pub fn set_value(&self, key: &str, value: impl Into<Value>, comment: &str) -> bool {
        let value = value.into();
        let display_value = self.display.as_ref().map(|_| value.clone());
        let changed = self.store.set(key, value, &self.name, comment);
        if changed {
            if let (Some(display), Some(value)) = (&self.display, display_value) {
                display(&self.name, key, &value);
            }
        }
        changed
    }

    pub fn clear_value(&self, key: &str, comment: &str) -> bool {
        self.store.clear_as(key, &self.name, comment)
    }

    /// Batch of writes attributed to this module.
    pub fn batch(&self) -> WriteBatch<'_> {
        self.store.batch(self.name.clone())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(key)
    }

    pub fn get_typed<T: FromValue>(&self, key: &str, default: T) -> T {
        self.store.get_typed(key, default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.store.has(key)
    }

    pub fn subscribe(
        &self,
        key: &str,
        callback: impl Fn(&str, &Value) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.store.subscribe(key, callback)
    }
}

impl fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleContext")
            .field("name", &self.name)
            .field("display", &self.display.is_some())
            .finish_non_exhaustive()
    }
}
