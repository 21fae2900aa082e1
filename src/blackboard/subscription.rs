//! Subscriber bookkeeping for the data store.
//!
//! Each callback gets a [`SubscriptionId`] at registration so it can later
//! be removed. Registering the same closure twice yields two ids and two
//! invocations per change.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::value::Value;

/// Callback invoked after a key's value changed: `(key, new_value)`.
pub type KeyCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Callback invoked after any key changed: `(key)`.
pub type ChangeCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle identifying one registered callback.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

static SUBSCRIPTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl SubscriptionId {
    pub(crate) fn next() -> Self {
        Self(SUBSCRIPTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

#[derive(Clone)]
pub(crate) struct KeySubscriber {
    pub id: SubscriptionId,
    pub callback: KeyCallback,
}

#[derive(Clone)]
pub(crate) struct ChangeSubscriber {
    pub id: SubscriptionId,
    pub callback: ChangeCallback,
}
