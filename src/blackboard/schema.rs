//! Key schema — the expected value kind of well-known keys.
//!
//! The store never rejects a write because of the schema. In debug builds
//! a mismatch is logged at `set` time and subscriptions to undeclared keys
//! are logged at `subscribe` time; release builds skip the checks.

use std::collections::HashMap;

use super::value::{Value, ValueKind};

#[derive(Debug, Clone, Default)]
pub struct KeySchema {
    expected: HashMap<String, ValueKind>,
}

impl KeySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the kind a key is expected to hold (builder style).
    pub fn with(mut self, key: impl Into<String>, kind: ValueKind) -> Self {
        self.expect(key, kind);
        self
    }

    pub fn expect(&mut self, key: impl Into<String>, kind: ValueKind) {
        self.expected.insert(key.into(), kind);
    }

    pub fn expected_kind(&self, key: &str) -> Option<ValueKind> {
        self.expected.get(key).copied()
    }

    pub fn is_declared(&self, key: &str) -> bool {
        self.expected.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.expected.is_empty()
    }

    pub fn len(&self) -> usize {
        self.expected.len()
    }

    /// Returns the expected kind when `value` does not match it.
    /// Undeclared keys always pass.
    pub fn mismatch(&self, key: &str, value: &Value) -> Option<ValueKind> {
        match self.expected.get(key) {
            Some(kind) if *kind != value.kind() => Some(*kind),
            _ => None,
        }
    }

    /// Merge another schema into this one; later declarations win.
    pub fn extend(&mut self, other: &KeySchema) {
        for (key, kind) in &other.expected {
            self.expected.insert(key.clone(), *kind);
        }
    }
}
