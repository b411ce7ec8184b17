//! Operator storage.
//!
//! A small key/value side table owned by exactly one operator. Join keeps
//! per-key reference counts here, Exists keeps relationship sizes and Take
//! keeps its per-partition window state.
//!
//! Keys are value tuples. Join deletes a key when its count returns to zero,
//! so for reference counts absence means "not hydrated". Exists stores zero
//! sizes explicitly.

use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use ripple_core::Value;

/// Storage key: a tuple of values.
pub type StorageKey = Vec<Value>;

/// Per-operator key/value storage.
#[derive(Debug)]
pub struct Storage<V> {
    entries: RefCell<HashMap<StorageKey, V>>,
}

impl<V> Default for Storage<V> {
    fn default() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
        }
    }
}

impl<V: Clone> Storage<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the value at `key`.
    pub fn get(&self, key: &[Value]) -> Option<V> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn set(&self, key: StorageKey, value: V) {
        self.entries.borrow_mut().insert(key, value);
    }

    /// Removes `key`, returning its value.
    pub fn del(&self, key: &[Value]) -> Option<V> {
        self.entries.borrow_mut().remove(key)
    }

    pub fn contains(&self, key: &[Value]) -> bool {
        self.entries.borrow().contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Returns every entry, sorted by key.
    pub fn entries(&self) -> Vec<(StorageKey, V)> {
        let mut out: Vec<_> = self
            .entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
