//! Sparse cell storage with an exact reverse index.
//!
//! [`CellStore`] maps cell keys to non-empty values and keeps a value -> keys
//! index in lockstep, so reverse lookups never see a stale key.

use std::collections::{BTreeSet, HashMap};

/// Sparse key -> value storage plus its value -> keys inverse.
///
/// A key is present iff its value is non-empty; reading an absent key yields
/// the empty string.
#[derive(Debug, Clone, Default)]
pub struct CellStore {
    cells: HashMap<String, String>,
    index: HashMap<String, BTreeSet<String>>,
}

impl CellStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under `key`, or `""` when absent.
    pub fn get(&self, key: &str) -> &str {
        self.cells.get(key).map(String::as_str).unwrap_or("")
    }

    /// Store `value` under `key`. An empty value removes the key.
    ///
    /// Keys are stored as given. Use the canonical form ("B3", see
    /// [`canonical_key`](crate::sheet::coordinate::canonical_key)); the writer
    /// skips malformed keys and prefers the canonical spelling of a cell.
    pub fn set(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            if let Some(old) = self.cells.remove(key) {
                self.unindex(&old, key);
            }
            return;
        }

        self.insert(key.to_string(), value.to_string());
    }

    /// Insert an owned pair. `value` must be non-empty.
    pub(crate) fn insert(&mut self, key: String, value: String) {
        debug_assert!(!value.is_empty());
        if let Some(old) = self.cells.remove(&key) {
            self.unindex(&old, &key);
        }
        self.index
            .entry(value.clone())
            .or_default()
            .insert(key.clone());
        self.cells.insert(key, value);
    }

    /// Every key currently holding exactly `value`.
    pub fn search(&self, value: &str) -> Vec<String> {
        self.index
            .get(value)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop every cell and index entry.
    pub fn clear(&mut self) {
        self.cells.clear();
        self.index.clear();
    }

    /// Number of stored (non-empty) cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over `(key, value)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The raw key -> value map, for serialization.
    pub fn cells(&self) -> &HashMap<String, String> {
        &self.cells
    }

    fn unindex(&mut self, value: &str, key: &str) {
        if let Some(keys) = self.index.get_mut(value) {
            keys.remove(key);
            if keys.is_empty() {
                self.index.remove(value);
            }
        }
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        for (key, value) in &self.cells {
            assert!(!value.is_empty());
            assert!(self.index.get(value).is_some_and(|keys| keys.contains(key)));
        }
        for (value, keys) in &self.index {
            assert!(!keys.is_empty());
            for key in keys {
                assert_eq!(self.cells.get(key), Some(value));
            }
        }
    }
}
