//! Named-slot cache of the last known dataset per logical key.

use std::collections::HashMap;

use crate::dataset::Dataset;
use crate::error::{Error, Result};

/// Last-write-wins cache, no expiry.
#[derive(Debug, Clone, Default)]
pub struct DataStore {
    slots: HashMap<String, Dataset>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`. With `overwrite == false` an existing slot
    /// is left untouched.
    pub fn set(&mut self, key: impl Into<String>, value: Dataset, overwrite: bool) {
        let key = key.into();
        if overwrite || !self.slots.contains_key(&key) {
            self.slots.insert(key, value);
        }
    }

    /// The dataset in slot `key`, or [`Error::NotFound`].
    pub fn get(&self, key: &str) -> Result<&Dataset> {
        self.slots
            .get(key)
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    pub fn is_set(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_slot_is_not_found() {
        let store = DataStore::new();
        assert!(!store.is_set("products_data"));
        assert!(matches!(store.get("products_data"), Err(Error::NotFound(k)) if k == "products_data"));
    }

    #[test]
    fn test_overwrite_flag() {
        let mut store = DataStore::new();
        store.set("slot", Dataset::new(["a"]), true);
        store.set("slot", Dataset::new(["b"]), false);
        assert_eq!(store.get("slot").unwrap().columns(), &["a".to_string()]);

        store.set("slot", Dataset::new(["b"]), true);
        assert_eq!(store.get("slot").unwrap().columns(), &["b".to_string()]);
    }
}
