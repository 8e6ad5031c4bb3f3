//! In-memory settings store.

use crate::{SettingsStore, StoreError};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// [`SettingsStore`] kept in process memory.
///
/// Used by tests and simulations; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored value.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.values.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    fn put_many(&self, entries: &[(&str, String)]) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        for (key, value) in entries {
            values.insert(key.to_string(), value.clone());
        }
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut values = self.values.lock();
        for key in keys {
            values.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_remove() {
        let store = MemorySettingsStore::new();
        assert!(store.get("a").is_none());

        store.put("a", "1".into()).unwrap();
        store.put("b", "2".into()).unwrap();
        assert_eq!(store.get("a").as_deref(), Some("1"));

        store
            .put_many(&[("b", "3".into()), ("c", "4".into())])
            .unwrap();
        assert_eq!(store.get("b").as_deref(), Some("3"));

        store.remove(&["a", "missing"]).unwrap();
        assert!(store.get("a").is_none());
        assert_eq!(store.snapshot().len(), 2);
    }
}
