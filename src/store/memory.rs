use crate::core::store::SharedStore;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// In-memory store, for tests and single-shot runs with no profile on disk.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl SharedStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let map = self.inner.read().unwrap();
        let value = map.get(key).cloned();
        if value.is_some() {
            debug!("Store HIT for key: {}", key);
        } else {
            debug!("Store MISS for key: {}", key);
        }
        value
    }

    fn set(&self, key: &str, value: &str) {
        let mut map = self.inner.write().unwrap();
        debug!("Store SET for key: {}", key);
        map.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        let mut map = self.inner.write().unwrap();
        map.remove(key);
        debug!("Store REMOVE for key: {}", key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_get_set() {
        let store = MemoryStore::new();

        // Initially, store is empty
        assert!(store.get("key1").is_none());

        store.set("key1", "value1");
        assert_eq!(store.get("key1"), Some("value1".to_string()));

        // Whole-value replace
        store.set("key1", "value2");
        assert_eq!(store.get("key1"), Some("value2".to_string()));

        assert!(store.get("key2").is_none());
    }

    #[test]
    fn test_store_remove() {
        let store = MemoryStore::new();

        store.set("key1", "value1");
        assert!(store.get("key1").is_some());

        store.remove("key1");
        assert!(store.get("key1").is_none());

        // Removing an absent key is a no-op
        store.remove("key1");
    }
}
