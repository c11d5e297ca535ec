use crate::error::Result;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Key/value persistence used by the lifecycle layer.
///
/// `get` never fails: a key that was never set reads as `""`.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> String;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn snapshot(&self) -> BTreeMap<String, String>;
}

/// Volatile store, used where persistence is not wanted (tests, dry runs).
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            map: RwLock::new(map),
        }
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> String {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned().unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn snapshot(&self) -> BTreeMap<String, String> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_missing_key_is_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.get("moniker"), "");
    }

    #[test]
    fn test_memory_store_set_get() {
        let store = MemoryStore::with_entries([("init_done", "true")]);
        store.set("moniker", "node-1").unwrap();
        assert_eq!(store.get("moniker"), "node-1");
        assert_eq!(store.get("init_done"), "true");
        assert_eq!(store.snapshot().len(), 2);
    }
}
