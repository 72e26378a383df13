use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::backend::StoreBackend;
use crate::error::{StoreError, StoreResult};

/// In-memory, `BTreeMap`-based store.
///
/// Intended for tests and for documents that never touch disk (the default
/// target when a foreign file is opened without one). Values are cloned on
/// read and write; the sorted map gives `list_prefix` its ordering for free.
pub struct InMemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
    read_only: bool,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            read_only: false,
        }
    }

    /// A read-only view over a copy of this store's current contents.
    pub fn snapshot_read_only(&self) -> Self {
        let entries = self.entries.read().expect("lock poisoned").clone();
        Self {
            entries: RwLock::new(entries),
            read_only: true,
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored values.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .read()
            .expect("lock poisoned")
            .values()
            .map(|v| v.len() as u64)
            .sum()
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for InMemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.check_writable()?;
        let mut map = self.entries.write().expect("lock poisoned");
        map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check_writable()?;
        let mut map = self.entries.write().expect("lock poisoned");
        Ok(map.remove(key).is_some())
    }

    fn list_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn delete_prefix(&self, prefix: &str) -> StoreResult<usize> {
        self.check_writable()?;
        let mut map = self.entries.write().expect("lock poisoned");
        let before = map.len();
        map.retain(|k, _| !k.starts_with(prefix));
        Ok(before - map.len())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        let map = self.entries.read().expect("lock poisoned");
        Ok(map.contains_key(key))
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("key_count", &self.len())
            .field("read_only", &self.read_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let store = InMemoryStore::new();
        store.set("a/.zgroup", b"{}").unwrap();
        assert_eq!(store.get("a/.zgroup").unwrap().as_deref(), Some(&b"{}"[..]));
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn set_replaces_value() {
        let store = InMemoryStore::new();
        store.set("k", b"one").unwrap();
        store.set("k", b"two").unwrap();
        assert_eq!(store.get("k").unwrap().unwrap(), b"two");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn list_prefix_is_sorted_and_bounded() {
        let store = InMemoryStore::new();
        for key in ["b/2", "a/1", "b/1", "ba/1", "c"] {
            store.set(key, b"x").unwrap();
        }
        assert_eq!(store.list_prefix("b/").unwrap(), vec!["b/1", "b/2"]);
        assert_eq!(store.list_prefix("").unwrap().len(), 5);
        assert!(store.list_prefix("z").unwrap().is_empty());
    }

    #[test]
    fn delete_reports_presence() {
        let store = InMemoryStore::new();
        store.set("k", b"v").unwrap();
        assert!(store.delete("k").unwrap());
        assert!(!store.delete("k").unwrap());
    }

    #[test]
    fn delete_prefix_removes_subtree_only() {
        let store = InMemoryStore::new();
        for key in ["rkns/.zgroup", "rkns/a/.zarray", "rkns_other/.zgroup", "_raw/.zgroup"] {
            store.set(key, b"x").unwrap();
        }
        assert_eq!(store.delete_prefix("rkns/").unwrap(), 2);
        assert_eq!(
            store.list_prefix("").unwrap(),
            vec!["_raw/.zgroup", "rkns_other/.zgroup"]
        );
    }

    #[test]
    fn read_only_snapshot_refuses_writes() {
        let store = InMemoryStore::new();
        store.set("k", b"v").unwrap();
        let snapshot = store.snapshot_read_only();
        assert!(snapshot.is_read_only());
        assert_eq!(snapshot.get("k").unwrap().unwrap(), b"v");
        assert!(matches!(snapshot.set("k", b"w"), Err(StoreError::ReadOnly)));
        assert!(matches!(snapshot.delete("k"), Err(StoreError::ReadOnly)));
    }

    #[test]
    fn total_bytes_sums_values() {
        let store = InMemoryStore::new();
        store.set("a", b"12345").unwrap();
        store.set("b", b"123").unwrap();
        assert_eq!(store.total_bytes(), 8);
    }

    #[test]
    fn concurrent_reads_are_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryStore::new());
        store.set("shared", b"data").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    assert_eq!(store.get("shared").unwrap().unwrap(), b"data");
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
    }

    #[test]
    fn debug_format() {
        let store = InMemoryStore::new();
        store.set("x", b"1").unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryStore"));
        assert!(debug.contains("key_count"));
    }
}
