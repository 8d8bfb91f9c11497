//! In-memory store backed by DashMap.
//!
//! Used for tests, dry runs and short-lived services that ingest at startup.
//! All data is lost on process exit.

use dashmap::DashMap;

use crate::store::{
    KeyValueStore, Namespace, StoreResult, WriteBatch, WriteOp, list_bounds, lpush_onto,
};

/// Concurrent in-memory store using sharded hashmaps.
#[derive(Debug, Default)]
pub struct MemStore {
    strings: DashMap<(Namespace, String), String>,
    lists: DashMap<(Namespace, String), Vec<String>>,
}

impl MemStore {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of string entries in one namespace.
    pub fn len(&self, namespace: Namespace) -> usize {
        self.strings
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .count()
    }

    /// Whether the store holds no strings and no lists.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.lists.is_empty()
    }

    fn push(&self, namespace: Namespace, key: &str, values: &[String]) -> usize {
        let mut entry = self.lists.entry((namespace, key.to_string())).or_default();
        let updated = lpush_onto(entry.value(), values);
        *entry.value_mut() = updated;
        entry.value().len()
    }
}

impl KeyValueStore for MemStore {
    fn get(&self, namespace: Namespace, key: &str) -> StoreResult<Option<String>> {
        Ok(self
            .strings
            .get(&(namespace, key.to_string()))
            .map(|v| v.value().clone()))
    }

    fn set(&self, namespace: Namespace, key: &str, value: &str) -> StoreResult<()> {
        self.strings
            .insert((namespace, key.to_string()), value.to_string());
        Ok(())
    }

    fn mget(&self, namespace: Namespace, keys: &[String]) -> StoreResult<Vec<Option<String>>> {
        keys.iter().map(|key| self.get(namespace, key)).collect()
    }

    fn lrange(
        &self,
        namespace: Namespace,
        key: &str,
        start: i64,
        stop: i64,
    ) -> StoreResult<Vec<String>> {
        let Some(list) = self.lists.get(&(namespace, key.to_string())) else {
            return Ok(Vec::new());
        };
        Ok(match list_bounds(list.len(), start, stop) {
            Some((from, to)) => list[from..=to].to_vec(),
            None => Vec::new(),
        })
    }

    fn lpush(&self, namespace: Namespace, key: &str, values: &[String]) -> StoreResult<usize> {
        Ok(self.push(namespace, key, values))
    }

    fn keys_with_prefix(&self, namespace: Namespace, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .strings
            .iter()
            .filter(|entry| entry.key().0 == namespace && entry.key().1.starts_with(prefix))
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn execute(&self, batch: WriteBatch) -> StoreResult<usize> {
        let mut applied = 0;
        for op in batch.into_ops() {
            match op {
                WriteOp::Set {
                    namespace,
                    key,
                    value,
                } => {
                    self.strings.insert((namespace, key), value);
                }
                WriteOp::LPush {
                    namespace,
                    key,
                    values,
                } => {
                    self.push(namespace, &key, &values);
                }
            }
            applied += 1;
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let store = MemStore::new();
        store
            .set(Namespace::CanonicalToType, "MONDO:0005002", "biolink:Disease")
            .unwrap();
        assert_eq!(
            store.get(Namespace::CanonicalToType, "MONDO:0005002").unwrap(),
            Some("biolink:Disease".to_string())
        );
    }

    #[test]
    fn namespaces_are_independent() {
        let store = MemStore::new();
        store.set(Namespace::CanonicalToType, "X:1", "a").unwrap();
        assert_eq!(store.get(Namespace::InformationContent, "X:1").unwrap(), None);
        assert_eq!(store.len(Namespace::CanonicalToType), 1);
        assert_eq!(store.len(Namespace::InformationContent), 0);
    }

    #[test]
    fn mget_is_aligned_with_keys() {
        let store = MemStore::new();
        store.set(Namespace::TermToCanonical, "A", "1").unwrap();
        store.set(Namespace::TermToCanonical, "C", "3").unwrap();
        let keys = vec!["A".to_string(), "B".to_string(), "C".to_string(), "A".to_string()];
        let values = store.mget(Namespace::TermToCanonical, &keys).unwrap();
        assert_eq!(
            values,
            vec![Some("1".into()), None, Some("3".into()), Some("1".into())]
        );
    }

    #[test]
    fn lists_push_and_range() {
        let store = MemStore::new();
        let ns = Namespace::PrefixStatistics;
        store.lpush(ns, "types", &["a".into(), "b".into()]).unwrap();
        let len = store.lpush(ns, "types", &["c".into()]).unwrap();
        assert_eq!(len, 3);
        assert_eq!(store.lrange(ns, "types", 0, -1).unwrap(), vec!["c", "b", "a"]);
        assert_eq!(store.lrange(ns, "missing", 0, -1).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn execute_applies_batch_in_order() {
        let store = MemStore::new();
        let mut batch = WriteBatch::new();
        batch.set(Namespace::CanonicalToType, "X:1", "first");
        batch.set(Namespace::CanonicalToType, "X:1", "second");
        batch.lpush(Namespace::PrefixStatistics, "types", vec!["t".into()]);
        assert_eq!(store.execute(batch).unwrap(), 3);
        assert_eq!(
            store.get(Namespace::CanonicalToType, "X:1").unwrap(),
            Some("second".into())
        );
    }

    #[test]
    fn keys_with_prefix_are_sorted_and_scoped() {
        let store = MemStore::new();
        let ns = Namespace::PrefixStatistics;
        store.set(ns, "file-b", "{}").unwrap();
        store.set(ns, "file-a", "{}").unwrap();
        store.set(ns, "biolink:Disease", "{}").unwrap();
        store.set(Namespace::CanonicalToType, "file-c", "{}").unwrap();
        assert_eq!(store.keys_with_prefix(ns, "file-").unwrap(), vec!["file-a", "file-b"]);
    }

    #[test]
    fn concurrent_access() {
        use std::sync::Arc;
        let store = Arc::new(MemStore::new());
        let handles: Vec<_> = (0..100)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .set(Namespace::TermToCanonical, &format!("ID:{i}"), "C:1")
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.len(Namespace::TermToCanonical), 100);
    }
}
