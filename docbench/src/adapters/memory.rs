//! In-memory adapter for tests and dry runs.

use dashmap::DashMap;

use docbench_core::{Document, QueryArg, QueryKind};

use crate::store::DocStore;
use crate::{BenchError, BenchResult};

/// Concurrent-map store; queries scan the whole map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: DashMap<String, Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl DocStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn create(&self, key: &str, doc: &Document) -> BenchResult<()> {
        self.docs.insert(key.to_string(), doc.clone());
        Ok(())
    }

    fn read(&self, key: &str) -> BenchResult<Option<Document>> {
        Ok(self.docs.get(key).map(|entry| entry.value().clone()))
    }

    fn update(&self, key: &str, doc: &Document) -> BenchResult<()> {
        self.docs.insert(key.to_string(), doc.clone());
        Ok(())
    }

    fn delete(&self, key: &str) -> BenchResult<()> {
        match self.docs.remove(key) {
            Some(_) => Ok(()),
            None => Err(BenchError::Store(format!("delete {}: no such key", key))),
        }
    }

    fn query(&self, kind: QueryKind, arg: &QueryArg) -> BenchResult<u64> {
        let hits = self
            .docs
            .iter()
            .filter(|entry| matches_query(entry.value(), kind, arg))
            .count();
        Ok(hits as u64)
    }
}

fn matches_query(doc: &Document, kind: QueryKind, arg: &QueryArg) -> bool {
    match (kind, arg) {
        (QueryKind::ByCategory, QueryArg::Int(v)) => doc.category == *v,
        (QueryKind::ByLocalGroup, QueryArg::Text(v)) => doc.local_group == *v,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docbench_core::{format_key, generate};

    #[test]
    fn test_crud_roundtrip() {
        let store = MemoryStore::new();
        let key = format_key(1);
        let doc = generate(1, &key, 600);

        store.create(&key, &doc).unwrap();
        assert_eq!(store.read(&key).unwrap().as_ref(), Some(&doc));

        let newer = generate(1, &key, 700);
        store.update(&key, &newer).unwrap();
        assert_eq!(store.read(&key).unwrap().as_ref(), Some(&newer));

        store.delete(&key).unwrap();
        assert!(store.read(&key).unwrap().is_none());
        assert!(store.delete(&key).is_err());
    }

    #[test]
    fn test_query_counts_matches() {
        let store = MemoryStore::new();
        for index in 1..=20i64 {
            let key = format_key(index);
            store.create(&key, &generate(index, &key, 600)).unwrap();
        }

        // Indices 1..=20 hold categories 1,2,3,4,0 cyclically.
        let hits = store
            .query(QueryKind::ByCategory, &QueryArg::Int(0))
            .unwrap();
        assert_eq!(hits, 4);

        // All twenty share local group hex(index / 100) == "0".
        let hits = store
            .query(QueryKind::ByLocalGroup, &QueryArg::Text("0".into()))
            .unwrap();
        assert_eq!(hits, 20);
    }
}
