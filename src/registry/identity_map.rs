//! Per-model identity map
//!
//! # Invariants
//!
//! - At most one `Record` per `RecordKey`
//! - A record for an occupied key is merged into the occupant, never stored
//!   beside it
//! - Entries leave only through `evict`, `rekey` or `clear`
//! - Insertion order is preserved

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::model::{Record, RecordKey};
use crate::observability::{Event, TARGET_CACHE};

#[derive(Debug, Default)]
pub struct IdentityMap {
    model: String,
    entries: RwLock<IndexMap<RecordKey, Record>>,
}

impl IdentityMap {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Stores `record` under its key. When the key is taken, the incoming
    /// attributes are merged into the occupant and the occupant is returned.
    pub fn insert(&self, record: Record) -> Record {
        let key = record.key();
        let mut entries = self.entries.write();
        match entries.get(&key) {
            Some(existing) if existing.ptr_eq(&record) => existing.clone(),
            Some(existing) => {
                existing.merge(&record.attributes());
                trace!(target: TARGET_CACHE, event = %Event::CacheMerge, model = %self.model, key = %key);
                existing.clone()
            }
            None => {
                trace!(target: TARGET_CACHE, event = %Event::CacheInsert, model = %self.model, key = %key);
                entries.insert(key, record.clone());
                record
            }
        }
    }

    pub fn lookup(&self, key: &RecordKey) -> Option<Record> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn evict(&self, key: &RecordKey) -> Option<Record> {
        let evicted = self.entries.write().shift_remove(key);
        if evicted.is_some() {
            trace!(target: TARGET_CACHE, event = %Event::CacheEvict, model = %self.model, key = %key);
        }
        evicted
    }

    /// Moves the entry under `old` to `new`, keeping its position. An entry
    /// already stored under `new` is replaced.
    pub fn rekey(&self, old: &RecordKey, new: RecordKey) -> bool {
        let mut entries = self.entries.write();
        let Some(index) = entries.get_index_of(old) else {
            return false;
        };
        let Some((_, record)) = entries.shift_remove_index(index) else {
            return false;
        };
        if let Some(displaced) = entries.shift_remove(&new) {
            warn!(
                target: TARGET_CACHE,
                model = %self.model,
                key = %new,
                displaced = %displaced.token(),
                "rekey replaced an existing entry"
            );
        }
        let position = index.min(entries.len());
        entries.shift_insert(position, new.clone(), record);
        trace!(
            target: TARGET_CACHE,
            event = %Event::CacheRekey,
            model = %self.model,
            from = %old,
            to = %new
        );
        true
    }

    /// Every record satisfying `predicate`, in insertion order.
    pub fn query_local<F>(&self, predicate: F) -> Vec<Record>
    where
        F: Fn(&Record) -> bool,
    {
        self.entries
            .read()
            .values()
            .filter(|record| predicate(record))
            .cloned()
            .collect()
    }

    pub fn records(&self) -> Vec<Record> {
        self.entries.read().values().cloned().collect()
    }

    pub fn keys(&self) -> Vec<RecordKey> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelSchema, PrimaryKey};
    use serde_json::json;
    use std::sync::Weak;

    fn record(attrs: serde_json::Value, key: Option<i64>) -> Record {
        let attrs = match attrs {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        Record::new(
            ModelSchema::bare("Comment", "id"),
            Weak::new(),
            attrs,
            key.map(PrimaryKey::Int),
        )
    }

    #[test]
    fn test_insert_merges_into_occupant() {
        let map = IdentityMap::new("Comment");
        let first = map.insert(record(json!({"id": 1, "body": "old"}), Some(1)));
        let second = map.insert(record(json!({"id": 1, "body": "new"}), Some(1)));

        assert!(first.ptr_eq(&second));
        assert_eq!(map.len(), 1);
        assert_eq!(first.get("body"), Some(json!("new")));
    }

    #[test]
    fn test_insert_same_handle_twice() {
        let map = IdentityMap::new("Comment");
        let r = record(json!({"body": "x"}), None);
        map.insert(r.clone());
        map.insert(r.clone());
        assert_eq!(map.len(), 1);
        assert!(map.contains(&r.key()));
    }

    #[test]
    fn test_evict_and_lookup() {
        let map = IdentityMap::new("Comment");
        let r = map.insert(record(json!({"id": 5}), Some(5)));
        let key = RecordKey::Primary(PrimaryKey::Int(5));

        assert_eq!(map.lookup(&key), Some(r));
        assert!(map.evict(&key).is_some());
        assert!(map.lookup(&key).is_none());
        assert!(map.evict(&key).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn test_rekey_keeps_position() {
        let map = IdentityMap::new("Comment");
        let a = map.insert(record(json!({"id": 1}), Some(1)));
        let b = map.insert(record(json!({"body": "draft"}), None));
        let c = map.insert(record(json!({"id": 3}), Some(3)));

        let new_key = RecordKey::Primary(PrimaryKey::Int(2));
        assert!(map.rekey(&b.key(), new_key.clone()));
        assert!(!map.rekey(&RecordKey::Temporary(uuid::Uuid::new_v4()), new_key.clone()));

        assert_eq!(map.lookup(&new_key), Some(b.clone()));
        assert_eq!(map.records(), vec![a, b, c]);
    }

    #[test]
    fn test_query_local_and_clear() {
        let map = IdentityMap::new("Comment");
        map.insert(record(json!({"id": 1, "score": 3}), Some(1)));
        map.insert(record(json!({"id": 2, "score": 9}), Some(2)));

        let high = map.query_local(|r| r.get("score").and_then(|v| v.as_i64()).unwrap_or(0) > 5);
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].get("id"), Some(json!(2)));

        assert_eq!(map.clear(), 2);
        assert!(map.is_empty());
    }
}
