//! In-process key-value store.
//!
//! The default store for tests and single-process deployments. Entries
//! record their write time for `modified` queries and carry an optional
//! absolute expiry honored on read.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::host::Timestamp;
use crate::lock::{rw_read, rw_write};

use super::KvStore;

const SOURCE: &str = "store::memory";

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    stored_at: Timestamp,
    expires_at: Option<Timestamp>,
}

impl Entry {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// RwLock-guarded map with TTL-on-read semantics.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn now() -> Timestamp {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let entries = rw_read(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if !entry.is_expired(Self::now()) => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Value, ttl_secs: u64) -> Result<(), StoreError> {
        let now = Self::now();
        let expires_at = (ttl_secs > 0).then(|| now + ttl_secs as Timestamp);
        rw_write(&self.entries, SOURCE, "set").insert(
            key.to_string(),
            Entry {
                value,
                stored_at: now,
                expires_at,
            },
        );
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        rw_write(&self.entries, SOURCE, "flush").clear();
        Ok(())
    }

    fn modified(&self, key: &str) -> Option<Timestamp> {
        let entries = rw_read(&self.entries, SOURCE, "modified");
        let entry = entries.get(key)?;
        if entry.is_expired(Self::now()) {
            return None;
        }
        Some(entry.stored_at)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use serde_json::json;

    use super::*;

    #[test]
    fn roundtrip() {
        let store = MemoryStore::new();

        assert!(store.get("k").expect("get").is_none());

        store.set("k", json!({"a": 1}), 0).expect("set");
        assert_eq!(store.get("k").expect("get"), Some(json!({"a": 1})));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn modified_tracks_write_time() {
        let store = MemoryStore::new();
        assert!(store.modified("k").is_none());

        let before = MemoryStore::now();
        store.set("k", json!("v"), 0).expect("set");
        let stored_at = store.modified("k").expect("modified");
        assert!(stored_at >= before);
    }

    #[test]
    fn flush_clears_everything() {
        let store = MemoryStore::new();
        store.set("a", json!(1), 0).expect("set");
        store.set("b", json!(2), 0).expect("set");

        store.flush().expect("flush");
        assert!(store.is_empty());
        assert!(store.get("a").expect("get").is_none());
    }

    #[test]
    fn zero_ttl_never_expires() {
        let store = MemoryStore::new();
        store.set("k", json!("v"), 0).expect("set");

        let entries = store.entries.read().expect("lock");
        assert!(entries.get("k").expect("entry").expires_at.is_none());
    }

    #[test]
    fn expired_entry_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("k", json!("v"), 60).expect("set");

        // Force the entry into the past.
        {
            let mut entries = store.entries.write().expect("lock");
            let entry = entries.get_mut("k").expect("entry");
            entry.expires_at = Some(MemoryStore::now() - 1);
        }

        assert!(store.get("k").expect("get").is_none());
        assert!(store.modified("k").is_none());
    }

    #[test]
    fn nested_values_survive() {
        let store = MemoryStore::new();
        let value = json!({"pages": {"id": {"a": 100, "b": 200}}});
        store.set("index", value.clone(), 0).expect("set");
        assert_eq!(store.get("index").expect("get"), Some(value));
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let store = MemoryStore::new();

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.entries.write().expect("lock should be acquired");
            panic!("poison entries lock");
        }));

        store.set("k", json!("v"), 0).expect("set");
        assert!(store.get("k").expect("get").is_some());
    }
}
