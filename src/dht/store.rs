use std::collections::HashMap;
use std::sync::Mutex;

use log::debug;

use crate::dht::record::DhtRecord;
use crate::utils::crypto::in_arc;
use crate::utils::errors::StorageError;
use crate::utils::time::{has_expired, now};
use crate::utils::types::HashPos;

/// C5 — local key → value map for keys this peer owns. Separate from
/// `NodeState` because it is mutated far more often (every `put`/handoff)
/// than ring topology, and workers/RPC handlers that only need the store
/// shouldn't have to reach through node state to get it.
pub struct Store {
    entries: Mutex<HashMap<HashPos, DhtRecord>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GetOutcome {
    Found(DhtRecord),
    Expired { value: Vec<u8> },
    NotFound,
}

impl Store {
    pub fn new() -> Store {
        Store {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Local write path: always succeeds, always assigns a fresh version.
    /// Returns the assigned version so the caller (e.g. the job coordinator)
    /// can stamp it onto a derived record.
    pub fn local_put(&self, key: HashPos, value: Vec<u8>, ttl_secs: u64) -> u64 {
        let mut entries = self.entries.lock().unwrap();
        let version = entries.get(&key).map(|r| r.version + 1).unwrap_or(1);
        entries.insert(
            key,
            DhtRecord {
                key,
                value,
                version,
                expires_at: now().as_secs() + ttl_secs,
            },
        );
        version
    }

    pub fn local_get(&self, key: HashPos) -> Result<DhtRecord, StorageError> {
        match self.local_get_detailed(key) {
            GetOutcome::Found(record) => Ok(record),
            GetOutcome::Expired { .. } | GetOutcome::NotFound => Err(StorageError::KeyNotFound),
        }
    }

    /// Like `local_get` but distinguishes "never stored"/"stored and fresh"
    /// from "stored but past its TTL", since the `get` RPC surfaces a
    /// dedicated `Expired` status (§3: records may carry an optional TTL).
    pub fn local_get_detailed(&self, key: HashPos) -> GetOutcome {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(&key) {
            Some(record) if has_expired(&record.expires_at) => {
                debug!("key {:?} found but expired, evicting lazily", key);
                let value = record.value.clone();
                entries.remove(&key);
                GetOutcome::Expired { value }
            }
            Some(record) => GetOutcome::Found(record.clone()),
            None => GetOutcome::NotFound,
        }
    }

    pub fn local_delete(&self, key: HashPos) {
        self.entries.lock().unwrap().remove(&key);
    }

    /// Handoff/replication write path (§4.5): accepted only if the incoming
    /// version is strictly newer than whatever is already stored for this
    /// key, so replaying a handoff twice is a no-op rather than a
    /// regression.
    pub fn accept_if_newer(&self, record: DhtRecord) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().unwrap();
        let should_accept = match entries.get(&record.key) {
            Some(existing) => record.version > existing.version,
            None => true,
        };
        if should_accept {
            entries.insert(record.key, record);
            Ok(())
        } else {
            Err(StorageError::VersionStale)
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn snapshot(&self) -> Vec<DhtRecord> {
        self.entries.lock().unwrap().values().cloned().collect()
    }

    /// Every record whose key falls in the clockwise arc `(lower, upper]` —
    /// the arc handed off to a newly-arrived predecessor (§4.5).
    pub fn records_in_arc(&self, lower: HashPos, upper: HashPos) -> Vec<DhtRecord> {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|record| in_arc(record.key, lower, upper, true))
            .cloned()
            .collect()
    }

    pub fn remove_all(&self, keys: &[HashPos]) {
        let mut entries = self.entries.lock().unwrap();
        for key in keys {
            entries.remove(key);
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_put_assigns_monotonic_versions() {
        let store = Store::new();
        let v1 = store.local_put(5, b"a".to_vec(), 100);
        let v2 = store.local_put(5, b"b".to_vec(), 100);
        assert_eq!(v1, 1);
        assert_eq!(v2, 2);
    }

    #[test]
    fn accept_if_newer_rejects_stale_versions() {
        let store = Store::new();
        store.local_put(5, b"a".to_vec(), 100);
        let stale = DhtRecord {
            key: 5,
            value: b"old".to_vec(),
            version: 1,
            expires_at: now().as_secs() + 100,
        };
        assert_eq!(store.accept_if_newer(stale), Err(StorageError::VersionStale));
    }

    #[test]
    fn expired_record_is_lazily_evicted_on_get() {
        let store = Store::new();
        store.local_put(9, b"v".to_vec(), 0);
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert_eq!(store.local_get(9), Err(StorageError::KeyNotFound));
        assert_eq!(store.len(), 0);
    }
}
