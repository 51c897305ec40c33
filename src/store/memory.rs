use super::{FeatureStore, Item, Snapshot, StoreError};
use crate::model::Kind;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Default in-memory [`FeatureStore`].
///
/// Reads are lock-free snapshots of an `ArcSwap`-backed map in the
/// teacher's original `MemoryStore`; here the whole per-kind map is
/// guarded by a single `parking_lot::RwLock` instead, because writes now
/// need a compare-and-set on version per spec.md §3/§5, which needs the
/// read-modify-write to be atomic with respect to other writers anyway.
/// `parking_lot::RwLock` keeps the hot read path cheap without pulling in
/// `arc-swap`'s separate machinery for a map that's also written to
/// one key at a time rather than swapped wholesale, except at `init`.
pub struct MemoryStore {
    data: RwLock<HashMap<Kind, HashMap<String, Item>>>,
    initialized: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        let mut data = HashMap::new();
        for kind in Kind::ALL {
            data.insert(kind, HashMap::new());
        }
        Self {
            data: RwLock::new(data),
            initialized: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl FeatureStore for MemoryStore {
    async fn init(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        let mut data = self.data.write();
        for kind in Kind::ALL {
            data.insert(kind, snapshot.get(&kind).cloned().unwrap_or_default());
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, kind: Kind, key: &str) -> Result<Option<Item>, StoreError> {
        let data = self.data.read();
        let item = data
            .get(&kind)
            .and_then(|m| m.get(key))
            .filter(|item| !item.deleted)
            .cloned();
        Ok(item)
    }

    async fn all(&self, kind: Kind) -> Result<HashMap<String, Item>, StoreError> {
        let data = self.data.read();
        let items = data
            .get(&kind)
            .map(|m| {
                m.iter()
                    .filter(|(_, item)| !item.deleted)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(items)
    }

    async fn upsert(&self, kind: Kind, item: Item) -> Result<bool, StoreError> {
        let mut data = self.data.write();
        let map = data.entry(kind).or_default();
        let applied = match map.get(&item.key) {
            Some(existing) if existing.version >= item.version => false,
            _ => {
                map.insert(item.key.clone(), item);
                true
            }
        };
        Ok(applied)
    }

    async fn initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag_item(key: &str, version: u64) -> Item {
        Item::new(key, version, serde_json::json!({"key": key, "version": version}))
    }

    #[tokio::test]
    async fn upsert_rejects_stale_version() {
        let store = MemoryStore::new();
        assert!(store.upsert(Kind::FEATURES, flag_item("a", 2)).await.unwrap());
        assert!(!store.upsert(Kind::FEATURES, flag_item("a", 1)).await.unwrap());
        assert!(!store.upsert(Kind::FEATURES, flag_item("a", 2)).await.unwrap());
        assert!(store.upsert(Kind::FEATURES, flag_item("a", 3)).await.unwrap());
        let item = store.get(Kind::FEATURES, "a").await.unwrap().unwrap();
        assert_eq!(item.version, 3);
    }

    #[tokio::test]
    async fn delete_is_tombstone_upsert() {
        let store = MemoryStore::new();
        store.upsert(Kind::FEATURES, flag_item("a", 1)).await.unwrap();
        assert!(store.delete(Kind::FEATURES, "a", 2).await.unwrap());
        assert!(store.get(Kind::FEATURES, "a").await.unwrap().is_none());
        assert!(store.all(Kind::FEATURES).await.unwrap().is_empty());
        // a delayed re-creation at a lower version than the tombstone is rejected
        assert!(!store.upsert(Kind::FEATURES, flag_item("a", 2)).await.unwrap());
    }

    #[tokio::test]
    async fn init_replaces_whole_kind_and_flips_initialized() {
        let store = MemoryStore::new();
        assert!(!store.initialized().await);
        let mut snapshot = Snapshot::new();
        let mut flags = HashMap::new();
        flags.insert("a".to_string(), flag_item("a", 1));
        snapshot.insert(Kind::FEATURES, flags);
        store.init(snapshot).await.unwrap();
        assert!(store.initialized().await);
        assert_eq!(store.all(Kind::FEATURES).await.unwrap().len(), 1);
        assert!(store.all(Kind::SEGMENTS).await.unwrap().is_empty());
    }
}
