//! Versioned key/value repository for flags and segments, spec.md §4.2.
//!
//! The store is deliberately kept ignorant of flag/segment schema (spec.md
//! §9 "Polymorphism over kinds"): it only ever looks at an item's key,
//! version and deleted bit. Callers (the [`Evaluator`](crate::evaluator))
//! own deserializing the opaque JSON body into a
//! [`Flag`](crate::model::Flag) or [`Segment`](crate::model::Segment).

pub mod caching;
pub mod memory;

pub use caching::{CacheTtl, CachingFeatureStore, PersistentStore, StaleValuesPolicy};
pub use memory::MemoryStore;

use crate::model::Kind;
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),
}

/// One opaque record as kept by a [`FeatureStore`]: key, version, a
/// deleted bit, and (for non-tombstones) the item's JSON body.
///
/// A tombstone retains its version ("gates writes", spec.md §3) but its
/// `data` is `Value::Null` — readers never look at it once `deleted` is
/// set.
#[derive(Clone, Debug, PartialEq)]
pub struct Item {
    pub key: String,
    pub version: u64,
    pub deleted: bool,
    pub data: serde_json::Value,
}

impl Item {
    pub fn new(key: impl Into<String>, version: u64, data: serde_json::Value) -> Self {
        Self {
            key: key.into(),
            version,
            deleted: false,
            data,
        }
    }

    pub fn tombstone(key: impl Into<String>, version: u64) -> Self {
        Self {
            key: key.into(),
            version,
            deleted: true,
            data: serde_json::Value::Null,
        }
    }

    /// Deserialize the body into a concrete type; only meaningful for
    /// non-tombstone items.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// A full init payload: every item, for every kind, as delivered by a
/// `put` streaming event or a full poll.
pub type Snapshot = HashMap<Kind, HashMap<String, Item>>;

/// Versioned key/value contract, spec.md §4.2.
///
/// Implementations must be linearizable per key against concurrent
/// `upsert`/`delete` calls (last-writer-wins by version, ties dropped —
/// spec.md §5 "Ordering guarantees").
#[async_trait]
pub trait FeatureStore {
    /// Atomically replace all contents for every kind present in
    /// `snapshot`. After this resolves, `initialized()` returns `true`
    /// forever for this store instance.
    async fn init(&self, snapshot: Snapshot) -> Result<(), StoreError>;

    /// Fetch a single item; returns `None` for a missing key or a
    /// tombstoned one.
    async fn get(&self, kind: Kind, key: &str) -> Result<Option<Item>, StoreError>;

    /// Fetch every non-tombstoned item of a kind.
    async fn all(&self, kind: Kind) -> Result<HashMap<String, Item>, StoreError>;

    /// Write `item` iff its version is strictly greater than whatever is
    /// currently stored for `(kind, item.key)` (or nothing is stored).
    /// Returns `true` if the write was applied.
    async fn upsert(&self, kind: Kind, item: Item) -> Result<bool, StoreError>;

    /// Equivalent to `upsert` of a tombstone at `version`.
    async fn delete(&self, kind: Kind, key: &str, version: u64) -> Result<bool, StoreError> {
        self.upsert(kind, Item::tombstone(key, version)).await
    }

    /// Whether `init` has ever completed (or, for a store fronting a
    /// persistent backend, whether the backend reports existing data).
    async fn initialized(&self) -> bool;
}

#[async_trait]
impl<T: FeatureStore + Send + Sync> FeatureStore for std::sync::Arc<T> {
    async fn init(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        self.as_ref().init(snapshot).await
    }

    async fn get(&self, kind: Kind, key: &str) -> Result<Option<Item>, StoreError> {
        self.as_ref().get(kind, key).await
    }

    async fn all(&self, kind: Kind) -> Result<HashMap<String, Item>, StoreError> {
        self.as_ref().all(kind).await
    }

    async fn upsert(&self, kind: Kind, item: Item) -> Result<bool, StoreError> {
        self.as_ref().upsert(kind, item).await
    }

    async fn initialized(&self) -> bool {
        self.as_ref().initialized().await
    }
}
