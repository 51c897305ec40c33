use super::{FeatureStore, Item, Snapshot, StoreError};
use crate::model::Kind;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::warn;

/// How long a cached entry remains valid, spec.md §4.3.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CacheTtl {
    /// TTL = 0: bypass the cache entirely, every read hits the backend.
    Disabled,
    /// TTL < 0: cache indefinitely until process restart.
    Forever,
    /// TTL > 0: entries expire after this duration.
    Expires(Duration),
}

/// What happens on an expired read, spec.md §4.3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StaleValuesPolicy {
    /// Expired entry is removed; the next read blocks on the backend and
    /// surfaces a backend error to the caller.
    Evict,
    /// Expired read blocks on the backend; on backend error, the prior
    /// value is served instead (if any).
    Refresh,
    /// Expired read returns the prior value immediately; a refresh runs
    /// on a background task. Refresh errors are logged and swallowed,
    /// the prior value is retained.
    RefreshAsync,
}

/// Narrower contract a pluggable persistent backend (Redis, etc.)
/// implements. Unlike [`FeatureStore`], this trait doesn't assume an
/// in-memory snapshot is cheap to hold — every call may do I/O, and the
/// `CachingFeatureStore` wrapper is what gives callers the cheap reads a
/// `FeatureStore` consumer expects.
#[async_trait]
pub trait PersistentStore {
    async fn init(&self, snapshot: Snapshot) -> Result<(), StoreError>;
    async fn get(&self, kind: Kind, key: &str) -> Result<Option<Item>, StoreError>;
    async fn all(&self, kind: Kind) -> Result<HashMap<String, Item>, StoreError>;
    async fn upsert(&self, kind: Kind, item: Item) -> Result<bool, StoreError>;
    /// Whether the backend already holds data from a prior process, so a
    /// fresh process can skip waiting on its own `init`.
    async fn initialized(&self) -> Result<bool, StoreError>;
}

struct CacheEntry {
    item: Option<Item>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn fresh(&self, now: Instant) -> bool {
        match self.expires_at {
            None => true,
            Some(exp) => now < exp,
        }
    }
}

type KeyCache = Mutex<LruCache<String, CacheEntry>>;

/// Interposes a TTL cache (and optionally async refresh) in front of a
/// [`PersistentStore`], while still presenting the [`FeatureStore`]
/// contract to callers. spec.md §4.3.
pub struct CachingFeatureStore<B> {
    backend: Arc<B>,
    ttl: CacheTtl,
    policy: StaleValuesPolicy,
    caches: HashMap<Kind, Arc<KeyCache>>,
    all_cache: HashMap<Kind, Mutex<Option<(HashMap<String, Item>, Option<Instant>)>>>,
    initialized: AtomicBool,
    init_memo: tokio::sync::Mutex<()>,
    // single-flight locks, one semaphore per in-flight (kind, key) backend read
    inflight: Mutex<HashMap<(Kind, String), Arc<Semaphore>>>,
}

const DEFAULT_CACHE_CAPACITY: usize = 1000;

impl<B: PersistentStore + Send + Sync + 'static> CachingFeatureStore<B> {
    pub fn new(backend: B, ttl: CacheTtl, policy: StaleValuesPolicy) -> Self {
        let mut caches = HashMap::new();
        let mut all_cache = HashMap::new();
        for kind in Kind::ALL {
            caches.insert(
                kind,
                Arc::new(Mutex::new(LruCache::new(DEFAULT_CACHE_CAPACITY))),
            );
            all_cache.insert(kind, Mutex::new(None));
        }
        Self {
            backend: Arc::new(backend),
            ttl,
            policy,
            caches,
            all_cache,
            initialized: AtomicBool::new(false),
            init_memo: tokio::sync::Mutex::new(()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    fn expiry(&self) -> Option<Instant> {
        match self.ttl {
            CacheTtl::Disabled => Some(Instant::now()), // already-expired marker, never actually stored
            CacheTtl::Forever => None,
            CacheTtl::Expires(d) => Some(Instant::now() + d),
        }
    }

    fn store_single(&self, kind: Kind, key: &str, item: Option<Item>) {
        if matches!(self.ttl, CacheTtl::Disabled) {
            return;
        }
        if let Some(cache) = self.caches.get(&kind) {
            cache.lock().put(
                key.to_string(),
                CacheEntry {
                    item,
                    expires_at: self.expiry(),
                },
            );
        }
    }

    async fn inflight_permit(&self, kind: Kind, key: &str) -> Arc<Semaphore> {
        let mut guard = self.inflight.lock();
        guard
            .entry((kind, key.to_string()))
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    async fn fetch_and_cache(&self, kind: Kind, key: &str) -> Result<Option<Item>, StoreError> {
        let result = self.backend.get(kind, key).await;
        match &result {
            Ok(item) => self.store_single(kind, key, item.clone()),
            Err(e) => warn!(%e, %kind, key, "backend read failed"),
        }
        result
    }

    fn spawn_async_refresh(&self, kind: Kind, key: String) {
        let backend = Arc::clone(&self.backend);
        let ttl = self.ttl;
        let cache = match self.caches.get(&kind) {
            Some(c) => Arc::clone(c),
            None => return,
        };
        tokio::spawn(async move {
            match backend.get(kind, &key).await {
                Ok(item) => {
                    let expires_at = match ttl {
                        CacheTtl::Disabled => Some(Instant::now()),
                        CacheTtl::Forever => None,
                        CacheTtl::Expires(d) => Some(Instant::now() + d),
                    };
                    cache.lock().put(key, CacheEntry { item, expires_at });
                }
                Err(e) => {
                    warn!(%e, %kind, key = %key, "async cache refresh failed, retaining stale value");
                }
            }
        });
    }
}

#[async_trait]
impl<B: PersistentStore + Send + Sync + 'static> FeatureStore for CachingFeatureStore<B> {
    async fn init(&self, snapshot: Snapshot) -> Result<(), StoreError> {
        // memoized: ask the backend at most once, even under concurrent callers
        let _guard = self.init_memo.lock().await;
        self.backend.init(snapshot).await?;
        for kind in Kind::ALL {
            if let Some(cache) = self.caches.get(&kind) {
                cache.lock().clear();
            }
            if let Some(all_cache) = self.all_cache.get(&kind) {
                *all_cache.lock() = None;
            }
        }
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, kind: Kind, key: &str) -> Result<Option<Item>, StoreError> {
        if matches!(self.ttl, CacheTtl::Disabled) {
            return self.backend.get(kind, key).await;
        }

        let now = Instant::now();
        let cached = self
            .caches
            .get(&kind)
            .and_then(|c| c.lock().get(key).map(|e| (e.fresh(now), e.item.clone())));

        match cached {
            Some((true, item)) => return Ok(item),
            Some((false, stale)) => match self.policy {
                StaleValuesPolicy::Evict => {
                    self.caches.get(&kind).map(|c| c.lock().pop(key));
                    self.backend_get_coalesced(kind, key).await
                }
                StaleValuesPolicy::Refresh => {
                    match self.backend_get_coalesced(kind, key).await {
                        Ok(item) => Ok(item),
                        Err(e) => {
                            warn!(%e, %kind, key, "refresh failed, serving stale value");
                            Ok(stale)
                        }
                    }
                }
                StaleValuesPolicy::RefreshAsync => {
                    self.spawn_async_refresh(kind, key.to_string());
                    Ok(stale)
                }
            },
            None => self.backend_get_coalesced(kind, key).await,
        }
    }

    async fn all(&self, kind: Kind) -> Result<HashMap<String, Item>, StoreError> {
        if matches!(self.ttl, CacheTtl::Disabled) {
            return self.backend.all(kind).await;
        }
        let now = Instant::now();
        let cached = self
            .all_cache
            .get(&kind)
            .and_then(|c| c.lock().clone())
            .filter(|(_, expires_at)| match expires_at {
                None => true,
                Some(exp) => now < *exp,
            });
        if let Some((items, _)) = cached {
            return Ok(items);
        }
        let items = self.backend.all(kind).await?;
        if let Some(all_cache) = self.all_cache.get(&kind) {
            *all_cache.lock() = Some((items.clone(), self.expiry()));
        }
        Ok(items)
    }

    async fn upsert(&self, kind: Kind, item: Item) -> Result<bool, StoreError> {
        let applied = self.backend.upsert(kind, item.clone()).await?;
        if applied {
            // write-through invalidation, spec.md §4.3 "Writes go through
            // to the backend and then invalidate the affected cache entry"
            self.caches.get(&kind).map(|c| c.lock().pop(&item.key));
            if let Some(all_cache) = self.all_cache.get(&kind) {
                *all_cache.lock() = None;
            }
        }
        Ok(applied)
    }

    async fn initialized(&self) -> bool {
        if self.initialized.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.backend.initialized().await, Ok(true))
    }
}

impl<B: PersistentStore + Send + Sync + 'static> CachingFeatureStore<B> {
    async fn backend_get_coalesced(&self, kind: Kind, key: &str) -> Result<Option<Item>, StoreError> {
        let sem = self.inflight_permit(kind, key).await;
        let _permit = sem.acquire().await.expect("semaphore never closed");
        // double-check: another caller may have populated the cache while
        // we were waiting for the permit
        if !matches!(self.ttl, CacheTtl::Disabled) {
            if let Some(cache) = self.caches.get(&kind) {
                let now = Instant::now();
                if let Some(entry) = cache.lock().get(key) {
                    if entry.fresh(now) {
                        return Ok(entry.item.clone());
                    }
                }
            }
        }
        self.fetch_and_cache(kind, key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// A [`PersistentStore`] whose first `get` succeeds and every call
    /// after that fails, so a cache entry can go stale and then hit a
    /// failing backend refresh.
    #[derive(Default)]
    struct FlakyBackend {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PersistentStore for FlakyBackend {
        async fn init(&self, _snapshot: Snapshot) -> Result<(), StoreError> {
            Ok(())
        }

        async fn get(&self, _kind: Kind, key: &str) -> Result<Option<Item>, StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                Ok(Some(Item::new(key, 1, serde_json::json!({"v": call}))))
            } else {
                Err(StoreError::Backend("backend unavailable".into()))
            }
        }

        async fn all(&self, _kind: Kind) -> Result<HashMap<String, Item>, StoreError> {
            Ok(HashMap::new())
        }

        async fn upsert(&self, _kind: Kind, _item: Item) -> Result<bool, StoreError> {
            Ok(true)
        }

        async fn initialized(&self) -> Result<bool, StoreError> {
            Ok(true)
        }
    }

    // Scenario 8, spec.md §8: once a cached entry expires, `RefreshAsync`
    // serves the stale value immediately and swallows a failing
    // background refresh rather than surfacing it to the caller.
    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_async_serves_stale_value_when_background_refresh_fails() {
        let store = CachingFeatureStore::new(
            FlakyBackend::default(),
            CacheTtl::Expires(Duration::from_millis(20)),
            StaleValuesPolicy::RefreshAsync,
        );

        let first = store.get(Kind::FEATURES, "flag-a").await.unwrap();
        assert!(first.is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;

        // expired: the stale value comes back immediately, not an error,
        // while a refresh that will fail kicks off in the background.
        let second = store.get(Kind::FEATURES, "flag-a").await.unwrap();
        assert_eq!(second, first);

        tokio::time::sleep(Duration::from_millis(40)).await;

        // the failed refresh didn't evict the entry or propagate an error
        let third = store.get(Kind::FEATURES, "flag-a").await.unwrap();
        assert_eq!(third, first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_policy_surfaces_stale_value_on_backend_error() {
        let store = CachingFeatureStore::new(
            FlakyBackend::default(),
            CacheTtl::Expires(Duration::from_millis(20)),
            StaleValuesPolicy::Refresh,
        );

        let first = store.get(Kind::FEATURES, "flag-a").await.unwrap();
        assert!(first.is_some());

        tokio::time::sleep(Duration::from_millis(40)).await;

        // Refresh blocks on the backend; since that call fails, the prior
        // value is served rather than propagating the error.
        let second = store.get(Kind::FEATURES, "flag-a").await.unwrap();
        assert_eq!(second, first);
    }
}
