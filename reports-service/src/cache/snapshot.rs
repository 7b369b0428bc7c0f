//! Snapshot cache facade used by the refresh cycle.
//!
//! Built once per process and handed to the request handlers. Reads and
//! writes never fail from the caller's point of view: store problems are
//! logged and absorbed, and the returned [`CacheLayer`] tells the caller where
//! the data actually lives.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::{CacheLayer, CachedCollection, MemoryStore, RedisStore, SnapshotStore, StoreError};
use crate::upstream::Item;

/// Durable store with an in-process fallback.
#[derive(Clone)]
pub struct SnapshotCache {
    durable: Option<Arc<dyn SnapshotStore>>,
    memory: MemoryStore,
}

impl SnapshotCache {
    /// Cache that only ever uses process memory.
    pub fn in_memory() -> Self {
        Self {
            durable: None,
            memory: MemoryStore::new(),
        }
    }

    /// Cache backed by `durable`, falling back to process memory.
    pub fn with_durable(durable: Arc<dyn SnapshotStore>) -> Self {
        Self {
            durable: Some(durable),
            memory: MemoryStore::new(),
        }
    }

    /// Select the backend from connection settings.
    ///
    /// A missing or unusable URL selects the in-process fallback.
    pub fn from_settings(redis_url: Option<&str>, key_prefix: &str) -> Self {
        let Some(url) = redis_url else {
            warn!(
                cache_layer = %CacheLayer::Memory,
                "snapshot_cache_degraded_no_durable_config"
            );
            return Self::in_memory();
        };

        match RedisStore::open(url, key_prefix) {
            Ok(store) => {
                info!(cache_layer = %CacheLayer::Durable, key_prefix = %key_prefix, "snapshot_cache_ready");
                Self::with_durable(Arc::new(store))
            }
            Err(e) => {
                error!(
                    error = %e,
                    cache_layer = %CacheLayer::Memory,
                    "snapshot_cache_degraded_invalid_durable_config"
                );
                Self::in_memory()
            }
        }
    }

    /// The layer this cache prefers.
    pub fn layer(&self) -> CacheLayer {
        match &self.durable {
            Some(store) => store.layer(),
            None => CacheLayer::Memory,
        }
    }

    /// Read the current snapshot.
    ///
    /// Malformed records count as absent. An unreachable durable store falls
    /// back to the in-process copy, and an in-process copy newer than the
    /// durable record wins.
    pub async fn read_snapshot(&self) -> (Option<CachedCollection>, CacheLayer) {
        let Some(store) = &self.durable else {
            return (self.read_memory().await, CacheLayer::Memory);
        };

        let durable = match store.load().await {
            Ok(snapshot) => snapshot,
            Err(StoreError::Malformed(reason)) => {
                warn!(reason = %reason, "snapshot_record_malformed");
                None
            }
            Err(StoreError::Serialization(e)) => {
                warn!(error = %e, "snapshot_record_malformed");
                None
            }
            Err(e) => {
                warn!(error = %e, "snapshot_durable_read_failed");
                return (self.read_memory().await, CacheLayer::Memory);
            }
        };

        // Memory only holds snapshots whose durable write failed
        match (durable, self.read_memory().await) {
            (None, Some(memory)) => (Some(memory), CacheLayer::Memory),
            (Some(durable), Some(memory))
                if memory.last_fetch_epoch_millis > durable.last_fetch_epoch_millis =>
            {
                (Some(memory), CacheLayer::Memory)
            }
            (durable, _) => (durable, store.layer()),
        }
    }

    /// Store a complete snapshot.
    ///
    /// Returns the layer that now holds it. A failed durable write keeps the
    /// snapshot in process memory instead.
    pub async fn write_snapshot(&self, items: Arc<Vec<Item>>, epoch_millis: i64) -> CacheLayer {
        let snapshot = CachedCollection {
            items,
            last_fetch_epoch_millis: epoch_millis,
        };

        if let Some(store) = &self.durable {
            match store.save(&snapshot).await {
                Ok(()) => return store.layer(),
                Err(e) => {
                    warn!(
                        error = %e,
                        cache_layer = %CacheLayer::Memory,
                        "store_write_failed"
                    );
                }
            }
        }

        // MemoryStore::save cannot fail
        let _ = self.memory.save(&snapshot).await;
        CacheLayer::Memory
    }

    async fn read_memory(&self) -> Option<CachedCollection> {
        self.memory.load().await.ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::refresh::{ManualClock, RefreshRequest, Refresher};
    use crate::upstream::{CollectionFetcher, UpstreamError};

    /// Durable store stand-in whose reads and writes can be made to fail.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_reads: AtomicBool,
        fail_writes: AtomicBool,
        malformed: AtomicBool,
    }

    #[async_trait]
    impl SnapshotStore for FlakyStore {
        fn layer(&self) -> CacheLayer {
            CacheLayer::Durable
        }

        async fn load(&self) -> Result<Option<CachedCollection>, StoreError> {
            if self.malformed.load(Ordering::SeqCst) {
                return Err(StoreError::Malformed("items is not an array".into()));
            }
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(redis::RedisError::from((redis::ErrorKind::IoError, "down")).into());
            }
            self.inner.load().await
        }

        async fn save(&self, snapshot: &CachedCollection) -> Result<(), StoreError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(redis::RedisError::from((redis::ErrorKind::IoError, "down")).into());
            }
            self.inner.save(snapshot).await
        }
    }

    fn items(n: usize) -> Arc<Vec<Item>> {
        Arc::new((0..n).map(|i| Item(json!({ "id": i }))).collect())
    }

    #[test]
    fn test_from_settings_without_url_is_memory() {
        let cache = SnapshotCache::from_settings(None, "webflow-cache");
        assert_eq!(cache.layer(), CacheLayer::Memory);
    }

    #[test]
    fn test_from_settings_with_bad_url_is_memory() {
        let cache = SnapshotCache::from_settings(Some("::nope::"), "webflow-cache");
        assert_eq!(cache.layer(), CacheLayer::Memory);
    }

    #[test]
    fn test_from_settings_with_url_is_durable() {
        let cache = SnapshotCache::from_settings(Some("redis://127.0.0.1:6379"), "webflow-cache");
        assert_eq!(cache.layer(), CacheLayer::Durable);
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let cache = SnapshotCache::in_memory();
        assert_eq!(cache.read_snapshot().await, (None, CacheLayer::Memory));

        let layer = cache.write_snapshot(items(3), 1_000).await;
        assert_eq!(layer, CacheLayer::Memory);

        let (snapshot, layer) = cache.read_snapshot().await;
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.items.len(), 3);
        assert_eq!(snapshot.last_fetch_epoch_millis, 1_000);
        assert_eq!(layer, CacheLayer::Memory);
    }

    #[tokio::test]
    async fn test_durable_write_and_read() {
        let store = Arc::new(FlakyStore::default());
        let cache = SnapshotCache::with_durable(store.clone());

        assert_eq!(cache.write_snapshot(items(2), 7).await, CacheLayer::Durable);

        let (snapshot, layer) = cache.read_snapshot().await;
        assert_eq!(snapshot.unwrap().last_fetch_epoch_millis, 7);
        assert_eq!(layer, CacheLayer::Durable);
    }

    #[tokio::test]
    async fn test_durable_write_failure_degrades_to_memory() {
        let store = Arc::new(FlakyStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let cache = SnapshotCache::with_durable(store.clone());

        assert_eq!(cache.write_snapshot(items(2), 7).await, CacheLayer::Memory);
        assert!(store.inner.load().await.unwrap().is_none());

        store.fail_reads.store(true, Ordering::SeqCst);
        let (snapshot, layer) = cache.read_snapshot().await;
        assert_eq!(snapshot.unwrap().items.len(), 2);
        assert_eq!(layer, CacheLayer::Memory);
    }

    #[tokio::test]
    async fn test_malformed_record_is_a_miss() {
        let store = Arc::new(FlakyStore::default());
        let cache = SnapshotCache::with_durable(store.clone());
        cache.write_snapshot(items(1), 9).await;

        store.malformed.store(true, Ordering::SeqCst);

        assert_eq!(cache.read_snapshot().await, (None, CacheLayer::Durable));
    }

    #[tokio::test]
    async fn test_failed_write_is_served_from_memory_while_reads_work() {
        let store = Arc::new(FlakyStore::default());
        let cache = SnapshotCache::with_durable(store.clone());
        cache.write_snapshot(items(1), 5).await;

        store.fail_writes.store(true, Ordering::SeqCst);
        assert_eq!(cache.write_snapshot(items(4), 8).await, CacheLayer::Memory);

        let (snapshot, layer) = cache.read_snapshot().await;
        let snapshot = snapshot.unwrap();
        assert_eq!(snapshot.items.len(), 4);
        assert_eq!(snapshot.last_fetch_epoch_millis, 8);
        assert_eq!(layer, CacheLayer::Memory);
    }

    #[tokio::test]
    async fn test_newer_durable_record_beats_memory_copy() {
        let store = Arc::new(FlakyStore::default());
        let cache = SnapshotCache::with_durable(store.clone());

        store.fail_writes.store(true, Ordering::SeqCst);
        cache.write_snapshot(items(1), 5).await;
        store.fail_writes.store(false, Ordering::SeqCst);
        assert_eq!(cache.write_snapshot(items(2), 9).await, CacheLayer::Durable);

        let (snapshot, layer) = cache.read_snapshot().await;
        assert_eq!(snapshot.unwrap().last_fetch_epoch_millis, 9);
        assert_eq!(layer, CacheLayer::Durable);
    }

    #[tokio::test]
    async fn test_malformed_record_falls_back_to_memory_copy() {
        let store = Arc::new(FlakyStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let cache = SnapshotCache::with_durable(store.clone());
        cache.write_snapshot(items(3), 6).await;

        store.malformed.store(true, Ordering::SeqCst);

        let (snapshot, layer) = cache.read_snapshot().await;
        assert_eq!(snapshot.unwrap().items.len(), 3);
        assert_eq!(layer, CacheLayer::Memory);
    }

    /// Fetcher that counts calls.
    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CollectionFetcher for CountingFetcher {
        async fn fetch_all(&self) -> Result<Vec<Item>, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![Item(json!({ "id": "report" }))])
        }
    }

    #[tokio::test]
    async fn test_unwritable_store_still_fetches_once_per_ttl() {
        let store = Arc::new(FlakyStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let fetcher = Arc::new(CountingFetcher::default());
        let refresher = Refresher::new(
            SnapshotCache::with_durable(store),
            fetcher.clone(),
            Arc::new(ManualClock::new(1_700_000_000_000)),
            Duration::from_secs(24 * 60 * 60),
        );

        let first = refresher.resolve(RefreshRequest::default()).await.unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.layer, CacheLayer::Memory);

        for _ in 0..4 {
            let next = refresher.resolve(RefreshRequest::default()).await.unwrap();
            assert!(next.from_cache);
            assert_eq!(next.layer, CacheLayer::Memory);
        }

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
