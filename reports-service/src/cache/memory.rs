//! In-process snapshot store.
//!
//! Used when no durable store is configured and as the landing spot for
//! snapshots the durable store failed to accept. Survives only as long as the
//! process does.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheLayer, CachedCollection, SnapshotStore, StoreError};

/// Snapshot held in process memory.
///
/// Cloning shares the same slot.
#[derive(Clone, Default)]
pub struct MemoryStore {
    slot: Arc<RwLock<Option<CachedCollection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    fn layer(&self) -> CacheLayer {
        CacheLayer::Memory
    }

    async fn load(&self) -> Result<Option<CachedCollection>, StoreError> {
        Ok(self.slot.read().await.clone())
    }

    async fn save(&self, snapshot: &CachedCollection) -> Result<(), StoreError> {
        *self.slot.write().await = Some(snapshot.clone());
        Ok(())
    }
}
