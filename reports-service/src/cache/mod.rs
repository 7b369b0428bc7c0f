//! Snapshot cache module.
//!
//! This module provides:
//! - The [`CachedCollection`] snapshot: all items plus the instant they were fetched
//! - The [`SnapshotStore`] seam with a durable Redis and an in-process implementation
//! - [`SnapshotCache`], which picks a backend once and degrades to process memory
//!
//! ## Layers
//!
//! ```text
//! REDIS_URL set   → RedisStore ──(write fails)──→ MemoryStore
//! REDIS_URL unset → MemoryStore
//! ```

pub mod durable;
pub mod memory;
pub mod snapshot;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::upstream::Item;

pub use durable::RedisStore;
pub use memory::MemoryStore;
pub use snapshot::SnapshotCache;

/// The complete collection as of one fetch.
///
/// Items and timestamp are always replaced together.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedCollection {
    pub items: Arc<Vec<Item>>,
    pub last_fetch_epoch_millis: i64,
}

impl CachedCollection {
    pub fn new(items: Vec<Item>, last_fetch_epoch_millis: i64) -> Self {
        Self {
            items: Arc::new(items),
            last_fetch_epoch_millis,
        }
    }
}

/// Where a snapshot was read from or written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheLayer {
    /// Network-backed store shared by every instance
    Durable,
    /// This process only; lost on restart
    Memory,
}

impl CacheLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLayer::Durable => "durable",
            CacheLayer::Memory => "memory",
        }
    }
}

impl fmt::Display for CacheLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key-value store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The stored record exists but does not have the snapshot shape.
    #[error("malformed cache record: {0}")]
    Malformed(String),
}

/// Storage for the single collection snapshot.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Which layer this store represents.
    fn layer(&self) -> CacheLayer;

    /// Read the stored snapshot, `None` when nothing has been stored.
    async fn load(&self) -> Result<Option<CachedCollection>, StoreError>;

    /// Replace the stored snapshot with a complete new one.
    async fn save(&self, snapshot: &CachedCollection) -> Result<(), StoreError>;
}
