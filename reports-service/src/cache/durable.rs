//! Redis-backed snapshot store.
//!
//! The snapshot lives under two keys so the item blob can be inspected on its
//! own:
//! - `<prefix>:items` — JSON array of items
//! - `<prefix>:meta` — `{"lastFetch": <epoch millis>}`
//!
//! Both keys are written in one `MULTI/EXEC` pipeline, items first, and read
//! back with a single `MGET`.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::{CacheLayer, CachedCollection, SnapshotStore, StoreError};
use crate::upstream::Item;

/// Durable snapshot store with lazy connection management.
///
/// The connection is opened on first use and re-opened after a failure.
#[derive(Clone)]
pub struct RedisStore {
    inner: Arc<RedisStoreInner>,
}

struct RedisStoreInner {
    client: redis::Client,
    items_key: String,
    meta_key: String,
    connection: RwLock<Option<MultiplexedConnection>>,
}

#[derive(Serialize)]
struct SnapshotMeta {
    #[serde(rename = "lastFetch")]
    last_fetch: i64,
}

impl RedisStore {
    /// Validate the connection URL and prepare the store.
    ///
    /// Does not connect; an unreachable server shows up on first use.
    pub fn open(url: &str, key_prefix: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;

        Ok(Self {
            inner: Arc::new(RedisStoreInner {
                client,
                items_key: format!("{key_prefix}:items"),
                meta_key: format!("{key_prefix}:meta"),
                connection: RwLock::new(None),
            }),
        })
    }

    /// Ensure we have a live connection.
    async fn ensure_connected(&self) -> Result<MultiplexedConnection, StoreError> {
        {
            let connection = self.inner.connection.read().await;
            if let Some(conn) = connection.as_ref() {
                return Ok(conn.clone());
            }
        }

        let mut connection = self.inner.connection.write().await;

        // Double-check after acquiring write lock
        if let Some(conn) = connection.as_ref() {
            return Ok(conn.clone());
        }

        info!("redis_store_connecting");
        let conn = self.inner.client.get_multiplexed_async_connection().await?;
        info!("redis_store_connected");

        *connection = Some(conn.clone());
        Ok(conn)
    }

    /// Forget the cached connection so the next call reconnects.
    async fn reset_connection(&self) {
        self.inner.connection.write().await.take();
    }
}

#[async_trait]
impl SnapshotStore for RedisStore {
    fn layer(&self) -> CacheLayer {
        CacheLayer::Durable
    }

    async fn load(&self) -> Result<Option<CachedCollection>, StoreError> {
        let mut conn = self.ensure_connected().await?;

        let values: Vec<Option<String>> = match redis::cmd("MGET")
            .arg(&self.inner.items_key)
            .arg(&self.inner.meta_key)
            .query_async(&mut conn)
            .await
        {
            Ok(values) => values,
            Err(e) => {
                self.reset_connection().await;
                return Err(e.into());
            }
        };

        let mut values = values.into_iter();
        decode_snapshot(values.next().flatten(), values.next().flatten())
    }

    async fn save(&self, snapshot: &CachedCollection) -> Result<(), StoreError> {
        let items = serde_json::to_string(snapshot.items.as_slice())?;
        let meta = serde_json::to_string(&SnapshotMeta {
            last_fetch: snapshot.last_fetch_epoch_millis,
        })?;

        let mut conn = self.ensure_connected().await?;

        let result: Result<(), redis::RedisError> = redis::pipe()
            .atomic()
            .set(&self.inner.items_key, items)
            .ignore()
            .set(&self.inner.meta_key, meta)
            .ignore()
            .query_async(&mut conn)
            .await;

        if let Err(e) = result {
            self.reset_connection().await;
            return Err(e.into());
        }

        info!(
            items_key = %self.inner.items_key,
            item_count = snapshot.items.len(),
            last_fetch = snapshot.last_fetch_epoch_millis,
            "redis_snapshot_written"
        );

        Ok(())
    }
}

/// Check the shape of a stored record.
///
/// Both keys absent means nothing was ever stored. Anything else that is not
/// an array plus a numeric `lastFetch` is malformed.
fn decode_snapshot(
    items: Option<String>,
    meta: Option<String>,
) -> Result<Option<CachedCollection>, StoreError> {
    let (items, meta) = match (items, meta) {
        (None, None) => return Ok(None),
        (Some(items), Some(meta)) => (items, meta),
        (items, meta) => {
            warn!(
                has_items = items.is_some(),
                has_meta = meta.is_some(),
                "redis_snapshot_incomplete"
            );
            return Err(StoreError::Malformed("one of items/meta is missing".into()));
        }
    };

    let items = match serde_json::from_str::<Value>(&items)? {
        Value::Array(values) => values.into_iter().map(Item).collect(),
        _ => return Err(StoreError::Malformed("items is not an array".into())),
    };

    let meta: Value = serde_json::from_str(&meta)?;
    let last_fetch = meta
        .get("lastFetch")
        .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
        .ok_or_else(|| StoreError::Malformed("lastFetch is not a number".into()))?;

    Ok(Some(CachedCollection::new(items, last_fetch)))
}
