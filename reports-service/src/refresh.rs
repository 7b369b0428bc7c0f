//! Refresh decision and refresh cycle.
//!
//! Every request asks the same question: is the stored snapshot good enough,
//! or must the collection be fetched again? The answer is computed once per
//! request by [`decide`] and carried out by [`Refresher::resolve`].
//!
//! ## Precedence
//!
//! ```text
//! no snapshot / older than TTL → Expired
//! ?refresh=true                → ForcedByClient
//! verified webhook POST        → VerifiedWebhook
//! otherwise                    → Fresh (serve as stored)
//! ```
//!
//! Concurrent requests that both see a stale snapshot both fetch and both
//! write. Each write is a complete snapshot, so the last writer wins and
//! nothing is corrupted.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::cache::{CacheLayer, CachedCollection, SnapshotCache};
use crate::upstream::{CollectionFetcher, Item, UpstreamError};

/// Why a refresh is happening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// No snapshot yet, or the snapshot outlived the TTL
    Expired,
    /// The caller asked for `refresh=true`
    ForcedByClient,
    /// A webhook with a valid signature arrived
    VerifiedWebhook,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTrigger::Expired => "expired",
            RefreshTrigger::ForcedByClient => "forced_by_client",
            RefreshTrigger::VerifiedWebhook => "verified_webhook",
        }
    }
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Serve the stored snapshot unchanged
    Fresh,
    /// Fetch the collection again
    Refresh(RefreshTrigger),
}

/// Choose between serving the snapshot and refreshing it.
///
/// A stored snapshot with zero items still counts as fetched; only a missing
/// snapshot is treated as never fetched.
pub fn decide(
    snapshot: Option<&CachedCollection>,
    now_millis: i64,
    ttl: Duration,
    force_refresh: bool,
    verified_webhook: bool,
) -> Decision {
    let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

    let expired = match snapshot {
        None => true,
        Some(s) => now_millis.saturating_sub(s.last_fetch_epoch_millis) >= ttl_millis,
    };

    if expired {
        Decision::Refresh(RefreshTrigger::Expired)
    } else if force_refresh {
        Decision::Refresh(RefreshTrigger::ForcedByClient)
    } else if verified_webhook {
        Decision::Refresh(RefreshTrigger::VerifiedWebhook)
    } else {
        Decision::Fresh
    }
}

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now_millis(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start_millis)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(by, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Per-request inputs to the refresh decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshRequest {
    pub force_refresh: bool,
    pub verified_webhook: bool,
}

/// The snapshot a response is built from.
#[derive(Debug, Clone)]
pub struct ResolvedCollection {
    /// Every item of exactly one snapshot
    pub items: Arc<Vec<Item>>,
    /// When that snapshot was fetched
    pub fetched_at_millis: i64,
    /// True only when no refresh ran for this request
    pub from_cache: bool,
    /// Layer the snapshot was read from or written to
    pub layer: CacheLayer,
    /// Why a refresh ran, if one did
    pub trigger: Option<RefreshTrigger>,
}

/// Runs the decide / fetch / store cycle.
#[derive(Clone)]
pub struct Refresher {
    cache: SnapshotCache,
    fetcher: Arc<dyn CollectionFetcher>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl Refresher {
    pub fn new(
        cache: SnapshotCache,
        fetcher: Arc<dyn CollectionFetcher>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
    ) -> Self {
        Self {
            cache,
            fetcher,
            clock,
            ttl,
        }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Produce the snapshot for one request.
    ///
    /// On a fetch failure nothing is written and the error is returned; the
    /// previous snapshot stays in place for later requests.
    pub async fn resolve(&self, request: RefreshRequest) -> Result<ResolvedCollection, UpstreamError> {
        let (snapshot, read_layer) = self.cache.read_snapshot().await;
        let now = self.clock.now_millis();

        let had_snapshot = snapshot.is_some();
        let decision = decide(
            snapshot.as_ref(),
            now,
            self.ttl,
            request.force_refresh,
            request.verified_webhook,
        );

        let trigger = match (decision, snapshot) {
            (Decision::Fresh, Some(snapshot)) => {
                info!(
                    cache_layer = %read_layer,
                    item_count = snapshot.items.len(),
                    last_fetch = snapshot.last_fetch_epoch_millis,
                    "cache_served"
                );
                return Ok(ResolvedCollection {
                    items: snapshot.items,
                    fetched_at_millis: snapshot.last_fetch_epoch_millis,
                    from_cache: true,
                    layer: read_layer,
                    trigger: None,
                });
            }
            (Decision::Refresh(trigger), _) => trigger,
            // decide() never calls a missing snapshot fresh
            (Decision::Fresh, None) => RefreshTrigger::Expired,
        };

        info!(
            trigger = %trigger,
            had_snapshot = had_snapshot,
            "cache_refresh_started"
        );

        let items = Arc::new(self.fetcher.fetch_all().await?);
        let layer = self.cache.write_snapshot(items.clone(), now).await;

        info!(
            trigger = %trigger,
            cache_layer = %layer,
            item_count = items.len(),
            "cache_refresh_complete"
        );

        Ok(ResolvedCollection {
            items,
            fetched_at_millis: now,
            from_cache: false,
            layer,
            trigger: Some(trigger),
        })
    }
}
