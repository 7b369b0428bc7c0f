//! Reports cache - read-through cache for a Webflow CMS collection.
//!
//! This library provides the modules behind the `reports-web` binary:
//! - `upstream`: paging client for the collection's live items
//! - `cache`: snapshot storage in Redis with an in-process fallback
//! - `refresh`: the per-request serve-or-refresh decision
//! - `projection`: filtering, sorting and paging of a snapshot
//! - `web`: HTTP surface and webhook signature verification
//!
//! ## Architecture
//!
//! ```text
//! Request → signature check (POST) → Refresher → SnapshotCache ⇄ WebflowClient
//!                                        ↓
//!                                    project() → JSON page
//! ```

pub mod cache;
pub mod config;
pub mod projection;
pub mod refresh;
pub mod upstream;
pub mod web;

// Re-export commonly used types
pub use cache::{CacheLayer, CachedCollection, SnapshotCache};
pub use config::Config;
pub use projection::{project, ItemFilter, Page, QueryParameters, SortOrder};
pub use refresh::{decide, Decision, RefreshTrigger, Refresher, SystemClock};
pub use upstream::{CollectionFetcher, Item, UpstreamError, WebflowClient};
pub use web::{router, AppState};
