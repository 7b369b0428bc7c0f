//! Upstream content API module.
//!
//! This module provides:
//! - The opaque [`Item`] record and the page envelope returned by the API
//! - The [`CollectionFetcher`] seam used by the refresh cycle
//! - [`WebflowClient`], the paging HTTP implementation
//!
//! ## Paging
//!
//! ```text
//! offset 0 (100 items) → offset 100 (100 items) → offset 200 (37 items) → done
//! ```

pub mod client;
pub mod types;

pub use client::{CollectionFetcher, UpstreamError, WebflowClient, PAGE_SIZE};
pub use types::{Item, ItemsPage};
