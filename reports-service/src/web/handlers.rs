//! Endpoint handlers.
//!
//! `/reports` answers GET and POST the same way. A POST whose body carries a
//! valid Webflow signature additionally forces a refresh; any other POST is
//! treated exactly like a GET.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::cache::CacheLayer;
use crate::projection::project;
use crate::refresh::{RefreshRequest, Refresher};
use crate::upstream::Item;
use crate::web::error::AppError;
use crate::web::query::parse_query;
use crate::web::signature::{decode_raw_body, verify_webhook_signature, SIGNATURE_HEADER};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub refresher: Refresher,
}

impl AppState {
    pub fn new(config: Config, refresher: Refresher) -> Self {
        Self {
            config: Arc::new(config),
            refresher,
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Reports
// =============================================================================

/// Successful `/reports` body.
#[derive(Debug, Serialize)]
pub struct ReportsResponse {
    pub items: Vec<Item>,
    pub meta: ReportsMeta,
}

/// Paging and cache provenance for one response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportsMeta {
    pub limit: usize,
    pub offset: usize,
    pub total: usize,
    pub has_more: bool,
    pub filter: &'static str,
    pub exclude_slug: String,
    pub cached_at: String,
    pub from_cache: bool,
    pub cache_layer: CacheLayer,
    pub webhook: &'static str,
}

/// CORS preflight; the headers come from the router layers.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Serve one page of the cached collection.
///
/// This endpoint:
/// 1. Parses the query string, defaulting anything malformed
/// 2. Verifies the webhook signature on POST
/// 3. Resolves the snapshot, refreshing it when required
/// 4. Projects the page and reports where the data came from
pub async fn reports(
    State(state): State<AppState>,
    method: Method,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let params = parse_query(query.as_deref());
    let verified_webhook = method == Method::POST && is_verified_webhook(&state.config, &headers, &body);

    info!(
        method = %method,
        limit = params.limit,
        offset = params.offset,
        filter = params.filter.as_str(),
        force_refresh = params.force_refresh,
        verified_webhook = verified_webhook,
        "reports_request_received"
    );

    let resolved = state
        .refresher
        .resolve(RefreshRequest {
            force_refresh: params.force_refresh,
            verified_webhook,
        })
        .await
        .map_err(|e| {
            error!(error = %e, "reports_refresh_failed");
            AppError::from(e)
        })?;

    let page = project(&resolved.items, &params);

    let response = ReportsResponse {
        meta: ReportsMeta {
            limit: params.limit,
            offset: params.offset,
            total: page.total,
            has_more: page.has_more,
            filter: params.filter.as_str(),
            exclude_slug: params.exclude_slug.clone().unwrap_or_else(|| "none".to_string()),
            cached_at: iso_timestamp(resolved.fetched_at_millis),
            from_cache: resolved.from_cache,
            cache_layer: resolved.layer,
            webhook: if verified_webhook { "verified" } else { "none" },
        },
        items: page.items,
    };

    Ok((
        [(header::CACHE_CONTROL, state.config.edge_cache_control())],
        Json(response),
    )
        .into_response())
}

fn is_verified_webhook(config: &Config, headers: &HeaderMap, body: &[u8]) -> bool {
    if !config.webhook_refresh_enabled() {
        return false;
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let base64_encoded = headers
        .get("content-transfer-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("base64"))
        .unwrap_or(false);

    let raw_body = decode_raw_body(body, base64_encoded);
    verify_webhook_signature(&raw_body, signature, &config.webhook_secrets)
}

/// `2024-05-01T08:00:00.000Z`
fn iso_timestamp(epoch_millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(epoch_millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
