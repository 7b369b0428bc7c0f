//! Web server module for the reports endpoint.
//!
//! This module provides a single read endpoint that:
//! - Serves filtered, sorted pages of the cached collection
//! - Accepts signed Webflow webhooks as a refresh trigger
//! - Answers CORS preflights
//!
//! Every response, errors included, carries permissive CORS headers.

pub mod error;
pub mod handlers;
pub mod query;
pub mod signature;

use axum::{
    http::{header, HeaderValue},
    routing::get,
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

pub use error::{AppError, ErrorResponse};
pub use handlers::{health, preflight, reports, AppState, HealthResponse, ReportsMeta, ReportsResponse};
pub use query::parse_query;
pub use signature::{decode_raw_body, verify_webhook_signature};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reports", get(reports).post(reports).options(preflight))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type, X-Webflow-Signature"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .with_state(state)
}
