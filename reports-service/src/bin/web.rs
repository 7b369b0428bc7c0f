//! Reports Web Server - cached Webflow collection endpoint.
//!
//! This binary:
//! - Loads configuration from the environment
//! - Selects the snapshot store (Redis, or process memory when unconfigured)
//! - Serves `/reports` with the 24h snapshot cache and webhook refresh
//!
//! The snapshot cache and the public `Cache-Control` horizon are configured
//! separately.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reports_cache::{router, AppState, Config, Refresher, SnapshotCache, SystemClock, WebflowClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        collection_id = %config.upstream_collection_id,
        api_token_set = !config.upstream_api_token.is_empty(),
        webhook_secret_count = config.webhook_secrets.len(),
        durable_store_configured = config.redis_url.is_some(),
        cache_ttl_secs = config.cache_ttl.as_secs(),
        edge_max_age_secs = config.edge_max_age_secs,
        "config_loaded"
    );

    if config.upstream_api_token.is_empty() {
        warn!("upstream_api_token_missing");
    }
    if !config.webhook_refresh_enabled() {
        warn!("webhook_refresh_disabled");
    }

    // Create the upstream client
    let http = Client::builder()
        .gzip(true)
        .build()
        .context("Failed to create HTTP client")?;

    let fetcher = WebflowClient::new(
        http,
        config.upstream_api_base_url.clone(),
        config.upstream_collection_id.clone(),
        config.upstream_api_token.clone(),
    );

    // Select the snapshot store once for the lifetime of the process
    let cache = SnapshotCache::from_settings(config.redis_url.as_deref(), &config.cache_key_prefix);
    info!(cache_layer = %cache.layer(), "snapshot_cache_selected");

    let refresher = Refresher::new(cache, Arc::new(fetcher), Arc::new(SystemClock), config.cache_ttl);

    // Create application state
    let port = config.port;
    let state = AppState::new(config, refresher);

    // Build the router
    let app = router(state).layer(TraceLayer::new_for_http());

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "sigterm_handler_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
