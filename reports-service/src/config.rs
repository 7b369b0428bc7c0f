//! Configuration module for environment variable parsing.
//!
//! Every setting has a documented default so the service starts with nothing
//! but an API token. A missing `REDIS_URL` is not an error: the snapshot cache
//! runs in its in-process fallback mode instead.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

/// Collection served when `UPSTREAM_COLLECTION_ID` is not set.
pub const DEFAULT_COLLECTION_ID: &str = "68a1d701da54a513636c4391";

/// Webflow Data API v2 root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.webflow.com/v2";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the upstream content API
    pub upstream_api_token: String,

    /// Collection whose live items are cached
    pub upstream_collection_id: String,

    /// Root URL of the upstream content API
    pub upstream_api_base_url: String,

    /// Accepted webhook HMAC secrets (old and new during a rotation)
    pub webhook_secrets: Vec<String>,

    /// Durable key-value store connection URL; `None` selects the in-process fallback
    pub redis_url: Option<String>,

    /// Namespace for the durable snapshot keys
    pub cache_key_prefix: String,

    /// How long a stored snapshot is served before it is refetched
    pub cache_ttl: Duration,

    /// Public `max-age` advertised to browsers and CDNs
    pub edge_max_age_secs: u64,

    /// Public `stale-while-revalidate` window
    pub edge_stale_while_revalidate_secs: u64,

    /// Port for the web server to listen on
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            upstream_api_token: String::new(),
            upstream_collection_id: DEFAULT_COLLECTION_ID.to_string(),
            upstream_api_base_url: DEFAULT_API_BASE_URL.to_string(),
            webhook_secrets: Vec::new(),
            redis_url: None,
            cache_key_prefix: "webflow-cache".to_string(),
            cache_ttl: Duration::from_secs(60 * 60 * 24),
            edge_max_age_secs: 60,
            edge_stale_while_revalidate_secs: 300,
            port: 8080,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            upstream_api_token: env::var("UPSTREAM_API_TOKEN").unwrap_or_default(),

            upstream_collection_id: non_empty("UPSTREAM_COLLECTION_ID")
                .unwrap_or(defaults.upstream_collection_id),

            upstream_api_base_url: non_empty("UPSTREAM_API_BASE_URL")
                .unwrap_or(defaults.upstream_api_base_url),

            webhook_secrets: parse_csv("WEBHOOK_SECRETS").unwrap_or_default(),

            redis_url: non_empty("REDIS_URL"),

            cache_key_prefix: non_empty("CACHE_KEY_PREFIX").unwrap_or(defaults.cache_key_prefix),

            cache_ttl: Duration::from_secs(parse_number(
                "CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )),

            edge_max_age_secs: parse_number("EDGE_MAX_AGE_SECS", defaults.edge_max_age_secs),

            edge_stale_while_revalidate_secs: parse_number(
                "EDGE_STALE_WHILE_REVALIDATE_SECS",
                defaults.edge_stale_while_revalidate_secs,
            ),

            port: parse_number("PORT", defaults.port),
        }
    }

    /// Whether a POST can ever be treated as a verified webhook.
    pub fn webhook_refresh_enabled(&self) -> bool {
        !self.webhook_secrets.is_empty()
    }

    /// `Cache-Control` value for successful responses.
    ///
    /// This horizon is independent of [`Config::cache_ttl`].
    pub fn edge_cache_control(&self) -> String {
        format!(
            "public, max-age={}, stale-while-revalidate={}",
            self.edge_max_age_secs, self.edge_stale_while_revalidate_secs
        )
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a numeric variable, warning and falling back on garbage.
fn parse_number<T: FromStr>(name: &str, default: T) -> T {
    let raw = match non_empty(name) {
        Some(v) => v,
        None => return default,
    };

    match raw.parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid numeric value, using default");
            default
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| split_csv(&raw))
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
