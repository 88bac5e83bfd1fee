use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Runtime configuration for the widget server. Built once at startup and
/// passed by reference into everything that needs it; no ambient globals.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Base URL of the client backend exposing `action=config|lead|event`.
    pub backend_url: Url,
    /// Client id assumed when an embed omits `data-client` forwarding.
    pub default_client: Option<String>,
    pub enable_cors: bool,
    pub theme_cache_ttl: Duration,
    pub session_ttl: Duration,
    pub backend_timeout: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr: SocketAddr = std::env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .context("failed to parse BIND_ADDR")?;

        let backend_url: Url = std::env::var("BACKEND_URL")
            .context("BACKEND_URL not set")?
            .parse()
            .context("failed to parse BACKEND_URL")?;

        let default_client = std::env::var("DEFAULT_CLIENT")
            .ok()
            .filter(|v| !v.is_empty());

        // Embeds run cross-origin by nature, so CORS defaults on.
        let enable_cors = std::env::var("ENABLE_CORS")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        let theme_cache_ttl = duration_secs_var("THEME_CACHE_TTL_SECS", 60);
        let session_ttl = duration_secs_var("SESSION_TTL_SECS", 60 * 60 * 24);
        let backend_timeout = std::env::var("BACKEND_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(10));

        Ok(Self {
            bind_addr,
            backend_url,
            default_client,
            enable_cors,
            theme_cache_ttl,
            session_ttl,
            backend_timeout,
        })
    }
}

fn duration_secs_var(name: &str, default_secs: u64) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(default_secs))
}
