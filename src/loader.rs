use crate::client::{ClientConfig, RawWidgetConfig};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Fatal for the boot that hit it: the widget renders nothing at all.
    #[error("client configuration unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ConfigLoader: Send + Sync {
    async fn load(&self, client_id: &str) -> Result<Arc<ClientConfig>, ConfigError>;
}

/// Fetches `GET {backend}?action=config&client={id}` and normalizes the
/// payload. Fail-closed: transport errors, bad status, parse failures, and
/// `ok:false` all collapse into `ConfigError::Unavailable` with no retry.
pub struct HttpConfigLoader {
    base: Url,
    client: reqwest::Client,
}

impl HttpConfigLoader {
    pub fn new(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }
}

#[async_trait]
impl ConfigLoader for HttpConfigLoader {
    async fn load(&self, client_id: &str) -> Result<Arc<ClientConfig>, ConfigError> {
        let mut url = self.base.clone();
        url.query_pairs_mut()
            .append_pair("action", "config")
            .append_pair("client", client_id);

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ConfigError::Unavailable(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ConfigError::Unavailable(format!(
                "config endpoint returned {status}"
            )));
        }
        let raw: RawWidgetConfig = resp
            .json()
            .await
            .map_err(|e| ConfigError::Unavailable(format!("malformed config payload: {e}")))?;
        if !raw.ok {
            warn!(%client_id, "backend declined config (ok=false)");
            return Err(ConfigError::Unavailable(
                "backend returned ok=false".to_string(),
            ));
        }
        Ok(Arc::new(ClientConfig::from_raw(raw)))
    }
}

/// TTL cache in front of another loader. A zero TTL disables caching so every
/// boot sees the backend directly.
pub struct CachingConfigLoader {
    inner: Arc<dyn ConfigLoader>,
    ttl: Duration,
    cache: tokio::sync::RwLock<HashMap<String, (Instant, Arc<ClientConfig>)>>,
}

impl CachingConfigLoader {
    pub fn new(inner: Arc<dyn ConfigLoader>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: tokio::sync::RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ConfigLoader for CachingConfigLoader {
    async fn load(&self, client_id: &str) -> Result<Arc<ClientConfig>, ConfigError> {
        if !self.ttl.is_zero()
            && let Some((fetched, config)) = self.cache.read().await.get(client_id)
            && fetched.elapsed() < self.ttl
        {
            debug!(%client_id, "theme cache hit");
            return Ok(config.clone());
        }
        let config = self.inner.load(client_id).await?;
        if !self.ttl.is_zero() {
            self.cache
                .write()
                .await
                .insert(client_id.to_string(), (Instant::now(), config.clone()));
        }
        Ok(config)
    }
}
