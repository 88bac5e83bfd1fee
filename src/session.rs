use crate::funnel::FunnelState;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Provider(String),
}

/// Per-browser panel state. The session identifier itself is minted and
/// persisted by the embed script (one localStorage key, never regenerated);
/// the store only maps that id to funnel progress so closing and reopening
/// the panel resumes where the visitor left off.
#[derive(Debug, Clone)]
pub struct PanelSession {
    pub client_id: String,
    pub funnel: FunnelState,
    pub last_seen: Instant,
}

impl PanelSession {
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            funnel: FunnelState::new(),
            last_seen: Instant::now(),
        }
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<PanelSession>, SessionError>;
    async fn save(&self, session_id: &str, session: PanelSession) -> Result<(), SessionError>;
    async fn remove(&self, session_id: &str) -> Result<(), SessionError>;
}

/// In-memory store with lazy TTL expiry. A zero TTL means sessions live for
/// the process lifetime.
pub struct InMemorySessionStore {
    ttl: Duration,
    inner: tokio::sync::RwLock<HashMap<String, PanelSession>>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: tokio::sync::RwLock::new(HashMap::new()),
        }
    }

    fn expired(&self, session: &PanelSession) -> bool {
        !self.ttl.is_zero() && session.last_seen.elapsed() >= self.ttl
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<PanelSession>, SessionError> {
        let stale = {
            let guard = self.inner.read().await;
            match guard.get(session_id) {
                Some(session) if !self.expired(session) => return Ok(Some(session.clone())),
                Some(_) => true,
                None => false,
            }
        };
        if stale {
            self.inner.write().await.remove(session_id);
        }
        Ok(None)
    }

    async fn save(&self, session_id: &str, mut session: PanelSession) -> Result<(), SessionError> {
        session.last_seen = Instant::now();
        self.inner
            .write()
            .await
            .insert(session_id.to_string(), session);
        Ok(())
    }

    async fn remove(&self, session_id: &str) -> Result<(), SessionError> {
        self.inner.write().await.remove(session_id);
        Ok(())
    }
}

/// Backstop for browsers that arrive without a stored identifier; the embed
/// script adopts whatever the boot response hands back.
pub fn issue_session_id() -> String {
    format!("s_{}", uuid::Uuid::new_v4().simple())
}
