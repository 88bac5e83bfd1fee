use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Fully assembled lead, posted to `{backend}?action=lead`. The honeypot
/// field is forwarded verbatim — spam filtering is the backend's call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadPayload {
    pub client_id: String,
    pub session_id: String,
    pub intent: String,
    pub service_id: String,
    pub service_label: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_time: Option<String>,
    pub message: String,
    pub company_website: String,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeadReceipt {
    pub lead_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum LeadError {
    #[error("lead endpoint unreachable: {0}")]
    Transport(String),
    #[error("backend rejected the lead")]
    Rejected,
}

/// One attempt per user click. No retries, no offline queue; failure goes
/// straight back to the state machine so the visitor can resubmit.
#[async_trait]
pub trait LeadGateway: Send + Sync {
    async fn submit(&self, payload: &LeadPayload) -> Result<LeadReceipt, LeadError>;
}

pub struct HttpLeadGateway {
    base: Url,
    client: reqwest::Client,
}

impl HttpLeadGateway {
    pub fn new(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }
}

#[derive(Debug, Deserialize)]
struct LeadResponse {
    #[serde(default)]
    ok: bool,
    lead_id: Option<String>,
}

#[async_trait]
impl LeadGateway for HttpLeadGateway {
    async fn submit(&self, payload: &LeadPayload) -> Result<LeadReceipt, LeadError> {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("action", "lead");

        let resp = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| LeadError::Transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(LeadError::Transport(format!(
                "lead endpoint returned {status}"
            )));
        }
        let body: LeadResponse = resp
            .json()
            .await
            .map_err(|e| LeadError::Transport(e.to_string()))?;
        if !body.ok {
            return Err(LeadError::Rejected);
        }
        info!(
            client_id = %payload.client_id,
            intent = %payload.intent,
            lead_id = ?body.lead_id,
            "lead accepted"
        );
        Ok(LeadReceipt {
            lead_id: body.lead_id,
        })
    }
}

/// Telemetry notification posted to `{backend}?action=event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub client_id: String,
    pub session_id: String,
    pub event_name: String,
    pub meta: serde_json::Value,
    pub source_url: String,
    pub timestamp_ms: i64,
}

impl TelemetryEvent {
    pub fn new(
        client_id: &str,
        session_id: &str,
        event_name: &str,
        meta: serde_json::Value,
        source_url: &str,
    ) -> Self {
        Self {
            client_id: client_id.to_string(),
            session_id: session_id.to_string(),
            event_name: event_name.to_string(),
            meta,
            source_url: source_url.to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Best-effort, fire-and-forget. Failures are swallowed; telemetry must never
/// affect funnel progression.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn record_event(&self, event: TelemetryEvent);
}

pub struct HttpTelemetrySink {
    base: Url,
    client: reqwest::Client,
}

impl HttpTelemetrySink {
    pub fn new(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base, client })
    }
}

#[async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn record_event(&self, event: TelemetryEvent) {
        let mut url = self.base.clone();
        url.query_pairs_mut().append_pair("action", "event");
        if let Err(err) = self.client.post(url).json(&event).send().await {
            debug!(event_name = %event.event_name, %err, "telemetry post failed; dropping");
        }
    }
}

/// Sink for tests and for running without a telemetry backend.
#[derive(Default)]
pub struct NullTelemetrySink;

#[async_trait]
impl TelemetrySink for NullTelemetrySink {
    async fn record_event(&self, event: TelemetryEvent) {
        debug!(event_name = %event.event_name, "telemetry event (null sink)");
    }
}
