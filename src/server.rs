use crate::client::{ClientConfig, ClientTheme};
use crate::config::AppConfig;
use crate::funnel::{Action, Effect, FunnelState, ViewId};
use crate::gateway::{LeadGateway, LeadPayload, TelemetryEvent, TelemetrySink};
use crate::loader::ConfigLoader;
use crate::session::{PanelSession, SessionStore, issue_session_id};
use crate::views;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::{HeaderValue, StatusCode, header};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

const SUBMIT_FAILURE_MESSAGE: &str = "Connection error. Please call us.";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub loader: Arc<dyn ConfigLoader>,
    pub sessions: Arc<dyn SessionStore>,
    pub leads: Arc<dyn LeadGateway>,
    pub telemetry: Arc<dyn TelemetrySink>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        loader: Arc<dyn ConfigLoader>,
        sessions: Arc<dyn SessionStore>,
        leads: Arc<dyn LeadGateway>,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            loader,
            sessions,
            leads,
            telemetry,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/widget.js", get(serve_widget_js))
        .route("/widget.css", get(serve_widget_css))
        .route("/api/widget/boot", get(boot))
        .route("/api/widget/action", post(widget_action))
        .route("/api/widget/events", post(post_events))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());
    if state.config.enable_cors {
        // The embed always runs on a foreign origin.
        router = router.layer(CorsLayer::permissive());
    }
    router.with_state(state)
}

pub async fn run(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

async fn serve_widget_js() -> Response {
    serve_asset("assets/widget.js", crate::sdk::embed_script, "application/javascript").await
}

async fn serve_widget_css() -> Response {
    serve_asset("assets/widget.css", crate::sdk::widget_css, "text/css").await
}

/// Disk override first so operators can ship a custom build of the embed
/// assets, then the built-in copy.
async fn serve_asset(path: &str, builtin: fn() -> String, content_type: &'static str) -> Response {
    let body = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(_) => builtin(),
    };
    let mut resp = Response::new(body.into());
    resp.headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

/// One rendered panel step as the embed script consumes it.
#[derive(Debug, Serialize, Deserialize)]
pub struct RenderResponse {
    pub view: String,
    pub title: String,
    pub step: String,
    pub body_html: String,
    pub footer_html: Option<String>,
    pub no_padding: bool,
    pub back_visible: bool,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn render_response(
    funnel: &FunnelState,
    client: &ClientConfig,
    error: Option<String>,
) -> RenderResponse {
    let frame = funnel.current();
    let rendered = views::render(frame, client);
    RenderResponse {
        view: rendered.view.as_str().to_string(),
        title: rendered.title,
        step: rendered.step,
        body_html: rendered.body_html,
        footer_html: rendered.footer_html,
        no_padding: rendered.no_padding,
        back_visible: funnel.depth() > 1,
        depth: funnel.depth(),
        error,
    }
}

#[derive(Debug, Deserialize)]
pub struct BootQuery {
    pub client: Option<String>,
    pub session: Option<String>,
    pub placement: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BootResponse {
    pub ok: bool,
    pub session_id: String,
    pub theme: ClientTheme,
    pub render: RenderResponse,
}

async fn boot(State(state): State<AppState>, Query(query): Query<BootQuery>) -> Response {
    let Some(client_id) = resolve_client_id(&state, query.client.as_deref()) else {
        return (StatusCode::BAD_REQUEST, "missing client id").into_response();
    };

    // Fail-closed: without config the widget renders nothing.
    let client = match state.loader.load(&client_id).await {
        Ok(client) => client,
        Err(err) => {
            warn!(%client_id, %err, "boot declined");
            return (StatusCode::BAD_GATEWAY, err.to_string()).into_response();
        }
    };

    let session_id = query
        .session
        .filter(|s| !s.is_empty())
        .unwrap_or_else(issue_session_id);
    let session = match load_or_create_session(&state, &session_id, &client_id).await {
        Ok(session) => session,
        Err(err) => return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    };

    let render = render_response(&session.funnel, &client, None);
    if let Err(err) = state.sessions.save(&session_id, session).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }

    let placement = match query.placement.as_deref() {
        Some("inline") => "widget_render_inline",
        _ => "widget_render_floating",
    };
    emit_effects(
        &state,
        &client_id,
        &session_id,
        "",
        vec![Effect {
            event_name: placement,
            meta: serde_json::json!({}),
        }],
    );

    Json(BootResponse {
        ok: true,
        session_id,
        theme: client.theme.clone(),
        render,
    })
    .into_response()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactFields {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub preferred_time: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub company_website: String,
    #[serde(default)]
    pub referrer: String,
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub session_id: String,
    pub client: Option<String>,
    pub action: String,
    pub payload: Option<String>,
    pub contact: Option<ContactFields>,
    pub source_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub session_id: String,
    pub render: RenderResponse,
}

async fn widget_action(State(state): State<AppState>, Json(body): Json<ActionRequest>) -> Response {
    let Some(client_id) = resolve_client_id(&state, body.client.as_deref()) else {
        return (StatusCode::BAD_REQUEST, "missing client id").into_response();
    };
    if body.session_id.is_empty() {
        return (StatusCode::BAD_REQUEST, "missing session id").into_response();
    }

    let client = match state.loader.load(&client_id).await {
        Ok(client) => client,
        Err(err) => {
            warn!(%client_id, %err, "action declined: config unavailable");
            return (StatusCode::BAD_GATEWAY, err.to_string()).into_response();
        }
    };

    let mut session = match load_or_create_session(&state, &body.session_id, &client_id).await {
        Ok(session) => session,
        Err(err) => return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    };
    let source_url = body.source_url.clone().unwrap_or_default();

    let mut error = None;
    if body.action == "submit" {
        // Only the request form may submit. A stray submit (stale tab,
        // replayed request) never reaches the lead gateway.
        if session.funnel.current().view == ViewId::RequestForm {
            error = handle_submit(
                &state,
                &client_id,
                &body.session_id,
                &source_url,
                body.contact.unwrap_or_default(),
                &mut session,
                &client,
            )
            .await;
        } else {
            warn!(view = ?session.funnel.current().view, "submit outside the request form; forcing request form");
            session.funnel.force_request_form();
        }
    } else {
        match Action::from_wire(&body.action, body.payload.as_deref()) {
            Some(action) => {
                let effects = session.funnel.dispatch(action, &client);
                emit_effects(&state, &client_id, &body.session_id, &source_url, effects);
            }
            None => {
                // Unknown action names get the same emergency treatment as a
                // broken transition: never leave the visitor stuck.
                warn!(action = %body.action, "unknown widget action; forcing request form");
                session.funnel.force_request_form();
            }
        }
    }

    let render = render_response(&session.funnel, &client, error);
    if let Err(err) = state.sessions.save(&body.session_id, session).await {
        return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
    }
    Json(ActionResponse {
        ok: true,
        session_id: body.session_id,
        render,
    })
    .into_response()
}

/// Single attempt per click. Success resets the funnel onto the success
/// view; failure leaves the view untouched and returns the inline message so
/// the embed re-enables the submit control.
async fn handle_submit(
    state: &AppState,
    client_id: &str,
    session_id: &str,
    source_url: &str,
    contact: ContactFields,
    session: &mut PanelSession,
    client: &ClientConfig,
) -> Option<String> {
    let data = session.funnel.current().data.clone();
    let payload = LeadPayload {
        client_id: client_id.to_string(),
        session_id: session_id.to_string(),
        intent: data.intent().to_string(),
        service_id: data.service_id.clone().unwrap_or_default(),
        service_label: data.resolved_service_label().to_string(),
        name: contact.name,
        email: contact.email,
        phone: contact.phone,
        preferred_time: none_if_empty(contact.preferred_time),
        message: contact.message,
        company_website: contact.company_website,
        source_url: source_url.to_string(),
        referrer: none_if_empty(contact.referrer),
    };

    match state.leads.submit(&payload).await {
        Ok(receipt) => {
            let effects = session.funnel.dispatch(Action::SubmissionSucceeded, client);
            emit_effects(state, client_id, session_id, source_url, effects);
            emit_effects(
                state,
                client_id,
                session_id,
                source_url,
                vec![Effect {
                    event_name: "lead_submitted",
                    meta: serde_json::json!({
                        "intent": payload.intent,
                        "lead_id": receipt.lead_id,
                    }),
                }],
            );
            None
        }
        Err(err) => {
            warn!(%client_id, %err, "lead submission failed");
            let effects = session.funnel.dispatch(Action::SubmissionFailed, client);
            emit_effects(state, client_id, session_id, source_url, effects);
            Some(SUBMIT_FAILURE_MESSAGE.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub client: Option<String>,
    pub session_id: Option<String>,
    pub event_name: String,
    #[serde(default)]
    pub meta: serde_json::Value,
    pub source_url: Option<String>,
}

async fn post_events(State(state): State<AppState>, Json(body): Json<EventRequest>) -> Response {
    let Some(client_id) = resolve_client_id(&state, body.client.as_deref()) else {
        return (StatusCode::BAD_REQUEST, "missing client id").into_response();
    };
    let event = TelemetryEvent::new(
        &client_id,
        body.session_id.as_deref().unwrap_or_default(),
        &body.event_name,
        body.meta,
        body.source_url.as_deref().unwrap_or_default(),
    );
    let sink = state.telemetry.clone();
    tokio::spawn(async move { sink.record_event(event).await });
    StatusCode::ACCEPTED.into_response()
}

fn resolve_client_id(state: &AppState, requested: Option<&str>) -> Option<String> {
    requested
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .or_else(|| state.config.default_client.clone())
}

async fn load_or_create_session(
    state: &AppState,
    session_id: &str,
    client_id: &str,
) -> Result<PanelSession, crate::session::SessionError> {
    match state.sessions.load(session_id).await? {
        Some(session) if session.client_id == client_id => Ok(session),
        // Unknown (or cross-client) session ids start a fresh funnel.
        _ => Ok(PanelSession::new(client_id)),
    }
}

/// Telemetry is spawned off the request path; its failures never reach the
/// funnel.
fn emit_effects(
    state: &AppState,
    client_id: &str,
    session_id: &str,
    source_url: &str,
    effects: Vec<Effect>,
) {
    for effect in effects {
        let sink = state.telemetry.clone();
        let event = TelemetryEvent::new(
            client_id,
            session_id,
            effect.event_name,
            effect.meta,
            source_url,
        );
        tokio::spawn(async move { sink.record_event(event).await });
    }
}

fn none_if_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
