//! Per-view renderers: pure functions from a funnel frame plus client config
//! to panel fragments. They consume state and never own or mutate it, so the
//! same frame always renders the same markup — back-navigation simply renders
//! the popped frame again and every control comes back live.

use crate::client::{BookingMode, ClientConfig};
use crate::funnel::{Frame, ViewId};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedView {
    pub view: ViewId,
    pub title: String,
    pub step: String,
    pub body_html: String,
    pub footer_html: Option<String>,
    pub no_padding: bool,
}

pub fn render(frame: &Frame, client: &ClientConfig) -> RenderedView {
    match frame.view {
        ViewId::Entry => view_entry(client),
        ViewId::HotInterstitial => view_hot_interstitial(client),
        ViewId::ServicePicker => view_service_picker(client),
        ViewId::Booking => view_booking(frame, client),
        ViewId::RequestForm => view_request_form(frame, client),
        ViewId::CallUs => view_call_us(frame, client),
        ViewId::Success => view_success(client),
    }
}

fn view_entry(client: &ClientConfig) -> RenderedView {
    let body = format!(
        r#"<div class="lp-muted" style="margin-bottom:10px;"><b>Quick question</b> — how quickly do you need help?</div>
<div class="lp-list">
{}{}{}</div>"#,
        row_item(
            "urgency",
            "today",
            Some("#FF3B30"),
            "Urgent — today",
            "System down, security issue, or stoppage",
        ),
        row_item(
            "urgency",
            "week",
            Some("#34C759"),
            "This week",
            "Non-urgent support or follow-up",
        ),
        row_item(
            "urgency",
            "quote",
            Some("#007AFF"),
            "Quote / Question",
            "Pricing, onboarding, or general info",
        ),
    );
    RenderedView {
        view: ViewId::Entry,
        title: client.theme.business.clone(),
        step: "Step 1 of 3".to_string(),
        body_html: body,
        footer_html: None,
        no_padding: false,
    }
}

fn view_hot_interstitial(client: &ClientConfig) -> RenderedView {
    let phone = client.theme.phone.as_deref().unwrap_or_default();
    let body = format!(
        r#"<div style="text-align:center; padding:20px 0;">
  <div style="font-size:40px; margin-bottom:10px;">🔥</div>
  <h3 style="margin:0 0 10px 0;">This sounds urgent.</h3>
  <p class="lp-muted" style="margin-bottom:24px;">For fastest service, we recommend calling now.</p>
  <a href="tel:{}" class="lp-primary" style="background:#34C759;color:#fff;text-decoration:none;margin-bottom:12px;">Call Now ({})</a>
  <button class="lp-secondary" data-action="continue-online">No, I prefer to book online</button>
</div>"#,
        escape_attr(phone),
        escape_html(phone),
    );
    RenderedView {
        view: ViewId::HotInterstitial,
        title: client.theme.business.clone(),
        step: "Urgent".to_string(),
        body_html: body,
        footer_html: None,
        no_padding: false,
    }
}

fn view_service_picker(client: &ClientConfig) -> RenderedView {
    // Urgent work already branched at the entry view; emergency-labeled
    // services would only duplicate that choice here.
    let rows: String = if client.services.is_empty() {
        r#"<div class="lp-muted">Tell us what you need and we'll take it from there.</div>
"#
        .to_string()
    } else {
        client
            .services
            .iter()
            .filter(|s| !emergency_label_re().is_match(&s.label))
            .map(|s| row_item("select-service", &s.id, None, &s.label, &s.description))
            .collect()
    };

    let manual = if client.theme.booking_mode == BookingMode::Instant {
        String::new()
    } else {
        r#"<button class="lp-rowitem" data-action="manual-request"><div>Something else?</div><span>›</span></button>
"#
        .to_string()
    };

    let body = format!(
        r#"<div class="lp-muted" style="margin-bottom:10px;">Choose what you need help with:</div>
<div class="lp-list">
{rows}{manual}</div>"#,
    );
    RenderedView {
        view: ViewId::ServicePicker,
        title: client.theme.business.clone(),
        step: "Step 2 of 3".to_string(),
        body_html: body,
        footer_html: None,
        no_padding: false,
    }
}

fn view_booking(frame: &Frame, client: &ClientConfig) -> RenderedView {
    let service = frame
        .data
        .service_id
        .as_deref()
        .and_then(|id| client.services.get(id));
    let url = service.and_then(|s| s.booking_url.as_deref()).unwrap_or("");

    let fallback_allowed = service
        .map(|s| crate::funnel::request_form_allowed(s, client))
        .unwrap_or(client.theme.booking_mode != BookingMode::Instant);
    let footer = if fallback_allowed {
        Some(
            r#"<div class="lp-actions" style="margin-top:0;">
  <button class="lp-secondary" data-action="fallback">Can't find a time?</button>
</div>"#
                .to_string(),
        )
    } else {
        None
    };

    RenderedView {
        view: ViewId::Booking,
        title: "Select Time".to_string(),
        step: service
            .map(|s| s.label.clone())
            .unwrap_or_else(|| "Booking".to_string()),
        body_html: format!(
            r#"<iframe class="lp-iframe" src="{}" loading="lazy"></iframe>"#,
            escape_attr(url)
        ),
        footer_html: footer,
        no_padding: true,
    }
}

fn view_request_form(frame: &Frame, client: &ClientConfig) -> RenderedView {
    let is_hot = frame.data.urgency.is_hot();

    // The pill carries either the hot indicator or the urgency label the
    // visitor picked at the entry view.
    let pill = if is_hot {
        format!(
            r#" <span class="lp-pill" style="background:{};color:#fff;">HOT</span>"#,
            escape_attr(&client.theme.color)
        )
    } else if frame.data.urgency_label.is_empty() {
        String::new()
    } else {
        format!(
            r#" <span class="lp-pill lp-pill-muted">{}</span>"#,
            escape_html(&frame.data.urgency_label)
        )
    };

    let details_label = match (&client.theme.message_label, is_hot) {
        (Some(label), _) => label.clone(),
        (None, true) => "Critical Issue Details".to_string(),
        (None, false) => "Details".to_string(),
    };
    let details_placeholder = if is_hot {
        "Please describe the critical issue..."
    } else {
        "How can we help?"
    };
    let timing_value = if is_hot { "ASAP / Emergency" } else { "" };

    let body = format!(
        r#"<div class="lp-muted" style="margin-bottom:10px;"><b>{cta}</b> — we’ll contact you ASAP.{pill}</div>
<div class="lp-label">Name</div>
<input class="lp-input" id="lp-name" placeholder="Full name" />
<div class="lp-row">
  <div><div class="lp-label">Email</div><input class="lp-input" id="lp-email" placeholder="you@email.com" /></div>
  <div><div class="lp-label">Phone</div><input class="lp-input" id="lp-phone" placeholder="(555) 123-4567" /></div>
</div>
<div class="lp-label">Timing</div>
<input class="lp-input" id="lp-time" placeholder="When do you need this?" value="{timing}" />
<div class="lp-label">{details}</div>
<textarea class="lp-input" id="lp-msg" rows="3" placeholder="{details_ph}"></textarea>
<input id="lp-hp" style="position:absolute; opacity:0; pointer-events:none; width:1px;" tabindex="-1" />"#,
        cta = escape_html(&client.theme.cta_label),
        pill = pill,
        timing = escape_attr(timing_value),
        details = escape_html(&details_label),
        details_ph = escape_attr(details_placeholder),
    );

    let footer = format!(
        r#"<div class="lp-actions">
  <button class="lp-primary" data-action="submit" style="background:{};color:#fff;">Send Request</button>
</div>
<div class="lp-muted" id="lp-status" style="margin-top:10px; text-align:center;"></div>"#,
        escape_attr(&client.theme.color)
    );

    RenderedView {
        view: ViewId::RequestForm,
        title: "Final Step".to_string(),
        step: "Contact Info".to_string(),
        body_html: body,
        footer_html: Some(footer),
        no_padding: false,
    }
}

/// Shown when a service has neither a booking URL nor a request-form
/// fallback; the phone is the only remaining channel.
fn view_call_us(frame: &Frame, client: &ClientConfig) -> RenderedView {
    let phone_block = match client.theme.phone.as_deref() {
        Some(phone) => format!(
            r#"<a href="tel:{}" class="lp-primary" style="background:{};color:#fff;text-decoration:none;">Call {}</a>"#,
            escape_attr(phone),
            escape_attr(&client.theme.color),
            escape_html(phone),
        ),
        None => r#"<p class="lp-muted">Please call us to get scheduled.</p>"#.to_string(),
    };
    let body = format!(
        r#"<div style="text-align:center; padding:20px 0;">
  <div style="font-size:40px; margin-bottom:10px;">📞</div>
  <h3 style="margin:0 0 10px 0;">Online booking isn't available for {}.</h3>
  <p class="lp-muted" style="margin-bottom:24px;">Give us a quick call and we'll get you scheduled.</p>
  {}
</div>"#,
        escape_html(frame.data.resolved_service_label()),
        phone_block,
    );
    RenderedView {
        view: ViewId::CallUs,
        title: client.theme.business.clone(),
        step: frame.data.resolved_service_label().to_string(),
        body_html: body,
        footer_html: None,
        no_padding: false,
    }
}

fn view_success(_client: &ClientConfig) -> RenderedView {
    RenderedView {
        view: ViewId::Success,
        title: "Received".to_string(),
        step: String::new(),
        body_html: r#"<div class="lp-card" style="text-align:center; padding:30px 20px;">
  <div style="font-size:40px; margin-bottom:10px;">✅</div>
  <div style="font-weight:700; font-size:18px;">Received!</div>
  <div class="lp-muted" style="margin-top:5px;">We will be in touch shortly.</div>
</div>"#
            .to_string(),
        footer_html: Some(
            r#"<button class="lp-secondary" data-action="close">Close</button>
<button class="lp-secondary" data-action="start-over">Submit another request</button>"#
                .to_string(),
        ),
        no_padding: false,
    }
}

fn row_item(action: &str, payload: &str, color: Option<&str>, title: &str, sub: &str) -> String {
    let dot = color
        .map(|c| {
            format!(
                r#"<div style="background:{c}; width:12px; height:12px; border-radius:50%; margin-right:12px; flex-shrink:0;"></div>"#
            )
        })
        .unwrap_or_default();
    format!(
        r#"<button class="lp-rowitem" data-action="{action}" data-payload="{payload}" style="display:flex; align-items:center;">
  {dot}<div style="flex:1;">{title} <span class="lp-muted" style="display:block; font-size:13px; margin-top:2px;">{sub}</span></div>
  <span>›</span>
</button>
"#,
        action = escape_attr(action),
        payload = escape_attr(payload),
        dot = dot,
        title = escape_html(title),
        sub = escape_html(sub),
    )
}

fn emergency_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("(?i)emergency|urgent").expect("valid pattern"))
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn escape_attr(s: &str) -> String {
    escape_html(s).replace('"', "&quot;")
}
