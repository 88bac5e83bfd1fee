//! The funnel state machine: a stack of view frames, each carrying the funnel
//! data snapshot it was entered with. Every transition (including back) is
//! answered by re-rendering the current frame from its snapshot, so restored
//! views are always live — markup is never saved or replayed.

use crate::client::{BookingMode, ClientConfig, Service};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewId {
    Entry,
    HotInterstitial,
    ServicePicker,
    Booking,
    RequestForm,
    CallUs,
    Success,
}

impl ViewId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewId::Entry => "entry",
            ViewId::HotInterstitial => "hot_interstitial",
            ViewId::ServicePicker => "service_picker",
            ViewId::Booking => "booking",
            ViewId::RequestForm => "request_form",
            ViewId::CallUs => "call_us",
            ViewId::Success => "success",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Unset,
    Today,
    Week,
    Quote,
}

impl Urgency {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "today" => Some(Urgency::Today),
            "week" => Some(Urgency::Week),
            "quote" => Some(Urgency::Quote),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Urgency::Unset => "",
            Urgency::Today => "today",
            Urgency::Week => "week",
            Urgency::Quote => "quote",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Urgency::Unset => "",
            Urgency::Today => "Urgent",
            Urgency::Week => "This week",
            Urgency::Quote => "Quote",
        }
    }

    /// A hot lead stays hot through any number of service/booking detours.
    pub fn is_hot(&self) -> bool {
        matches!(self, Urgency::Today)
    }
}

/// Funnel data carried by one frame. The selected service is held by id
/// (resolved against the registry at render/submit time), never by copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelData {
    pub urgency: Urgency,
    pub urgency_label: String,
    pub service_id: Option<String>,
    pub service_label: Option<String>,
}

impl FunnelData {
    pub fn resolved_service_label(&self) -> &str {
        self.service_label.as_deref().unwrap_or("General")
    }

    pub fn intent(&self) -> &'static str {
        if self.urgency.is_hot() { "urgent" } else { "request" }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub view: ViewId,
    pub data: FunnelData,
}

impl Frame {
    fn entry() -> Self {
        Self {
            view: ViewId::Entry,
            data: FunnelData::default(),
        }
    }
}

/// Discrete user-initiated inputs. No timers, no external push events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    ChooseUrgency(Urgency),
    ContinueOnline,
    SelectService(String),
    ManualRequest,
    BookingFallback,
    Back,
    Close,
    StartOver,
    SubmissionSucceeded,
    SubmissionFailed,
}

impl Action {
    /// Parses the wire form posted by the embed script. `None` means the
    /// action name is unknown; the dispatch boundary decides what to do.
    pub fn from_wire(action: &str, payload: Option<&str>) -> Option<Self> {
        match action {
            "urgency" => payload.and_then(Urgency::parse).map(Action::ChooseUrgency),
            "continue-online" => Some(Action::ContinueOnline),
            "select-service" => payload.map(|p| Action::SelectService(p.to_string())),
            "manual-request" => Some(Action::ManualRequest),
            "fallback" => Some(Action::BookingFallback),
            "back" => Some(Action::Back),
            "close" => Some(Action::Close),
            "start-over" => Some(Action::StartOver),
            _ => None,
        }
    }
}

/// Telemetry emissions produced by a transition. The machine stays pure; the
/// server performs these best-effort after the fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub event_name: &'static str,
    pub meta: serde_json::Value,
}

#[derive(Debug, Error)]
pub enum FunnelError {
    #[error("action {action:?} is not valid in view {view:?}")]
    InvalidAction { view: ViewId, action: Action },
    #[error("urgency choice was empty")]
    EmptyUrgency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunnelState {
    stack: Vec<Frame>,
}

impl Default for FunnelState {
    fn default() -> Self {
        Self::new()
    }
}

impl FunnelState {
    pub fn new() -> Self {
        Self {
            stack: vec![Frame::entry()],
        }
    }

    pub fn current(&self) -> &Frame {
        self.stack.last().expect("stack is never empty")
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn push(&mut self, view: ViewId, data: FunnelData) {
        self.stack.push(Frame { view, data });
    }

    /// Emergency escape hatch: advance to the request form with the current
    /// funnel data so the visitor is never stuck on a broken view.
    pub fn force_request_form(&mut self) {
        let data = self.current().data.clone();
        self.push(ViewId::RequestForm, data);
    }

    /// Applies one action at the dispatch boundary. Transition failures are
    /// logged and answered by failing into the safest forward state rather
    /// than surfacing an error to the visitor.
    pub fn dispatch(&mut self, action: Action, client: &ClientConfig) -> Vec<Effect> {
        match self.apply(action, client) {
            Ok(effects) => effects,
            Err(err) => {
                tracing::warn!(%err, view = ?self.current().view, "funnel transition failed; forcing request form");
                self.force_request_form();
                Vec::new()
            }
        }
    }

    pub fn apply(
        &mut self,
        action: Action,
        client: &ClientConfig,
    ) -> Result<Vec<Effect>, FunnelError> {
        let view = self.current().view;
        match action {
            Action::Back => {
                if self.stack.len() > 1 {
                    self.stack.pop();
                }
                Ok(Vec::new())
            }
            // Close hides the panel without touching the stack; reopening
            // resumes where the visitor left off.
            Action::Close => Ok(vec![Effect {
                event_name: "widget_close",
                meta: serde_json::json!({}),
            }]),
            Action::ChooseUrgency(urgency) if view == ViewId::Entry => {
                self.choose_urgency(urgency, client)
            }
            Action::ContinueOnline if view == ViewId::HotInterstitial => {
                let data = self.current().data.clone();
                self.push(ViewId::ServicePicker, data);
                Ok(Vec::new())
            }
            Action::SelectService(id) if view == ViewId::ServicePicker => {
                self.select_service(&id, client)
            }
            Action::ManualRequest if view == ViewId::ServicePicker => {
                let mut data = self.current().data.clone();
                data.service_id = None;
                data.service_label = Some("General Request".to_string());
                self.push(ViewId::RequestForm, data);
                Ok(Vec::new())
            }
            Action::BookingFallback if view == ViewId::Booking => {
                let data = self.current().data.clone();
                self.push(ViewId::RequestForm, data);
                Ok(Vec::new())
            }
            Action::SubmissionSucceeded if view == ViewId::RequestForm => {
                // Explicit reset: the success view is terminal, back never
                // leads out of it.
                let data = self.current().data.clone();
                self.stack = vec![Frame {
                    view: ViewId::Success,
                    data,
                }];
                Ok(Vec::new())
            }
            // Failure is not a transition: the view layer re-enables the
            // submit control and surfaces the inline message.
            Action::SubmissionFailed if view == ViewId::RequestForm => Ok(Vec::new()),
            Action::StartOver if view == ViewId::Success => {
                self.stack = vec![Frame::entry()];
                Ok(Vec::new())
            }
            action => Err(FunnelError::InvalidAction { view, action }),
        }
    }

    fn choose_urgency(
        &mut self,
        urgency: Urgency,
        client: &ClientConfig,
    ) -> Result<Vec<Effect>, FunnelError> {
        if urgency == Urgency::Unset {
            return Err(FunnelError::EmptyUrgency);
        }
        let mut data = self.current().data.clone();
        data.urgency = urgency;
        data.urgency_label = urgency.label().to_string();

        let next = match urgency {
            Urgency::Today if client.theme.phone.is_some() => ViewId::HotInterstitial,
            // No phone configured: hot leads skip straight to the form.
            Urgency::Today => ViewId::RequestForm,
            Urgency::Week => ViewId::ServicePicker,
            Urgency::Quote => ViewId::RequestForm,
            Urgency::Unset => unreachable!(),
        };
        self.push(next, data);
        Ok(vec![Effect {
            event_name: "urgency_selected",
            meta: serde_json::json!({
                "urgency": urgency.key(),
                "urgency_label": urgency.label(),
            }),
        }])
    }

    fn select_service(
        &mut self,
        id: &str,
        client: &ClientConfig,
    ) -> Result<Vec<Effect>, FunnelError> {
        let mut data = self.current().data.clone();
        // Unresolvable ids (stale payload, double-click race) degrade to a
        // general request; this path must never error.
        let service = client.services.get(id);
        match service {
            Some(svc) => {
                data.service_id = Some(svc.id.clone());
                data.service_label = Some(svc.label.clone());
            }
            None => {
                data.service_id = None;
                data.service_label = Some("General".to_string());
            }
        }

        let next = match service {
            Some(svc) if bookable(svc, client) && !data.urgency.is_hot() => ViewId::Booking,
            // No booking URL and no request-form fallback leaves only the
            // phone: show call-us guidance instead of a dead-end form.
            Some(svc) if svc.booking_url.is_none() && !request_form_allowed(svc, client) => {
                ViewId::CallUs
            }
            _ => ViewId::RequestForm,
        };

        let effect = Effect {
            event_name: "service_selected",
            meta: serde_json::json!({
                "service_id": service.map(|s| s.id.as_str()).unwrap_or(""),
                "service_label": data.resolved_service_label(),
            }),
        };
        self.push(next, data);
        Ok(vec![effect])
    }
}

fn bookable(service: &Service, client: &ClientConfig) -> bool {
    service.booking_url.is_some()
        && !service.request_only
        && client.theme.booking_mode != BookingMode::Requests
}

/// Whether this service may fall back to the request form. Instant mode
/// forbids it globally; the per-service flag can opt a single service out.
pub fn request_form_allowed(service: &Service, client: &ClientConfig) -> bool {
    service.request_fallback && client.theme.booking_mode != BookingMode::Instant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientConfig, RawWidgetConfig};

    fn client(json: serde_json::Value) -> ClientConfig {
        let raw: RawWidgetConfig = serde_json::from_value(json).unwrap();
        ClientConfig::from_raw(raw)
    }

    fn haircut_client() -> ClientConfig {
        client(serde_json::json!({
            "ok": true,
            "booking_mode": "both",
            "services": [
                { "id": "haircut", "label": "Haircut", "booking_url": "https://cal.example/haircut" }
            ]
        }))
    }

    fn with_phone(mut json: serde_json::Value) -> serde_json::Value {
        json["business_phone"] = serde_json::json!("555-1212");
        json
    }

    #[test]
    fn starts_at_entry_with_depth_one() {
        let funnel = FunnelState::new();
        assert_eq!(funnel.current().view, ViewId::Entry);
        assert_eq!(funnel.depth(), 1);
    }

    #[test]
    fn week_routes_through_picker_to_booking() {
        // Scenario A up to the booking view.
        let client = haircut_client();
        let mut funnel = FunnelState::new();

        funnel
            .apply(Action::ChooseUrgency(Urgency::Week), &client)
            .unwrap();
        assert_eq!(funnel.current().view, ViewId::ServicePicker);
        assert_eq!(funnel.depth(), 2);

        funnel
            .apply(Action::SelectService("haircut".into()), &client)
            .unwrap();
        assert_eq!(funnel.current().view, ViewId::Booking);
        assert_eq!(funnel.current().data.service_id.as_deref(), Some("haircut"));

        funnel.apply(Action::BookingFallback, &client).unwrap();
        let frame = funnel.current();
        assert_eq!(frame.view, ViewId::RequestForm);
        assert_eq!(frame.data.urgency, Urgency::Week);
        assert_eq!(frame.data.urgency_label, "This week");
        assert!(!frame.data.urgency.is_hot());
        assert_eq!(frame.data.service_id.as_deref(), Some("haircut"));
    }

    #[test]
    fn today_with_phone_shows_interstitial_then_bypasses_booking() {
        // Scenario B: hot urgency overrides the booking URL.
        let client = client(with_phone(serde_json::json!({
            "ok": true,
            "booking_mode": "both",
            "services": [
                { "id": "haircut", "label": "Haircut", "booking_url": "https://cal.example/haircut" }
            ]
        })));
        let mut funnel = FunnelState::new();

        funnel
            .apply(Action::ChooseUrgency(Urgency::Today), &client)
            .unwrap();
        assert_eq!(funnel.current().view, ViewId::HotInterstitial);

        funnel.apply(Action::ContinueOnline, &client).unwrap();
        assert_eq!(funnel.current().view, ViewId::ServicePicker);

        funnel
            .apply(Action::SelectService("haircut".into()), &client)
            .unwrap();
        let frame = funnel.current();
        assert_eq!(frame.view, ViewId::RequestForm);
        assert!(frame.data.urgency.is_hot());
        assert_eq!(frame.data.intent(), "urgent");
    }

    #[test]
    fn today_without_phone_goes_straight_to_request_form() {
        let client = haircut_client();
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Today), &client)
            .unwrap();
        assert_eq!(funnel.current().view, ViewId::RequestForm);
        assert!(funnel.current().data.urgency.is_hot());
    }

    #[test]
    fn quote_bypasses_service_picker() {
        let client = haircut_client();
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Quote), &client)
            .unwrap();
        let frame = funnel.current();
        assert_eq!(frame.view, ViewId::RequestForm);
        assert_eq!(frame.data.urgency_label, "Quote");
        assert_eq!(frame.data.intent(), "request");
    }

    #[test]
    fn unknown_service_degrades_to_general() {
        // Scenario E: stale payload ids never error.
        let client = haircut_client();
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Week), &client)
            .unwrap();
        let effects = funnel
            .apply(Action::SelectService("deleted-service".into()), &client)
            .unwrap();
        let frame = funnel.current();
        assert_eq!(frame.view, ViewId::RequestForm);
        assert_eq!(frame.data.service_id, None);
        assert_eq!(frame.data.resolved_service_label(), "General");
        assert_eq!(effects[0].event_name, "service_selected");
        assert_eq!(effects[0].meta["service_id"], "");
    }

    #[test]
    fn request_only_service_skips_booking() {
        let client = client(serde_json::json!({
            "ok": true,
            "services": [
                { "id": "audit", "label": "Audit", "booking_url": "https://cal.example/a", "request_only": true }
            ]
        }));
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Week), &client)
            .unwrap();
        funnel
            .apply(Action::SelectService("audit".into()), &client)
            .unwrap();
        assert_eq!(funnel.current().view, ViewId::RequestForm);
    }

    #[test]
    fn instant_mode_without_booking_url_shows_call_us() {
        let client = client(serde_json::json!({
            "ok": true,
            "booking_mode": "instant",
            "business_phone": "555-1212",
            "services": [
                { "id": "walkin", "label": "Walk-in", "request_fallback": false }
            ]
        }));
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Week), &client)
            .unwrap();
        funnel
            .apply(Action::SelectService("walkin".into()), &client)
            .unwrap();
        assert_eq!(funnel.current().view, ViewId::CallUs);

        // Back out of the guidance returns to the picker.
        funnel.apply(Action::Back, &client).unwrap();
        assert_eq!(funnel.current().view, ViewId::ServicePicker);
    }

    #[test]
    fn request_fallback_opt_out_without_url_shows_call_us() {
        let client = client(serde_json::json!({
            "ok": true,
            "booking_mode": "both",
            "services": [
                { "id": "walkin", "label": "Walk-in", "request_fallback": false },
                { "id": "consult", "label": "Consult" }
            ]
        }));
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Week), &client)
            .unwrap();
        funnel
            .apply(Action::SelectService("walkin".into()), &client)
            .unwrap();
        assert_eq!(funnel.current().view, ViewId::CallUs);

        // The default keeps the request-form fallback available.
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Week), &client)
            .unwrap();
        funnel
            .apply(Action::SelectService("consult".into()), &client)
            .unwrap();
        assert_eq!(funnel.current().view, ViewId::RequestForm);
    }

    #[test]
    fn requests_only_mode_never_books() {
        let client = client(serde_json::json!({
            "ok": true,
            "booking_mode": "requests",
            "services": [
                { "id": "haircut", "label": "Haircut", "booking_url": "https://cal.example/haircut" }
            ]
        }));
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Week), &client)
            .unwrap();
        funnel
            .apply(Action::SelectService("haircut".into()), &client)
            .unwrap();
        assert_eq!(funnel.current().view, ViewId::RequestForm);
    }

    #[test]
    fn depth_moves_by_one_per_action() {
        let client = haircut_client();
        let mut funnel = FunnelState::new();
        let mut depth = funnel.depth();

        for action in [
            Action::ChooseUrgency(Urgency::Week),
            Action::SelectService("haircut".into()),
            Action::BookingFallback,
        ] {
            funnel.apply(action, &client).unwrap();
            assert_eq!(funnel.depth(), depth + 1);
            depth = funnel.depth();
        }
        for _ in 0..3 {
            funnel.apply(Action::Back, &client).unwrap();
            assert_eq!(funnel.depth(), depth - 1);
            depth = funnel.depth();
        }
        assert_eq!(depth, 1);

        // Back at the entry view is a no-op; the stack never empties.
        funnel.apply(Action::Back, &client).unwrap();
        assert_eq!(funnel.depth(), 1);
        assert_eq!(funnel.current().view, ViewId::Entry);
    }

    #[test]
    fn back_then_reforward_is_idempotent() {
        let client = haircut_client();
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Week), &client)
            .unwrap();
        funnel
            .apply(Action::SelectService("haircut".into()), &client)
            .unwrap();
        let before = funnel.current().clone();

        funnel.apply(Action::Back, &client).unwrap();
        funnel
            .apply(Action::SelectService("haircut".into()), &client)
            .unwrap();
        assert_eq!(funnel.current(), &before);
    }

    #[test]
    fn back_restores_prior_data_snapshot() {
        let client = haircut_client();
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Week), &client)
            .unwrap();
        funnel
            .apply(Action::SelectService("haircut".into()), &client)
            .unwrap();
        assert!(funnel.current().data.service_id.is_some());

        funnel.apply(Action::Back, &client).unwrap();
        // The picker frame predates the selection.
        assert_eq!(funnel.current().data.service_id, None);
    }

    #[test]
    fn close_keeps_state_for_resume() {
        let client = haircut_client();
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Week), &client)
            .unwrap();
        let before = funnel.current().clone();
        let effects = funnel.apply(Action::Close, &client).unwrap();
        assert_eq!(effects[0].event_name, "widget_close");
        assert_eq!(funnel.current(), &before);
        assert_eq!(funnel.depth(), 2);
    }

    #[test]
    fn success_resets_stack_and_start_over_reenters_entry() {
        let client = haircut_client();
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Quote), &client)
            .unwrap();
        funnel.apply(Action::SubmissionSucceeded, &client).unwrap();
        assert_eq!(funnel.current().view, ViewId::Success);
        assert_eq!(funnel.depth(), 1);

        funnel.apply(Action::StartOver, &client).unwrap();
        assert_eq!(funnel.current().view, ViewId::Entry);
        assert_eq!(funnel.current().data, FunnelData::default());
    }

    #[test]
    fn failed_submission_is_not_a_transition() {
        let client = haircut_client();
        let mut funnel = FunnelState::new();
        funnel
            .apply(Action::ChooseUrgency(Urgency::Quote), &client)
            .unwrap();
        let before = funnel.current().clone();
        funnel.apply(Action::SubmissionFailed, &client).unwrap();
        assert_eq!(funnel.current(), &before);
        assert_eq!(funnel.depth(), 2);
    }

    #[test]
    fn dispatch_fails_into_request_form() {
        let client = haircut_client();
        let mut funnel = FunnelState::new();
        // ContinueOnline is meaningless at the entry view.
        let effects = funnel.dispatch(Action::ContinueOnline, &client);
        assert!(effects.is_empty());
        assert_eq!(funnel.current().view, ViewId::RequestForm);
    }

    #[test]
    fn wire_actions_parse() {
        assert_eq!(
            Action::from_wire("urgency", Some("today")),
            Some(Action::ChooseUrgency(Urgency::Today))
        );
        assert_eq!(
            Action::from_wire("select-service", Some("svc_0")),
            Some(Action::SelectService("svc_0".into()))
        );
        assert_eq!(Action::from_wire("urgency", Some("later")), None);
        assert_eq!(Action::from_wire("bogus", None), None);
    }
}
