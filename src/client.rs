use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Whether a service without an explicit `request_fallback` field offers the
/// request-form fallback. Kept as a named constant because client payloads
/// from older backend revisions disagree on the implied default.
pub const REQUEST_FALLBACK_DEFAULT: bool = true;

const DEFAULT_BRAND_COLOR: &str = "#111111";
const DEFAULT_CTA_LABEL: &str = "Get Scheduled";
const DEFAULT_BUSINESS_NAME: &str = "Appointments";

/// Per-client policy constraining how the funnel may end: instant booking,
/// request-form leads, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookingMode {
    #[default]
    Both,
    Instant,
    Requests,
}

impl BookingMode {
    /// Unknown or absent values fall back to `Both`; the payload is not
    /// trusted to carry a clean enum.
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("instant") => BookingMode::Instant,
            Some("requests") | Some("requests-only") => BookingMode::Requests,
            _ => BookingMode::Both,
        }
    }
}

/// Raw `action=config` payload as the backend sends it. Field drift across
/// backend revisions (phone and booking-url spellings) is absorbed here and
/// nowhere else; everything downstream sees the normalized types only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWidgetConfig {
    #[serde(default)]
    pub ok: bool,
    pub brand_primary_color: Option<String>,
    pub primary_cta_label: Option<String>,
    pub brand_button_label: Option<String>,
    pub business_name: Option<String>,
    pub booking_mode: Option<String>,
    #[serde(default)]
    pub services: Vec<RawService>,
    pub business_phone: Option<String>,
    pub phone_number: Option<String>,
    pub phone: Option<String>,
    pub message_label: Option<String>,
    pub booking_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawService {
    pub id: Option<serde_json::Value>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub booking_url: Option<String>,
    #[serde(rename = "bookingUrl")]
    pub booking_url_camel: Option<String>,
    pub calendar_url: Option<String>,
    pub scheduler_url: Option<String>,
    pub url: Option<String>,
    pub request_fallback: Option<bool>,
    pub request_only: Option<bool>,
}

/// One bookable/requestable offering, normalized once at registry
/// construction. Never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub label: String,
    pub description: String,
    pub booking_url: Option<String>,
    /// Offer the request-form fallback for this service.
    pub request_fallback: bool,
    /// Route to the request form even when a booking URL exists.
    pub request_only: bool,
}

/// Theme and policy for one client, immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTheme {
    pub color: String,
    pub cta_label: String,
    pub business: String,
    pub booking_mode: BookingMode,
    pub phone: Option<String>,
    pub message_label: Option<String>,
}

/// Lookup-by-id collection of a client's services, preserving declaration
/// order for rendering.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: Vec<Service>,
    by_id: HashMap<String, usize>,
}

impl ServiceRegistry {
    fn new(services: Vec<Service>) -> Self {
        let by_id = services
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        Self { services, by_id }
    }

    pub fn get(&self, id: &str) -> Option<&Service> {
        self.by_id.get(id).map(|&i| &self.services[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Service> {
        self.services.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Everything the widget knows about one client: theme plus registry.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub theme: ClientTheme,
    pub services: ServiceRegistry,
}

impl ClientConfig {
    pub fn from_raw(raw: RawWidgetConfig) -> Self {
        let phone = first_nonempty([raw.business_phone, raw.phone_number, raw.phone]);
        let cta_label =
            first_nonempty([raw.primary_cta_label, raw.brand_button_label])
                .unwrap_or_else(|| DEFAULT_CTA_LABEL.to_string());
        let default_booking_url = first_nonempty([raw.booking_url]);

        let theme = ClientTheme {
            color: first_nonempty([raw.brand_primary_color])
                .unwrap_or_else(|| DEFAULT_BRAND_COLOR.to_string()),
            cta_label,
            business: first_nonempty([raw.business_name])
                .unwrap_or_else(|| DEFAULT_BUSINESS_NAME.to_string()),
            booking_mode: BookingMode::parse(raw.booking_mode.as_deref()),
            phone,
            message_label: first_nonempty([raw.message_label]),
        };

        let mut seen = HashMap::new();
        let services = raw
            .services
            .into_iter()
            .enumerate()
            .map(|(index, raw)| normalize_service(index, raw, &default_booking_url, &mut seen))
            .collect();

        Self {
            theme,
            services: ServiceRegistry::new(services),
        }
    }
}

fn normalize_service(
    index: usize,
    raw: RawService,
    default_booking_url: &Option<String>,
    seen: &mut HashMap<String, usize>,
) -> Service {
    let id = raw
        .id
        .as_ref()
        .and_then(raw_id_to_string)
        .unwrap_or_else(|| format!("svc_{index}"));
    // Duplicate ids get an index suffix so registry lookups stay unambiguous.
    let id = match seen.entry(id.clone()) {
        std::collections::hash_map::Entry::Vacant(e) => {
            e.insert(index);
            id
        }
        std::collections::hash_map::Entry::Occupied(_) => format!("{id}_{index}"),
    };

    let booking_url = first_nonempty([
        raw.booking_url,
        raw.booking_url_camel,
        raw.calendar_url,
        raw.scheduler_url,
        raw.url,
    ])
    .or_else(|| default_booking_url.clone());

    Service {
        id,
        label: raw.label.unwrap_or_else(|| "Service".to_string()),
        description: raw.description.unwrap_or_default(),
        booking_url,
        request_fallback: raw.request_fallback.unwrap_or(REQUEST_FALLBACK_DEFAULT),
        request_only: raw.request_only.unwrap_or(false),
    }
}

fn raw_id_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_nonempty<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_from_json(json: serde_json::Value) -> RawWidgetConfig {
        serde_json::from_value(json).expect("raw config")
    }

    #[test]
    fn generates_unique_service_ids() {
        let raw = raw_from_json(serde_json::json!({
            "ok": true,
            "services": [
                { "label": "Haircut" },
                { "id": 7, "label": "Color" },
                { "id": "svc_0", "label": "Clash" },
            ]
        }));
        let config = ClientConfig::from_raw(raw);
        let ids: Vec<_> = config.services.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["svc_0", "7", "svc_0_2"]);
        assert_eq!(config.services.get("7").unwrap().label, "Color");
    }

    #[test]
    fn resolves_booking_url_aliases_and_theme_default() {
        let raw = raw_from_json(serde_json::json!({
            "ok": true,
            "booking_url": "https://cal.example/default",
            "services": [
                { "label": "A", "calendar_url": "https://cal.example/a" },
                { "label": "B", "bookingUrl": "https://cal.example/b" },
                { "label": "C" },
            ]
        }));
        let config = ClientConfig::from_raw(raw);
        let urls: Vec<_> = config
            .services
            .iter()
            .map(|s| s.booking_url.as_deref().unwrap())
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://cal.example/a",
                "https://cal.example/b",
                "https://cal.example/default",
            ]
        );
    }

    #[test]
    fn phone_read_from_any_known_field() {
        for field in ["business_phone", "phone_number", "phone"] {
            let raw = raw_from_json(serde_json::json!({ "ok": true, field: " 555-1212 " }));
            let config = ClientConfig::from_raw(raw);
            assert_eq!(config.theme.phone.as_deref(), Some("555-1212"), "{field}");
        }
        let raw = raw_from_json(serde_json::json!({ "ok": true, "business_phone": "  " }));
        assert_eq!(ClientConfig::from_raw(raw).theme.phone, None);
    }

    #[test]
    fn booking_mode_tolerates_junk() {
        assert_eq!(BookingMode::parse(Some("Instant")), BookingMode::Instant);
        assert_eq!(
            BookingMode::parse(Some("requests-only")),
            BookingMode::Requests
        );
        assert_eq!(BookingMode::parse(Some("whatever")), BookingMode::Both);
        assert_eq!(BookingMode::parse(None), BookingMode::Both);
    }

    #[test]
    fn request_fallback_defaults_documented() {
        let raw = raw_from_json(serde_json::json!({
            "ok": true,
            "services": [
                { "label": "A" },
                { "label": "B", "request_fallback": false },
            ]
        }));
        let config = ClientConfig::from_raw(raw);
        let flags: Vec<_> = config.services.iter().map(|s| s.request_fallback).collect();
        assert_eq!(flags, vec![REQUEST_FALLBACK_DEFAULT, false]);
    }

    #[test]
    fn cta_label_falls_back_through_button_label() {
        let raw = raw_from_json(serde_json::json!({
            "ok": true,
            "brand_button_label": "Book Now"
        }));
        assert_eq!(ClientConfig::from_raw(raw).theme.cta_label, "Book Now");
        let raw = raw_from_json(serde_json::json!({ "ok": true }));
        assert_eq!(ClientConfig::from_raw(raw).theme.cta_label, "Get Scheduled");
    }
}
