//! Captures background data responses while a results page loads. The CDP
//! listener runs on its own task and appends parsed candidates to a private
//! buffer; the orchestrator drains the buffer between interaction rounds, so
//! a response arriving mid-round is picked up by the next drain instead of
//! being lost to a race.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventResponseReceived, GetResponseBodyParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::models::{Origin, RawCandidate};
use crate::platform::PlatformProfile;

const MAX_RAW_CHARS: usize = 400;

pub struct ResponseInterceptor {
    buffer: Arc<Mutex<Vec<RawCandidate>>>,
    task: JoinHandle<()>,
}

impl ResponseInterceptor {
    /// Register against a live page. Must be called before navigation so the
    /// first wave of data responses is not missed.
    pub async fn attach(
        page: &Page,
        profile: Arc<PlatformProfile>,
        seq: Arc<AtomicU64>,
    ) -> Result<Self> {
        page.execute(EnableParams::builder().build())
            .await
            .context("Failed to enable network events")?;
        let mut events = page
            .event_listener::<EventResponseReceived>()
            .await
            .context("Failed to register response listener")?;

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let sink = buffer.clone();
        let page = page.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                let url = event.response.url.clone();
                if !profile.is_data_endpoint(&url) {
                    continue;
                }
                if !event.response.mime_type.to_lowercase().contains("json") {
                    continue;
                }
                let body = match page
                    .execute(GetResponseBodyParams::new(event.request_id.clone()))
                    .await
                {
                    Ok(body) => body,
                    Err(e) => {
                        debug!("Response body unavailable for {}: {}", url, e);
                        continue;
                    }
                };
                let text = if body.result.base64_encoded {
                    match STANDARD.decode(body.result.body.as_bytes()) {
                        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                        Err(_) => continue,
                    }
                } else {
                    body.result.body.clone()
                };
                let payload: Value = match serde_json::from_str(&text) {
                    Ok(payload) => payload,
                    Err(e) => {
                        debug!("Dropping non-JSON data response from {}: {}", url, e);
                        continue;
                    }
                };
                let found = collect_candidates(&payload, &profile, &seq);
                if !found.is_empty() {
                    debug!("Captured {} candidates from {}", found.len(), url);
                    sink.lock().await.extend(found);
                }
            }
        });

        Ok(Self { buffer, task })
    }

    /// Take everything buffered so far.
    pub async fn drain(&self) -> Vec<RawCandidate> {
        std::mem::take(&mut *self.buffer.lock().await)
    }

    pub fn detach(self) {
        self.task.abort();
    }
}

/// Deep-walk a JSON payload for objects that look like availability rows:
/// anything carrying both a site label and a status under the platform's
/// known field names. Shape varies between endpoints, so this is heuristic
/// by design of the payloads, not of this crate.
pub fn collect_candidates(
    payload: &Value,
    profile: &PlatformProfile,
    seq: &AtomicU64,
) -> Vec<RawCandidate> {
    let mut objects = Vec::new();
    walk(payload, &mut objects);

    let mut candidates = Vec::new();
    for object in objects {
        let site = field(object, &profile.site_keys).and_then(scalar_text);
        let status = field(object, &profile.status_keys).and_then(scalar_text);
        let (Some(site), Some(status)) = (site, status) else {
            continue;
        };
        let raw = truncate_chars(Value::Object(object.clone()).to_string(), MAX_RAW_CHARS);
        candidates.push(RawCandidate {
            origin: Origin::Network,
            site: Some(site),
            arrival: field(object, &profile.arrival_keys).and_then(scalar_text),
            departure: field(object, &profile.departure_keys).and_then(scalar_text),
            price: field(object, &profile.price_keys).and_then(scalar_text),
            status: Some(status),
            raw,
            seq: seq.fetch_add(1, Ordering::Relaxed),
        });
    }
    candidates
}

fn walk<'v>(value: &'v Value, out: &mut Vec<&'v serde_json::Map<String, Value>>) {
    match value {
        Value::Object(map) => {
            out.push(map);
            for nested in map.values() {
                walk(nested, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, out);
            }
        }
        _ => {}
    }
}

/// Case-insensitive field lookup honoring key precedence order.
fn field<'m>(
    object: &'m serde_json::Map<String, Value>,
    keys: &[String],
) -> Option<&'m Value> {
    keys.iter().find_map(|key| {
        object
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value)
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn truncate_chars(mut text: String, max: usize) -> String {
    if let Some((index, _)) = text.char_indices().nth(max) {
        text.truncate(index);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn collect(payload: Value) -> Vec<RawCandidate> {
        let profile = PlatformProfile::default();
        let seq = AtomicU64::new(0);
        collect_candidates(&payload, &profile, &seq)
    }

    #[test]
    fn finds_availability_shapes_in_nested_payload() {
        let payload = json!({
            "units": [
                {"unitName": "Site 101", "available": true, "loop": "A"},
                {"siteName": "Site 202", "status": "Sold Out", "loop": "B"},
            ]
        });
        let candidates = collect(payload);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].site.as_deref(), Some("Site 101"));
        assert_eq!(candidates[0].status.as_deref(), Some("true"));
        assert_eq!(candidates[1].status.as_deref(), Some("Sold Out"));
        assert_eq!(candidates[0].seq, 0);
        assert_eq!(candidates[1].seq, 1);
    }

    #[test]
    fn captures_dates_and_price_when_present() {
        let payload = json!({
            "results": [{
                "site": "B7",
                "isAvailable": false,
                "startDate": "2026-07-10",
                "endDate": "2026-07-12",
                "price": 45.0,
            }]
        });
        let candidates = collect(payload);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].arrival.as_deref(), Some("2026-07-10"));
        assert_eq!(candidates[0].departure.as_deref(), Some("2026-07-12"));
        assert_eq!(candidates[0].price.as_deref(), Some("45.0"));
    }

    #[test]
    fn ignores_objects_without_site_and_status() {
        let payload = json!({
            "meta": {"page": 1, "total": 30},
            "filters": {"equipment": "tent"},
        });
        assert_eq!(collect(payload).len(), 0);
    }

    #[test]
    fn truncates_raw_payload_fragment() {
        let long_note = "x".repeat(2000);
        let payload = json!([{"name": "Site 1", "status": "Available", "note": long_note}]);
        let candidates = collect(payload);
        assert_eq!(candidates[0].raw.chars().count(), MAX_RAW_CHARS);
    }
}
