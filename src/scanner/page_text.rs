//! Fallback extraction from the rendered page text. Applies the platform's
//! row pattern to `document.body.innerText`, ignoring whatever navigation
//! and header noise surrounds the result rows. Zero matches is a normal
//! outcome (fully booked pages often render no rows at all).

use std::sync::atomic::{AtomicU64, Ordering};

use regex::Regex;

use crate::models::{Origin, RawCandidate};

pub fn extract(text: &str, row_pattern: &Regex, seq: &AtomicU64) -> Vec<RawCandidate> {
    let mut candidates = Vec::new();
    for caps in row_pattern.captures_iter(text) {
        let group = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let raw = caps
            .get(0)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        candidates.push(RawCandidate {
            origin: Origin::Text,
            site: group("site"),
            arrival: group("arr"),
            departure: group("dep"),
            price: group("price"),
            status: group("status"),
            raw,
            seq: seq.fetch_add(1, Ordering::Relaxed),
        });
    }
    candidates
}
