//! Everything specific to the reservation platform lives here as data:
//! query parameter names, data-endpoint URL tokens, JSON field names, the
//! rendered-text row pattern, date formats, and the status vocabulary.
//! When the upstream page structure drifts, this profile is what changes,
//! not the extraction logic. All of it can be overridden from the config
//! layer.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::{SearchParameters, Status};

/// Query parameter names the platform's results endpoint understands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryParams {
    pub start_date: String,
    pub end_date: String,
    pub party_size: String,
    pub equipment_id: String,
    pub sub_equipment_id: String,
    pub nights: String,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            start_date: "startDate".to_string(),
            end_date: "endDate".to_string(),
            party_size: "partySize".to_string(),
            equipment_id: "equipmentId".to_string(),
            sub_equipment_id: "subEquipmentId".to_string(),
            nights: "nights".to_string(),
        }
    }
}

/// One entry of the status vocabulary. Tokens are matched in table order
/// against lowercased status text, so negative phrases must come before the
/// positives they contain ("not available" before "available").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRule {
    pub token: String,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyRule {
    pub symbol: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformProfile {
    /// Query parameter names the platform's results endpoint understands.
    pub query: QueryParams,
    /// URL substrings identifying background availability-data responses.
    pub data_endpoint_tokens: Vec<String>,
    /// JSON field names carrying a site label, in precedence order.
    pub site_keys: Vec<String>,
    pub status_keys: Vec<String>,
    pub arrival_keys: Vec<String>,
    pub departure_keys: Vec<String>,
    pub price_keys: Vec<String>,
    /// Row pattern applied to rendered page text. Overrides must keep the
    /// named groups `site`, `arr`, `dep`, `price` and `status`.
    pub row_pattern: String,
    /// Accepted date formats in chrono syntax; formats without `%Y` are
    /// resolved against the scan's arrival year.
    pub date_formats: Vec<String>,
    pub status_vocabulary: Vec<StatusRule>,
    /// Currency symbols in match order, longest prefixes first.
    pub currency_symbols: Vec<CurrencyRule>,
    pub default_currency: String,
    /// CSS selectors tried for a "show more / next page" affordance.
    pub load_more_selectors: Vec<String>,
}

impl Default for PlatformProfile {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            query: QueryParams::default(),
            data_endpoint_tokens: strings(&["avail", "camp", "inventory", "site", "unit"]),
            site_keys: strings(&["unitName", "siteName", "site", "name"]),
            status_keys: strings(&["status", "availability", "available", "isAvailable"]),
            arrival_keys: strings(&["startDate", "arrivalDate", "arrival", "checkIn"]),
            departure_keys: strings(&["endDate", "departureDate", "departure", "checkOut"]),
            price_keys: strings(&["price", "totalPrice", "amount", "rate", "cost"]),
            row_pattern: concat!(
                r"(?im)(?P<site>site\s*\w[^\n]{0,40}?)\s+",
                r"(?:(?P<arr>\d{4}-\d{2}-\d{2}|[a-z]{3,9}\.?\s+\d{1,2})\s*(?:-|–|—|to)\s*",
                r"(?P<dep>\d{4}-\d{2}-\d{2}|[a-z]{3,9}\.?\s+\d{1,2})\s+)?",
                r"(?:(?P<price>(?:ca\$|c\$|us\$|\$|€)\s*\d[\d,.]*)\s+)?",
                r"(?P<status>available|sold\s*out|not\s+available|unavailable|reserved|booked)"
            )
            .to_string(),
            date_formats: strings(&["%Y-%m-%d", "%b %d, %Y", "%m/%d/%Y", "%b %d", "%B %d"]),
            status_vocabulary: vec![
                rule("sold out", Status::Unavailable),
                rule("not available", Status::Unavailable),
                rule("unavailable", Status::Unavailable),
                rule("reserved", Status::Unavailable),
                rule("booked", Status::Unavailable),
                rule("closed", Status::Unavailable),
                rule("full", Status::Unavailable),
                rule("false", Status::Unavailable),
                rule("available", Status::Available),
                rule("open", Status::Available),
                rule("true", Status::Available),
            ],
            currency_symbols: vec![
                currency("CA$", "CAD"),
                currency("C$", "CAD"),
                currency("US$", "USD"),
                currency("$", "CAD"),
                currency("€", "EUR"),
            ],
            default_currency: "CAD".to_string(),
            load_more_selectors: strings(&[
                "button.load-more",
                "button[aria-label*='more']",
                "a[rel='next']",
                "li.pagination-next a",
            ]),
        }
    }
}

fn rule(token: &str, status: Status) -> StatusRule {
    StatusRule {
        token: token.to_string(),
        status,
    }
}

fn currency(symbol: &str, code: &str) -> CurrencyRule {
    CurrencyRule {
        symbol: symbol.to_string(),
        code: code.to_string(),
    }
}

impl PlatformProfile {
    /// Whether a response URL looks like the platform's availability data
    /// endpoint.
    pub fn is_data_endpoint(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.data_endpoint_tokens
            .iter()
            .any(|token| url.contains(token.as_str()))
    }

    pub fn row_regex(&self) -> Result<Regex> {
        Regex::new(&self.row_pattern).context("invalid rendered-text row pattern")
    }
}

/// Merge search parameters into an entry URL. Managed keys already present in
/// the URL are replaced, so merging again across interaction rounds never
/// duplicates a parameter.
pub fn build_search_url(base: &Url, query: &QueryParams, params: &SearchParameters) -> Url {
    let managed = [
        query.start_date.as_str(),
        query.end_date.as_str(),
        query.party_size.as_str(),
        query.equipment_id.as_str(),
        query.sub_equipment_id.as_str(),
        query.nights.as_str(),
    ];
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| !managed.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut url = base.clone();
    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        pairs
            .append_pair(&query.start_date, &params.arrival.format("%Y-%m-%d").to_string())
            .append_pair(&query.end_date, &params.departure.format("%Y-%m-%d").to_string())
            .append_pair(&query.party_size, &params.party_size.to_string())
            .append_pair(&query.equipment_id, &params.equipment_id)
            .append_pair(&query.sub_equipment_id, &params.sub_equipment_id)
            .append_pair(&query.nights, &params.nights().to_string());
    }
    url
}
