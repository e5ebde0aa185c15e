use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which extraction source produced a signal. Structured network data is
/// considered more trustworthy than rendered text when records tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Network,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Available,
    Unavailable,
    Unknown,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Available => write!(f, "available"),
            Status::Unavailable => write!(f, "unavailable"),
            Status::Unknown => write!(f, "unknown"),
        }
    }
}

/// An unvalidated availability signal pulled from one source during a scan.
/// Lives only until normalization.
#[derive(Debug, Clone)]
pub struct RawCandidate {
    pub origin: Origin,
    pub site: Option<String>,
    pub arrival: Option<String>,
    pub departure: Option<String>,
    pub price: Option<String>,
    pub status: Option<String>,
    /// Original text or payload fragment, kept for audit.
    pub raw: String,
    /// Per-scan arrival sequence, used as the merge tie-breaker.
    pub seq: u64,
}

/// Canonical availability row. The campground name always comes from the
/// driving entry, never from scraped content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
    pub campground: String,
    pub site: String,
    pub arrival: Option<NaiveDate>,
    pub departure: Option<NaiveDate>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub status: Status,
    pub raw_text: String,
    pub origin: Origin,
    pub seq: u64,
}

/// Identity of one logical availability row across sources and rounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MergeKey {
    pub campground: String,
    pub site: String,
    pub arrival: Option<NaiveDate>,
    pub departure: Option<NaiveDate>,
}

impl AvailabilityRecord {
    pub fn merge_key(&self) -> MergeKey {
        MergeKey {
            campground: self.campground.clone(),
            site: self.site.clone(),
            arrival: self.arrival,
            departure: self.departure,
        }
    }

    /// Number of populated optional fields; higher wins during merge.
    pub fn completeness(&self) -> usize {
        let mut score = 0;
        if self.arrival.is_some() {
            score += 1;
        }
        if self.departure.is_some() {
            score += 1;
        }
        if self.price.is_some() {
            score += 1;
        }
        if self.status != Status::Unknown {
            score += 1;
        }
        score
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Complete,
    Partial,
    Failed,
}

/// Outcome of scanning one campground entry.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub campground: String,
    pub records: Vec<AvailabilityRecord>,
    pub status: ScanStatus,
    /// Raw candidates seen before normalization and dedup.
    pub raw_candidates: usize,
    pub scanned_at: DateTime<Utc>,
}

impl ScanResult {
    pub fn failed(campground: &str, scanned_at: DateTime<Utc>) -> Self {
        Self {
            campground: campground.to_string(),
            records: Vec::new(),
            status: ScanStatus::Failed,
            raw_candidates: 0,
            scanned_at,
        }
    }
}
