//! Turns raw candidates from either extraction source into canonical
//! availability records. The only hard requirement is a recoverable site
//! identifier; every other missing or unparsable field degrades to a
//! null/unknown value instead of rejecting the candidate.

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::models::{AvailabilityRecord, RawCandidate, Status};
use crate::parsers::{clean_text, map_status, parse_date, parse_price, ParsedDate};
use crate::platform::PlatformProfile;

pub struct Normalizer<'a> {
    profile: &'a PlatformProfile,
    campground: &'a str,
    reference_year: i32,
}

impl<'a> Normalizer<'a> {
    pub fn new(profile: &'a PlatformProfile, campground: &'a str, reference_year: i32) -> Self {
        Self {
            profile,
            campground,
            reference_year,
        }
    }

    pub fn normalize(&self, candidate: RawCandidate) -> Option<AvailabilityRecord> {
        let site = candidate
            .site
            .as_deref()
            .map(clean_text)
            .filter(|s| !s.is_empty());
        let Some(site) = site else {
            debug!("Dropping candidate without a site identifier: {}", candidate.raw);
            return None;
        };

        let arrival = candidate
            .arrival
            .as_deref()
            .and_then(|text| parse_date(&self.profile.date_formats, text, self.reference_year));
        let departure = candidate
            .departure
            .as_deref()
            .and_then(|text| parse_date(&self.profile.date_formats, text, self.reference_year));
        let (arrival, departure) = reconcile_dates(arrival, departure);

        let (price, currency) = match candidate.price.as_deref().and_then(|text| {
            parse_price(
                &self.profile.currency_symbols,
                &self.profile.default_currency,
                text,
            )
        }) {
            Some((amount, code)) => (Some(amount), Some(code)),
            None => (None, None),
        };

        let status = candidate
            .status
            .as_deref()
            .map(|text| map_status(&self.profile.status_vocabulary, text))
            .unwrap_or(Status::Unknown);

        Some(AvailabilityRecord {
            campground: self.campground.to_string(),
            site,
            arrival,
            departure,
            price,
            currency,
            status,
            raw_text: candidate.raw,
            origin: candidate.origin,
            seq: candidate.seq,
        })
    }
}

/// Keep arrival <= departure when both parsed. A yearless departure that
/// lands before arrival rolls into the next year (stays spanning a year
/// boundary); an explicit-year departure before arrival is discarded.
fn reconcile_dates(
    arrival: Option<ParsedDate>,
    departure: Option<ParsedDate>,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match (arrival, departure) {
        (Some(arr), Some(dep)) if dep.date < arr.date => {
            if dep.explicit_year {
                (Some(arr.date), None)
            } else {
                (Some(arr.date), dep.date.with_year(dep.date.year() + 1))
            }
        }
        (arr, dep) => (arr.map(|d| d.date), dep.map(|d| d.date)),
    }
}
