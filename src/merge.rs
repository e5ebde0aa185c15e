//! Key-based merge of availability records across extraction sources and
//! interaction rounds. Pure function over record sequences: each source
//! appends to its own buffer and the orchestrator folds buffers through here
//! on its own schedule, so no locking is needed around the running set.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::models::{AvailabilityRecord, Origin, Status};

/// Fold `incoming` into `existing`. Records sharing a merge key are the same
/// logical row: the more complete one wins, ties go to the later arrival
/// with network origin beating text origin. First-seen key order is
/// preserved; sorting is an export-time concern.
pub fn merge(
    existing: Vec<AvailabilityRecord>,
    incoming: Vec<AvailabilityRecord>,
) -> Vec<AvailabilityRecord> {
    let mut records = existing;
    let mut index: HashMap<_, usize> = records
        .iter()
        .enumerate()
        .map(|(position, record)| (record.merge_key(), position))
        .collect();

    for record in incoming {
        match index.entry(record.merge_key()) {
            Entry::Occupied(slot) => {
                let position = *slot.get();
                let current = records[position].clone();
                records[position] = fold(current, record);
            }
            Entry::Vacant(slot) => {
                slot.insert(records.len());
                records.push(record);
            }
        }
    }
    records
}

/// Combine two records with the same key. The winner keeps its fields and
/// fills any gaps from the loser.
fn fold(current: AvailabilityRecord, candidate: AvailabilityRecord) -> AvailabilityRecord {
    let candidate_wins = match candidate.completeness().cmp(&current.completeness()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            !(candidate.origin == Origin::Text && current.origin == Origin::Network)
        }
    };
    let (mut winner, loser) = if candidate_wins {
        (candidate, current)
    } else {
        (current, candidate)
    };

    if winner.price.is_none() {
        winner.price = loser.price;
        winner.currency = loser.currency;
    }
    if winner.status == Status::Unknown {
        winner.status = loser.status;
    }
    if winner.raw_text.is_empty() {
        winner.raw_text = loser.raw_text;
    }
    winner
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn record(site: &str, origin: Origin, seq: u64) -> AvailabilityRecord {
        AvailabilityRecord {
            campground: "Algonquin".to_string(),
            site: site.to_string(),
            arrival: NaiveDate::from_ymd_opt(2026, 7, 10),
            departure: NaiveDate::from_ymd_opt(2026, 7, 12),
            price: None,
            currency: None,
            status: Status::Available,
            raw_text: format!("{site} row"),
            origin,
            seq,
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let records = vec![record("A1", Origin::Network, 0), record("B2", Origin::Text, 1)];
        let merged = merge(records.clone(), records.clone());
        assert_eq!(merged, records);
    }

    #[test]
    fn distinct_keys_keep_first_seen_order() {
        let merged = merge(
            vec![record("B2", Origin::Text, 0)],
            vec![record("A1", Origin::Text, 1), record("C3", Origin::Text, 2)],
        );
        let sites: Vec<_> = merged.iter().map(|r| r.site.as_str()).collect();
        assert_eq!(sites, vec!["B2", "A1", "C3"]);
    }

    #[test]
    fn more_complete_record_wins() {
        let sparse = record("A1", Origin::Network, 0);
        let mut rich = record("A1", Origin::Text, 1);
        rich.price = Some(45.0);
        rich.currency = Some("CAD".to_string());

        let merged = merge(vec![sparse], vec![rich.clone()]);
        assert_eq!(merged, vec![rich]);
    }

    #[test]
    fn network_beats_text_on_completeness_tie() {
        let text = record("A1", Origin::Text, 5);
        let network = record("A1", Origin::Network, 1);

        // Commutative for differing origins when completeness ties.
        let merged_a = merge(vec![text.clone()], vec![network.clone()]);
        let merged_b = merge(vec![network.clone()], vec![text.clone()]);
        assert_eq!(merged_a[0].origin, Origin::Network);
        assert_eq!(merged_b[0].origin, Origin::Network);
    }

    #[test]
    fn winner_fills_gaps_from_loser() {
        let mut priced = record("A1", Origin::Text, 0);
        priced.price = Some(45.0);
        priced.currency = Some("CAD".to_string());
        priced.status = Status::Unknown;
        priced.arrival = None;

        let with_status = record("A1", Origin::Network, 1);
        let mut with_status = with_status;
        with_status.arrival = None;

        let merged = merge(vec![priced], vec![with_status]);
        assert_eq!(merged.len(), 1);
        // Network record won the completeness tie but inherited the price.
        assert_eq!(merged[0].origin, Origin::Network);
        assert_eq!(merged[0].price, Some(45.0));
        assert_eq!(merged[0].status, Status::Available);
    }
}
