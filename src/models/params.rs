use chrono::NaiveDate;
use thiserror::Error;
use tracing::warn;
use url::Url;

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("departure date must be after arrival date")]
    DateOrder,
    #[error("party size must be at least 1")]
    PartySize,
}

/// Search settings shared by every campground in a run. Built once from user
/// input and read-only afterwards.
#[derive(Debug, Clone)]
pub struct SearchParameters {
    pub arrival: NaiveDate,
    pub departure: NaiveDate,
    pub party_size: u32,
    pub equipment_id: String,
    pub sub_equipment_id: String,
}

impl SearchParameters {
    pub fn new(
        arrival: NaiveDate,
        departure: NaiveDate,
        party_size: u32,
        equipment_id: String,
        sub_equipment_id: String,
    ) -> Result<Self, ParamsError> {
        if departure <= arrival {
            return Err(ParamsError::DateOrder);
        }
        if party_size == 0 {
            return Err(ParamsError::PartySize);
        }
        Ok(Self {
            arrival,
            departure,
            party_size,
            equipment_id,
            sub_equipment_id,
        })
    }

    pub fn nights(&self) -> i64 {
        (self.departure - self.arrival).num_days()
    }
}

/// One named target search page. List order is scan order.
#[derive(Debug, Clone, PartialEq)]
pub struct CampgroundEntry {
    pub name: String,
    pub url: Url,
}

/// Parse a newline-delimited `Name | URL` campground list. The split happens
/// on the first unescaped `|` (`\|` keeps a literal pipe in the name); blank
/// lines are ignored and unusable lines are skipped with a warning.
pub fn parse_entries(input: &str) -> Vec<CampgroundEntry> {
    let mut entries = Vec::new();
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, rest)) = split_unescaped_pipe(line) else {
            warn!("Skipping campground line without a `|` separator: {}", line);
            continue;
        };
        let name = name.trim();
        let rest = rest.trim();
        if name.is_empty() || rest.is_empty() {
            warn!("Skipping campground line with empty name or URL: {}", line);
            continue;
        }
        match Url::parse(rest) {
            Ok(url) => entries.push(CampgroundEntry {
                name: name.to_string(),
                url,
            }),
            Err(e) => warn!("Skipping campground `{}` with invalid URL: {}", name, e),
        }
    }
    entries
}

/// Split on the first `|` not preceded by a backslash, unescaping `\|` in the
/// left-hand side.
fn split_unescaped_pipe(line: &str) -> Option<(String, &str)> {
    let mut name = String::new();
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if escaped {
            name.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '|' {
            return Some((name, &line[idx + ch.len_utf8()..]));
        } else {
            name.push(ch);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parameters_reject_inverted_dates() {
        let err = SearchParameters::new(
            date(2026, 7, 12),
            date(2026, 7, 10),
            2,
            "-32768".into(),
            "-32765".into(),
        )
        .unwrap_err();
        assert_eq!(err, ParamsError::DateOrder);
    }

    #[test]
    fn parameters_reject_zero_party() {
        let err = SearchParameters::new(
            date(2026, 7, 10),
            date(2026, 7, 12),
            0,
            "-32768".into(),
            "-32765".into(),
        )
        .unwrap_err();
        assert_eq!(err, ParamsError::PartySize);
    }

    #[test]
    fn nights_derived_from_dates() {
        let params = SearchParameters::new(
            date(2026, 7, 10),
            date(2026, 7, 12),
            4,
            "-32768".into(),
            "-32765".into(),
        )
        .unwrap();
        assert_eq!(params.nights(), 2);
    }

    #[test]
    fn parse_entries_basic_list() {
        let input = "\
            Algonquin - Lake of Two Rivers | https://reservations.example.ca/results?resourceLocationId=-2147482628\n\
            \n\
            Killbear | https://reservations.example.ca/results?resourceLocationId=-2147482518\n";
        let entries = parse_entries(input);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "Algonquin - Lake of Two Rivers");
        assert_eq!(entries[1].name, "Killbear");
    }

    #[test]
    fn parse_entries_honors_escaped_pipe() {
        let input = r"Silent Lake \| North Loop | https://reservations.example.ca/results?id=1";
        let entries = parse_entries(input);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Silent Lake | North Loop");
    }

    #[test]
    fn parse_entries_skips_garbage() {
        let input = "no separator here\nName | not a url\n | https://reservations.example.ca/x\n";
        assert_eq!(parse_entries(input), Vec::new());
    }
}
