use chrono::NaiveDate;

/// A parsed calendar date plus whether the source text carried its own year.
/// Yearless dates are resolved against the scan's arrival year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub date: NaiveDate,
    pub explicit_year: bool,
}

/// Try each format in order. Formats without `%Y` get the reference year
/// appended before parsing. Returns `None` when nothing matches; callers
/// degrade to a null date rather than dropping the record.
pub fn parse_date(formats: &[String], text: &str, reference_year: i32) -> Option<ParsedDate> {
    let cleaned = text.replace('.', "");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return None;
    }
    for format in formats {
        let explicit_year = format.contains("%Y") || format.contains("%y");
        let parsed = if explicit_year {
            NaiveDate::parse_from_str(&cleaned, format)
        } else {
            NaiveDate::parse_from_str(
                &format!("{cleaned} {reference_year}"),
                &format!("{format} %Y"),
            )
        };
        if let Ok(date) = parsed {
            return Some(ParsedDate {
                date,
                explicit_year,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn formats() -> Vec<String> {
        crate::platform::PlatformProfile::default().date_formats
    }

    #[test]
    fn parses_iso_dates() {
        let parsed = parse_date(&formats(), "2026-07-10", 2020).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2026, 7, 10).unwrap());
        assert!(parsed.explicit_year);
    }

    #[test]
    fn parses_month_day_with_reference_year() {
        let parsed = parse_date(&formats(), "Jul 4", 2026).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2026, 7, 4).unwrap());
        assert!(!parsed.explicit_year);
    }

    #[test]
    fn parses_abbreviated_month_with_period() {
        let parsed = parse_date(&formats(), "Jul. 4", 2026).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2026, 7, 4).unwrap());
    }

    #[test]
    fn parses_full_month_name() {
        let parsed = parse_date(&formats(), "July 4", 2026).unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2026, 7, 4).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_date(&formats(), "next Tuesday-ish", 2026), None);
        assert_eq!(parse_date(&formats(), "", 2026), None);
    }
}
