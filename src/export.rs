//! Flat CSV rendering of scan results. Fixed column order, RFC-4180-style
//! quoting. Sorting is deliberately left to the consumer.

use std::io::{self, Write};

use crate::models::ScanResult;

pub const COLUMNS: [&str; 8] = [
    "campground",
    "site",
    "arrival",
    "departure",
    "price",
    "currency",
    "status",
    "raw_text",
];

/// Flatten results into export rows, keeping scan order.
pub fn rows(results: &[ScanResult]) -> Vec<Vec<String>> {
    results
        .iter()
        .flat_map(|result| {
            result.records.iter().map(|record| {
                vec![
                    record.campground.clone(),
                    record.site.clone(),
                    record
                        .arrival
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                    record
                        .departure
                        .map(|d| d.format("%Y-%m-%d").to_string())
                        .unwrap_or_default(),
                    record
                        .price
                        .map(|amount| format!("{amount:.2}"))
                        .unwrap_or_default(),
                    record.currency.clone().unwrap_or_default(),
                    record.status.to_string(),
                    record.raw_text.clone(),
                ]
            })
        })
        .collect()
}

pub fn write_csv<W: Write>(mut writer: W, rows: &[Vec<String>]) -> io::Result<()> {
    let header: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    write_row(&mut writer, &header)?;
    for row in rows {
        write_row(&mut writer, row)?;
    }
    Ok(())
}

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn write_row<W: Write>(writer: &mut W, row: &[String]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(writer, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            let escaped = cell.replace('"', "\"\"");
            write!(writer, "\"{}\"", escaped)?;
        } else {
            write!(writer, "{}", cell)?;
        }
    }
    writeln!(writer)
}
