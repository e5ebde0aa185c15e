use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use futures::stream::{self, StreamExt};
use tracing::{error, info};

mod config;
mod export;
mod merge;
mod models;
mod normalize;
mod parsers;
mod platform;
mod scanner;

use crate::config::Config;
use crate::models::{parse_entries, CampgroundEntry, ScanResult, ScanStatus, SearchParameters};
use crate::scanner::{Scanner, SessionError};

/// Scan campground reservation search pages for availability and export the
/// results as CSV rows.
#[derive(Debug, Parser)]
#[command(name = "campscan", version, about)]
struct Args {
    /// Arrival date (YYYY-MM-DD)
    #[arg(long)]
    arrival: NaiveDate,

    /// Departure date (YYYY-MM-DD)
    #[arg(long)]
    departure: NaiveDate,

    #[arg(long, default_value_t = 2)]
    party_size: u32,

    /// Equipment ID as seen in the platform's search URL
    #[arg(long, default_value = "-32768")]
    equipment_id: String,

    /// Sub-equipment ID as seen in the platform's search URL
    #[arg(long, default_value = "-32765")]
    sub_equipment_id: String,

    /// File with one `Name | URL` campground entry per line, `-` for stdin
    #[arg(long, default_value = "campgrounds.txt")]
    campgrounds: String,

    /// Output CSV path; prints to stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// Configuration file overriding scan options and the platform profile
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long)]
    max_rounds: Option<u32>,

    #[arg(long)]
    concurrency: Option<usize>,

    /// Run the browser with a visible window
    #[arg(long)]
    headed: bool,

    /// Attach to a running Chrome DevTools endpoint instead of launching
    #[arg(long)]
    remote_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("campscan=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(timeout_secs) = args.timeout_secs {
        config.scan.timeout_secs = timeout_secs;
    }
    if let Some(max_rounds) = args.max_rounds {
        config.scan.max_rounds = max_rounds;
    }
    if let Some(concurrency) = args.concurrency {
        config.scan.concurrency = concurrency;
    }
    if args.headed {
        config.browser.headless = false;
    }
    if args.remote_url.is_some() {
        config.browser.remote_url = args.remote_url.clone();
    }

    let params = SearchParameters::new(
        args.arrival,
        args.departure,
        args.party_size,
        args.equipment_id.clone(),
        args.sub_equipment_id.clone(),
    )?;

    let input = if args.campgrounds == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read campground list from stdin")?;
        buffer
    } else {
        fs::read_to_string(&args.campgrounds)
            .with_context(|| format!("Failed to read campground list {}", args.campgrounds))?
    };
    let entries = parse_entries(&input);
    if entries.is_empty() {
        anyhow::bail!("No valid `Name | URL` campground entries provided");
    }

    info!(
        "Scanning {} campgrounds, {} nights from {}",
        entries.len(),
        params.nights(),
        params.arrival
    );

    let scanner = Arc::new(
        Scanner::new(
            &config.browser_options(),
            config.platform.clone(),
            config.scan_options(),
        )
        .await?,
    );

    let concurrency = config.scan.concurrency.max(1);
    let results: Vec<(CampgroundEntry, Result<ScanResult, SessionError>)> =
        stream::iter(entries.into_iter().map(|entry| {
            let scanner = scanner.clone();
            let params = params.clone();
            async move {
                let result = scanner.scan(&entry, &params).await;
                (entry, result)
            }
        }))
        .buffered(concurrency)
        .collect()
        .await;

    scanner.shutdown().await;

    let kept = select_results(results);
    let rows = export::rows(&kept);

    match args.output {
        Some(path) => {
            let file = fs::File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            export::write_csv(io::BufWriter::new(file), &rows)?;
            info!("Wrote {} rows to {}", rows.len(), path.display());
        }
        None => {
            export::write_csv(io::stdout().lock(), &rows)?;
        }
    }

    Ok(())
}

/// Keep results in entry order, skipping session failures. When the same
/// entry appears more than once, the last successful scan wins.
fn select_results(
    results: Vec<(CampgroundEntry, Result<ScanResult, SessionError>)>,
) -> Vec<ScanResult> {
    let mut kept: Vec<ScanResult> = Vec::new();
    let mut positions: std::collections::HashMap<(String, String), usize> =
        std::collections::HashMap::new();

    for (entry, outcome) in results {
        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                error!("Scan failed for {}: {}", entry.name, err);
                continue;
            }
        };
        match result.status {
            ScanStatus::Failed => info!("{}: scan failed", result.campground),
            _ if result.records.is_empty() => {
                info!("{}: no availability found", result.campground)
            }
            _ => info!(
                "{}: {} availability records",
                result.campground,
                result.records.len()
            ),
        }

        let key = (entry.name.clone(), entry.url.to_string());
        match positions.get(&key) {
            Some(&position) => {
                if result.status != ScanStatus::Failed {
                    kept[position] = result;
                }
            }
            None => {
                positions.insert(key, kept.len());
                kept.push(result);
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use url::Url;

    fn entry(name: &str) -> CampgroundEntry {
        CampgroundEntry {
            name: name.to_string(),
            url: Url::parse("https://reservations.example.ca/results?id=1").unwrap(),
        }
    }

    fn result(name: &str, status: ScanStatus, raw: usize) -> ScanResult {
        ScanResult {
            campground: name.to_string(),
            records: Vec::new(),
            status,
            raw_candidates: raw,
            scanned_at: Utc::now(),
        }
    }

    #[test]
    fn session_failures_are_excluded_without_halting_others() {
        let results = vec![
            (
                entry("Algonquin"),
                Err(SessionError::Launch(anyhow::anyhow!("no chrome"))),
            ),
            (entry("Killbear"), Ok(result("Killbear", ScanStatus::Complete, 3))),
        ];
        let kept = select_results(results);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].campground, "Killbear");
    }

    #[test]
    fn last_successful_scan_of_same_entry_wins() {
        let results = vec![
            (entry("Algonquin"), Ok(result("Algonquin", ScanStatus::Complete, 1))),
            (entry("Killbear"), Ok(result("Killbear", ScanStatus::Complete, 0))),
            (entry("Algonquin"), Ok(result("Algonquin", ScanStatus::Partial, 9))),
        ];
        let kept = select_results(results);
        assert_eq!(kept.len(), 2);
        // Replacement keeps the original position.
        assert_eq!(kept[0].campground, "Algonquin");
        assert_eq!(kept[0].raw_candidates, 9);
        assert_eq!(kept[1].campground, "Killbear");
    }

    #[test]
    fn failed_rescan_does_not_clobber_earlier_success() {
        let results = vec![
            (entry("Algonquin"), Ok(result("Algonquin", ScanStatus::Complete, 5))),
            (entry("Algonquin"), Ok(result("Algonquin", ScanStatus::Failed, 0))),
        ];
        let kept = select_results(results);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].raw_candidates, 5);
        assert_eq!(kept[0].status, ScanStatus::Complete);
    }
}
