//! Drives one browser session per campground: navigate with search
//! parameters applied, wait for the page to settle, then run interaction
//! rounds that drain both extraction sources and fold the results into the
//! running record set. Only session-level failures escape; everything else
//! degrades into the returned `ScanResult`.

mod browser;
mod interceptor;
mod page_text;

pub use browser::{BrowserHandle, BrowserOptions};

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chromiumoxide::Page;
use chrono::{Datelike, Utc};
use regex::Regex;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::merge::merge;
use crate::models::{CampgroundEntry, ScanResult, ScanStatus, SearchParameters};
use crate::normalize::Normalizer;
use crate::platform::{self, PlatformProfile};
use interceptor::ResponseInterceptor;

/// The only error surfaced to the multi-campground runner. Anything less
/// severe is folded into the scan result instead.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser launch failed: {0}")]
    Launch(anyhow::Error),
    #[error("browser context setup failed: {0}")]
    Context(anyhow::Error),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: anyhow::Error },
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub timeout: Duration,
    pub max_rounds: u32,
    pub settle: Duration,
    pub user_agent: String,
}

/// Waits for the document without assuming the page ever finishes loading.
const READY_STATE_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

const PAGE_TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";

enum ScanFailure {
    Session(SessionError),
    Internal(anyhow::Error),
}

#[derive(Default)]
struct ScanState {
    records: Vec<crate::models::AvailabilityRecord>,
    raw_seen: usize,
}

pub struct Scanner {
    browser: BrowserHandle,
    profile: Arc<PlatformProfile>,
    row_pattern: Regex,
    options: ScanOptions,
}

impl Scanner {
    pub async fn new(
        browser_options: &BrowserOptions,
        profile: PlatformProfile,
        options: ScanOptions,
    ) -> Result<Self, SessionError> {
        let row_pattern = profile.row_regex().map_err(SessionError::Launch)?;
        let browser = BrowserHandle::launch(browser_options)
            .await
            .map_err(SessionError::Launch)?;
        Ok(Self {
            browser,
            profile: Arc::new(profile),
            row_pattern,
            options,
        })
    }

    /// Scan one campground. Always tears the page and its context down, on
    /// success, failure and timeout alike. A timeout returns the records
    /// merged so far with `Partial` status.
    pub async fn scan(
        &self,
        entry: &CampgroundEntry,
        params: &SearchParameters,
    ) -> Result<ScanResult, SessionError> {
        let scanned_at = Utc::now();
        info!("Scanning {}", entry.name);

        let (page, context_id) = self
            .browser
            .new_scan_page(&self.options.user_agent)
            .await
            .map_err(SessionError::Context)?;

        let state = Arc::new(Mutex::new(ScanState::default()));
        let outcome = timeout(
            self.options.timeout,
            self.run(entry, params, &page, state.clone()),
        )
        .await;

        self.browser.dispose_scan_page(page, context_id).await;

        let state = std::mem::take(&mut *state.lock().await);
        match outcome {
            Ok(Ok(())) => {
                info!(
                    "{}: kept {} of {} raw candidates",
                    entry.name,
                    state.records.len(),
                    state.raw_seen
                );
                Ok(ScanResult {
                    campground: entry.name.clone(),
                    records: state.records,
                    status: ScanStatus::Complete,
                    raw_candidates: state.raw_seen,
                    scanned_at,
                })
            }
            Ok(Err(ScanFailure::Session(err))) => Err(err),
            Ok(Err(ScanFailure::Internal(err))) => {
                warn!("Scan of {} failed mid-extraction: {}", entry.name, err);
                Ok(ScanResult::failed(&entry.name, scanned_at))
            }
            Err(_) => {
                warn!(
                    "Scan of {} timed out, returning {} records collected so far",
                    entry.name,
                    state.records.len()
                );
                Ok(ScanResult {
                    campground: entry.name.clone(),
                    records: state.records,
                    status: ScanStatus::Partial,
                    raw_candidates: state.raw_seen,
                    scanned_at,
                })
            }
        }
    }

    async fn run(
        &self,
        entry: &CampgroundEntry,
        params: &SearchParameters,
        page: &Page,
        state: Arc<Mutex<ScanState>>,
    ) -> Result<(), ScanFailure> {
        let seq = Arc::new(AtomicU64::new(0));
        let interceptor = ResponseInterceptor::attach(page, self.profile.clone(), seq.clone())
            .await
            .map_err(ScanFailure::Internal)?;

        let url = platform::build_search_url(&entry.url, &self.profile.query, params);
        debug!("Navigating to {}", url);
        if let Err(e) = page.goto(url.as_str()).await {
            interceptor.detach();
            return Err(ScanFailure::Session(SessionError::Navigation {
                url: url.to_string(),
                reason: e.into(),
            }));
        }
        self.wait_for_ready(page).await;

        let normalizer = Normalizer::new(self.profile.as_ref(), &entry.name, params.arrival.year());
        let mut rounds = 0;
        loop {
            sleep(self.options.settle).await;

            let mut candidates = interceptor.drain().await;
            match self.page_text(page).await {
                Ok(text) => {
                    candidates.extend(page_text::extract(&text, &self.row_pattern, &seq));
                }
                Err(e) => debug!("Could not read rendered text: {}", e),
            }

            let grew = {
                let mut state = state.lock().await;
                state.raw_seen += candidates.len();
                let fresh: Vec<_> = candidates
                    .into_iter()
                    .filter_map(|candidate| normalizer.normalize(candidate))
                    .collect();
                let before = state.records.len();
                state.records = merge(std::mem::take(&mut state.records), fresh);
                state.records.len() > before
            };

            rounds += 1;
            if rounds >= self.options.max_rounds {
                debug!("Reached max interaction rounds for {}", entry.name);
                break;
            }
            if !grew {
                break;
            }
            if !self.trigger_load_more(page).await {
                break;
            }
        }

        interceptor.detach();
        Ok(())
    }

    async fn wait_for_ready(&self, page: &Page) {
        let wait = timeout(
            Duration::from_secs(12),
            page.evaluate(READY_STATE_SCRIPT.to_string()),
        )
        .await;
        match wait {
            Ok(Ok(result)) => {
                let ready_state: String = result.into_value().unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", ready_state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }
    }

    async fn page_text(&self, page: &Page) -> Result<String> {
        let evaluated = page.evaluate(PAGE_TEXT_SCRIPT).await?;
        Ok(evaluated.into_value().unwrap_or_default())
    }

    /// Try the platform's pagination affordances. Returns whether anything
    /// was clicked; absence of an affordance ends the interaction loop.
    async fn trigger_load_more(&self, page: &Page) -> bool {
        for selector in &self.profile.load_more_selectors {
            let Ok(element) = page.find_element(selector.as_str()).await else {
                continue;
            };
            match element.click().await {
                Ok(_) => {
                    debug!("Triggered load-more affordance `{}`", selector);
                    return true;
                }
                Err(e) => debug!("Click on `{}` failed: {}", selector, e),
            }
        }
        false
    }

    pub async fn shutdown(&self) {
        self.browser.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Origin, Status};
    use crate::scanner::{interceptor::collect_candidates, page_text::extract};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Both sources report the same logical row; the pipeline must fold them
    /// into a single record, preferring the structured signal.
    #[test]
    fn network_and_text_signals_reconcile_to_one_record() {
        let profile = PlatformProfile::default();
        let seq = AtomicU64::new(0);

        let payload = json!({
            "units": [{
                "unitName": "Site B7",
                "status": "Reserved",
                "startDate": "2026-07-10",
                "endDate": "2026-07-12",
                "price": "$45.00",
            }]
        });
        let mut candidates = collect_candidates(&payload, &profile, &seq);

        let rendered = "Campground results\nSite B7 2026-07-10 - 2026-07-12 $45.00 Reserved\n";
        candidates.extend(extract(rendered, &profile.row_regex().unwrap(), &seq));
        assert_eq!(candidates.len(), 2);

        let normalizer = Normalizer::new(&profile, "Algonquin", 2026);
        let records: Vec<_> = candidates
            .into_iter()
            .filter_map(|candidate| normalizer.normalize(candidate))
            .collect();
        let merged = merge(Vec::new(), records);

        assert_eq!(merged.len(), 1);
        let record = &merged[0];
        assert_eq!(record.campground, "Algonquin");
        assert_eq!(record.site, "Site B7");
        assert_eq!(record.price, Some(45.0));
        assert_eq!(record.currency.as_deref(), Some("CAD"));
        assert_eq!(record.status, Status::Unavailable);
        assert_eq!(record.origin, Origin::Network);
    }
}
