use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::platform::PlatformProfile;
use crate::scanner::{BrowserOptions, ScanOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scan: ScanSettings,
    pub browser: BrowserSettings,
    pub platform: PlatformProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Per-campground time limit; expiry degrades to a partial result.
    pub timeout_secs: u64,
    pub max_rounds: u32,
    /// Pause after navigation and after each interaction, letting network
    /// activity settle before candidates are drained.
    pub settle_ms: u64,
    /// Concurrent campground scans. Kept low to avoid tripping the
    /// platform's anti-automation defenses.
    pub concurrency: usize,
    pub user_agent: String,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 45,
            max_rounds: 4,
            settle_ms: 1500,
            concurrency: 2,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub remote_url: Option<String>,
    pub chrome_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            remote_url: None,
            chrome_args: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanSettings::default(),
            browser: BrowserSettings::default(),
            platform: PlatformProfile::default(),
        }
    }
}

impl Config {
    /// Layer an optional config file and `CAMPSCAN_*` environment variables
    /// over the built-in defaults. With no file present the defaults target
    /// the currently observed platform layout.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let builder = match path {
            Some(path) => config::Config::builder()
                .add_source(config::File::from(path.to_path_buf())),
            None => config::Config::builder()
                .add_source(config::File::with_name("campscan").required(false)),
        };
        let settings = builder
            .add_source(config::Environment::with_prefix("CAMPSCAN").separator("__"))
            .build()
            .context("Failed to read configuration")?;
        settings
            .try_deserialize()
            .context("Invalid configuration values")
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            timeout: Duration::from_secs(self.scan.timeout_secs),
            max_rounds: self.scan.max_rounds.max(1),
            settle: Duration::from_millis(self.scan.settle_ms),
            user_agent: self.scan.user_agent.clone(),
        }
    }

    pub fn browser_options(&self) -> BrowserOptions {
        BrowserOptions {
            headless: self.browser.headless,
            remote_url: self.browser.remote_url.clone(),
            chrome_args: self.browser.chrome_args.clone(),
        }
    }
}
