//! Browser session layer on top of chromiumoxide (CDP). One shared Chrome
//! process per run; each campground scan gets its own browser context so
//! cookies and storage never leak between scans.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    /// Remote Chrome DevTools URL (e.g. "ws://localhost:9222"). When set,
    /// attaches to an existing browser instead of launching one.
    pub remote_url: Option<String>,
    pub chrome_args: Vec<String>,
}

pub struct BrowserHandle {
    browser: Arc<Mutex<Browser>>,
    handler: JoinHandle<()>,
}

impl BrowserHandle {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    pub async fn launch(options: &BrowserOptions) -> Result<Self> {
        if let Some(ref remote_url) = options.remote_url {
            return Self::connect_remote(remote_url).await;
        }

        info!("Launching browser (headless={})", options.headless);

        let chrome_path = Self::find_chrome()?;
        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);

        // with_head means NOT headless, confusingly
        if !options.headless {
            builder = builder.with_head();
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--no-sandbox") // Often needed for headless in containers/restricted environments
            .arg("--disable-gpu");

        for arg in &options.chrome_args {
            builder = builder.arg(arg);
        }

        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        Ok(Self::wrap(browser, handler))
    }

    /// Connect to a remote Chrome instance via its DevTools endpoint.
    async fn connect_remote(url: &str) -> Result<Self> {
        info!("Connecting to remote browser at {}", url);

        let http_url = url.replace("ws://", "http://").replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let client = reqwest::Client::new();
        let resp: serde_json::Value = client
            .get(&version_url)
            .send()
            .await
            .context("Failed to connect to remote browser")?
            .json()
            .await
            .context("Failed to parse browser version info")?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No webSocketDebuggerUrl in response"))?;

        let (browser, handler) = Browser::connect(ws_url)
            .await
            .context("Failed to connect to remote browser")?;

        Ok(Self::wrap(browser, handler))
    }

    fn wrap(browser: Browser, mut handler: chromiumoxide::Handler) -> Self {
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Self {
            browser: Arc::new(Mutex::new(browser)),
            handler,
        }
    }

    fn find_chrome() -> Result<PathBuf> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                debug!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        debug!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(anyhow::anyhow!(
            "Chrome/Chromium not found. Install it or point --remote-url at a running instance"
        ))
    }

    /// Open a page inside a dedicated browser context with its own cookie
    /// jar. Returns the context id so the caller can dispose it.
    pub async fn new_scan_page(
        &self,
        user_agent: &str,
    ) -> Result<(Page, Option<BrowserContextId>)> {
        let browser = self.browser.lock().await;

        let context_id = match browser
            .execute(CreateBrowserContextParams::builder().build())
            .await
        {
            Ok(resp) => Some(resp.result.browser_context_id),
            // Some remote endpoints refuse extra contexts; fall back to a
            // plain tab rather than failing the scan.
            Err(e) => {
                debug!("Could not create isolated browser context: {}", e);
                None
            }
        };

        let mut target = CreateTargetParams::builder().url("about:blank");
        if let Some(ref id) = context_id {
            target = target.browser_context_id(id.clone());
        }
        let target = target
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build target params: {}", e))?;

        let page = browser
            .new_page(target)
            .await
            .context("Failed to open page")?;
        page.execute(SetUserAgentOverrideParams::new(user_agent.to_string()))
            .await
            .context("Failed to override user agent")?;

        Ok((page, context_id))
    }

    /// Tear down a scan's page and context. Best effort; errors are logged
    /// and swallowed so teardown can run on every scan exit path.
    pub async fn dispose_scan_page(&self, page: Page, context_id: Option<BrowserContextId>) {
        if let Err(e) = page.close().await {
            debug!("Failed to close page: {}", e);
        }
        if let Some(id) = context_id {
            let browser = self.browser.lock().await;
            if let Err(e) = browser.execute(DisposeBrowserContextParams::new(id)).await {
                debug!("Failed to dispose browser context: {}", e);
            }
        }
    }

    pub async fn shutdown(&self) {
        let mut browser = self.browser.lock().await;
        if let Err(e) = browser.close().await {
            debug!("Browser close failed: {}", e);
        }
        self.handler.abort();
    }
}
