//! Chrome-backed browser sessions.
//!
//! This module is only available when the `headless` Cargo feature is enabled.
//! [`BrowserPool`] implements [`SessionFactory`]: every session launches its
//! own Chrome process with a throwaway profile, so engine tasks never share
//! cookies, tabs or crash fate. A semaphore caps the number of live browsers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::{OnceCell, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::fetcher::{BrowserSession, SessionFactory, WaitStrategy};
use crate::{CollectorConfig, DorkError, Result};

/// Budget for the liveness probe.
const ALIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a click may take to trigger a navigation.
const CLICK_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Configuration for the browser pool.
#[derive(Debug, Clone)]
pub struct BrowserPoolConfig {
    /// Maximum number of browsers alive at once.
    pub max_sessions: usize,
    /// Whether to run the browser without a window.
    pub headless: bool,
    /// Path to the Chrome/Chromium executable. If `None`, auto-detected.
    pub chrome_path: Option<String>,
    /// Additional launch arguments for Chrome.
    pub launch_args: Vec<String>,
    /// Wait applied after each navigation.
    pub wait: WaitStrategy,
}

impl Default for BrowserPoolConfig {
    fn default() -> Self {
        Self {
            max_sessions: 4,
            headless: true,
            chrome_path: None,
            launch_args: Vec::new(),
            wait: WaitStrategy::Delay { ms: 1000 },
        }
    }
}

impl BrowserPoolConfig {
    /// Derives pool settings from a collector configuration.
    pub fn from_collector(config: &CollectorConfig) -> Self {
        Self {
            max_sessions: config.concurrency_limit,
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            ..Default::default()
        }
    }

    fn launch_config(&self, chrome: &Path, profile: &Path) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome)
            .user_data_dir(profile);

        builder = if self.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };

        // Chrome puts "HeadlessChrome" into its default user agent.
        builder = builder
            .arg(format!("--user-agent={}", USER_AGENT))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-sync")
            .arg("--mute-audio")
            .arg("--no-first-run");

        for arg in &self.launch_args {
            builder = builder.arg(arg);
        }

        builder
            .build()
            .map_err(|e| DorkError::Browser(format!("Invalid browser config: {}", e)))
    }
}

/// Opens Chrome sessions, at most `max_sessions` at a time.
pub struct BrowserPool {
    config: BrowserPoolConfig,
    permits: Arc<Semaphore>,
    chrome: OnceCell<PathBuf>,
}

impl BrowserPool {
    /// Creates a pool. Chrome is located lazily on the first session.
    pub fn new(config: BrowserPoolConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_sessions.max(1)));
        Self {
            config,
            permits,
            chrome: OnceCell::new(),
        }
    }

    /// Returns the pool configuration.
    pub fn config(&self) -> &BrowserPoolConfig {
        &self.config
    }

    /// Number of sessions that can still be opened without waiting.
    pub fn available_sessions(&self) -> usize {
        self.permits.available_permits()
    }

    async fn chrome_executable(&self) -> Result<&PathBuf> {
        self.chrome
            .get_or_try_init(|| async {
                match &self.config.chrome_path {
                    Some(path) => Ok(PathBuf::from(path)),
                    None => crate::chrome::ensure_chrome().await,
                }
            })
            .await
    }
}

#[async_trait]
impl SessionFactory for BrowserPool {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| DorkError::Browser(format!("Browser pool closed: {}", e)))?;

        let chrome = self.chrome_executable().await?;
        let profile = tempfile::Builder::new().prefix("a3s-dork-").tempdir()?;
        let launch = self.config.launch_config(chrome, profile.path())?;

        let (browser, mut handler) = Browser::launch(launch)
            .await
            .map_err(|e| DorkError::Browser(format!("Failed to launch browser: {}", e)))?;
        debug!("Launched Chrome with profile {}", profile.path().display());

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser CDP handler error: {}", e);
                }
            }
            debug!("Browser CDP handler exited");
        });

        let mut session = ChromeSession {
            browser: Some(browser),
            page: None,
            handler: Some(handler),
            profile: Some(profile),
            wait: self.config.wait.clone(),
            _permit: Some(permit),
        };
        if let Err(e) = session.reset().await {
            let _ = session.close().await;
            return Err(e);
        }
        Ok(Box::new(session))
    }
}

/// A Chrome process with one active tab.
///
/// Dropping the session without `close()` still kills the browser process.
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    profile: Option<TempDir>,
    wait: WaitStrategy,
    _permit: Option<OwnedSemaphorePermit>,
}

impl ChromeSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| DorkError::Browser("Browser session is closed".into()))
    }

    fn handler_exited(&self) -> bool {
        self.handler.as_ref().map_or(true, |h| h.is_finished())
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| DorkError::Browser(format!("Navigation to {} failed: {}", url, e)))?;

        match &self.wait {
            WaitStrategy::Load => {}
            WaitStrategy::Delay { ms } => {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            }
        }
        Ok(())
    }

    async fn content(&mut self) -> Result<String> {
        self.page()?
            .content()
            .await
            .map_err(|e| DorkError::Browser(format!("Failed to get page content: {}", e)))
    }

    async fn is_alive(&mut self) -> bool {
        if self.handler_exited() {
            return false;
        }
        let Ok(page) = self.page() else {
            return false;
        };
        matches!(
            tokio::time::timeout(ALIVE_TIMEOUT, page.evaluate("document.title")).await,
            Ok(Ok(_))
        )
    }

    async fn click(&mut self, selector: &str) -> Result<bool> {
        let page = self.page()?;
        let Ok(element) = page.find_element(selector).await else {
            return Ok(false);
        };
        element
            .click()
            .await
            .map_err(|e| DorkError::Browser(format!("Click on '{}' failed: {}", selector, e)))?;

        // In-page controls ("More results") never navigate.
        let _ = tokio::time::timeout(CLICK_NAVIGATION_TIMEOUT, page.wait_for_navigation()).await;
        Ok(true)
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value> {
        let result = self
            .page()?
            .evaluate(script)
            .await
            .map_err(|e| DorkError::Browser(format!("Script evaluation failed: {}", e)))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn reset(&mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Failed to close tab: {}", e);
            }
        }
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| DorkError::Browser("Browser session is closed".into()))?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DorkError::Browser(format!("Failed to open tab: {}", e)))?;
        self.page = Some(page);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.page = None;
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Browser process did not exit cleanly: {}", e);
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        self.profile = None;
        self._permit = None;
        Ok(())
    }
}
