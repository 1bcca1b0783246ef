//! Collector configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetcher::RetryPolicy;
use crate::{DorkError, EngineKind, Result};

/// Configuration for a collection run, passed to the collector at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Directory for downloaded documents and other run output.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Path of the persisted link store (JSON). Defaults to
    /// `collected_links.json` inside `output_dir`.
    #[serde(default)]
    pub link_file: PathBuf,
    /// Maximum result pages per engine.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Pause between result pages.
    #[serde(default)]
    pub slow_search: bool,
    /// Courtesy delay in milliseconds when `slow_search` is on.
    #[serde(default = "default_slow_delay_ms")]
    pub slow_delay_ms: u64,
    /// Maximum engine tasks running at once.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Attempts to trigger the next-page control.
    #[serde(default = "default_page_retry_attempts")]
    pub page_retry_attempts: u32,
    /// Pause between next-page attempts in milliseconds.
    #[serde(default = "default_page_retry_backoff_ms")]
    pub page_retry_backoff_ms: u64,
    /// Per-URL navigation timeout for downloads, in seconds.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// Overall collection deadline in seconds. No deadline when unset.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
    /// Engines to collect from.
    #[serde(default = "default_engines")]
    pub engines: Vec<EngineKind>,
    /// Run the browser without a window.
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Chrome/Chromium executable. Auto-detected when unset.
    #[serde(default)]
    pub chrome_path: Option<String>,
    /// File listing example dorks, one per line.
    #[serde(default = "default_dorks_file")]
    pub dorks_file: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("data/dorking_output")
}

const LINK_FILE_NAME: &str = "collected_links.json";

fn default_link_path() -> PathBuf {
    default_output_dir().join(LINK_FILE_NAME)
}

fn default_max_pages() -> u32 {
    100
}

fn default_slow_delay_ms() -> u64 {
    2000
}

fn default_concurrency_limit() -> usize {
    4
}

fn default_page_retry_attempts() -> u32 {
    3
}

fn default_page_retry_backoff_ms() -> u64 {
    1000
}

fn default_download_timeout_secs() -> u64 {
    60
}

fn default_engines() -> Vec<EngineKind> {
    EngineKind::ALL.to_vec()
}

fn default_headless() -> bool {
    true
}

fn default_dorks_file() -> PathBuf {
    PathBuf::from("dorks.txt")
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            link_file: default_link_path(),
            max_pages: default_max_pages(),
            slow_search: false,
            slow_delay_ms: default_slow_delay_ms(),
            concurrency_limit: default_concurrency_limit(),
            page_retry_attempts: default_page_retry_attempts(),
            page_retry_backoff_ms: default_page_retry_backoff_ms(),
            download_timeout_secs: default_download_timeout_secs(),
            deadline_secs: None,
            engines: default_engines(),
            headless: default_headless(),
            chrome_path: None,
            dorks_file: default_dorks_file(),
        }
    }
}

impl CollectorConfig {
    /// Loads a configuration from a JSON file. Missing fields take defaults;
    /// a missing `link_file` is placed inside the configured `output_dir`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DorkError::Config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let mut config: Self = serde_json::from_str(&raw).map_err(|e| {
            DorkError::Config(format!("Malformed config {}: {}", path.display(), e))
        })?;
        if config.link_file.as_os_str().is_empty() {
            config.link_file = config.default_link_file();
        }
        Ok(config)
    }

    /// `collected_links.json` inside `output_dir`.
    pub fn default_link_file(&self) -> PathBuf {
        self.output_dir.join(LINK_FILE_NAME)
    }

    /// Rejects settings that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.max_pages == 0 {
            return Err(DorkError::Config("max_pages must be at least 1".into()));
        }
        if self.concurrency_limit == 0 {
            return Err(DorkError::Config(
                "concurrency_limit must be at least 1".into(),
            ));
        }
        if self.page_retry_attempts == 0 {
            return Err(DorkError::Config(
                "page_retry_attempts must be at least 1".into(),
            ));
        }
        if self.engines.is_empty() {
            return Err(DorkError::Config("no search engines configured".into()));
        }
        if self.link_file.as_os_str().is_empty() {
            return Err(DorkError::Config("link_file cannot be empty".into()));
        }
        Ok(())
    }

    /// Creates the output directory and the link file's parent directory.
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        if let Some(parent) = self.link_file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Retry policy for next-page advancing.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.page_retry_attempts,
            backoff: Duration::from_millis(self.page_retry_backoff_ms),
        }
    }

    /// Courtesy delay between pages, if slow search is enabled.
    pub fn courtesy_delay(&self) -> Option<Duration> {
        self.slow_search
            .then(|| Duration::from_millis(self.slow_delay_ms))
    }

    /// Per-URL download navigation timeout.
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Overall collection deadline.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}
