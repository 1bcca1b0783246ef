//! Rendered-page snapshots of collected links.
//!
//! The batch runs through one reused browser session, one URL at a time. A
//! URL that fails or times out is logged and counted; the batch continues.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::fetcher::{BrowserSession, SessionFactory};
use crate::{CollectorConfig, DorkError, LinkStore, Result};

/// Longest file name most filesystems accept, in bytes.
pub const MAX_FILENAME_BYTES: usize = 255;

const SNAPSHOT_EXTENSION: &str = ".html";

/// Characters that are unsafe in file names on at least one platform.
fn is_reserved(c: char) -> bool {
    matches!(
        c,
        '/' | '\\' | '?' | '&' | ':' | '*' | '"' | '<' | '>' | '|' | '#'
    ) || c.is_control()
}

/// Derives a snapshot file name from a URL.
///
/// The scheme is dropped, reserved characters become `_`, and the result is
/// cut on a character boundary so that it fits [`MAX_FILENAME_BYTES`]
/// including the `.html` extension.
pub fn sanitize_filename(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    safe_file_name(without_scheme, SNAPSHOT_EXTENSION)
}

/// Makes `raw` usable as a file name ending in `suffix`.
pub(crate) fn safe_file_name(raw: &str, suffix: &str) -> String {
    let mut name: String = raw
        .trim()
        .chars()
        .map(|c| if is_reserved(c) { '_' } else { c })
        .collect();

    let limit = MAX_FILENAME_BYTES.saturating_sub(suffix.len());
    if name.len() > limit {
        let mut cut = limit;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    if name.is_empty() || name.chars().all(|c| c == '.') {
        name = "index".to_string();
    }

    name.push_str(suffix);
    name
}

/// One URL and the file its rendered page goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub destination: PathBuf,
}

impl DownloadTask {
    /// Places the snapshot of `url` under `output_dir`.
    pub fn new(url: impl Into<String>, output_dir: &Path) -> Self {
        let url = url.into();
        let destination = output_dir.join(sanitize_filename(&url));
        Self { url, destination }
    }
}

/// Outcome of a download batch.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DownloadReport {
    /// Files written, in batch order.
    pub saved: Vec<PathBuf>,
    /// URLs that could not be saved, with the reason.
    pub failed: Vec<(String, String)>,
    /// URLs whose file name was already used earlier in the batch.
    pub collisions: usize,
}

impl DownloadReport {
    /// Number of URLs attempted.
    pub fn attempted(&self) -> usize {
        self.saved.len() + self.failed.len()
    }
}

/// Saves the rendered HTML of each URL into an output directory.
pub struct DocumentDownloader {
    factory: Arc<dyn SessionFactory>,
    output_dir: PathBuf,
    timeout: Duration,
}

impl DocumentDownloader {
    pub fn new(
        factory: Arc<dyn SessionFactory>,
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            factory,
            output_dir: output_dir.into(),
            timeout,
        }
    }

    /// Uses the configured output directory and download timeout.
    pub fn from_config(config: &CollectorConfig, factory: Arc<dyn SessionFactory>) -> Self {
        Self::new(factory, &config.output_dir, config.download_timeout())
    }

    /// Downloads every URL in order.
    ///
    /// Fails only when the output directory cannot be created or no browser
    /// session can be opened.
    pub async fn download_all(&self, urls: &[String]) -> Result<DownloadReport> {
        let mut report = DownloadReport::default();
        if urls.is_empty() {
            return Ok(report);
        }
        std::fs::create_dir_all(&self.output_dir)?;

        let mut session = self.factory.open_session().await?;
        let mut claimed: HashMap<PathBuf, &str> = HashMap::new();

        for (index, url) in urls.iter().enumerate() {
            let task = DownloadTask::new(url.as_str(), &self.output_dir);
            if let Some(previous) = claimed.insert(task.destination.clone(), url.as_str()) {
                warn!(
                    "{} and {} share the file name {}, overwriting",
                    previous,
                    url,
                    task.destination.display()
                );
                report.collisions += 1;
            }

            info!("[{}/{}] Downloading {}", index + 1, urls.len(), url);
            match self.download_one(session.as_mut(), &task).await {
                Ok(()) => {
                    debug!("Saved {}", task.destination.display());
                    report.saved.push(task.destination);
                }
                Err(e) => {
                    warn!("Failed to download {}: {}", url, e);
                    report.failed.push((task.url, e.to_string()));
                }
            }
        }

        if let Err(e) = session.close().await {
            debug!("Download session close failed: {}", e);
        }

        info!(
            "Downloaded {} of {} pages to {}",
            report.saved.len(),
            report.attempted(),
            self.output_dir.display()
        );
        Ok(report)
    }

    /// Downloads every link already stored in `link_file`. No search runs.
    ///
    /// The output directory is created up front, so an unusable output path
    /// fails even when the store is empty.
    pub async fn download_stored(&self, link_file: &Path) -> Result<DownloadReport> {
        std::fs::create_dir_all(&self.output_dir)?;
        let store = LinkStore::load(link_file);
        let urls: Vec<String> = store.links().keys().cloned().collect();
        info!(
            "Downloading {} stored links from {}",
            urls.len(),
            link_file.display()
        );
        self.download_all(&urls).await
    }

    async fn download_one(
        &self,
        session: &mut dyn BrowserSession,
        task: &DownloadTask,
    ) -> Result<()> {
        session.reset().await?;
        tokio::time::timeout(self.timeout, session.navigate(&task.url))
            .await
            .map_err(|_| {
                DorkError::Timeout(format!("{} did not load within {:?}", task.url, self.timeout))
            })??;
        let html = session.content().await?;
        tokio::fs::write(&task.destination, html).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn test_sanitize_filename_query_string() {
        let name = sanitize_filename("https://example.com/a?b=c&d=e");
        assert_eq!(name, "example.com_a_b=c_d=e.html");
        assert!(!name.contains(['/', '?', '&']));
        assert!(name.len() <= MAX_FILENAME_BYTES);
    }

    #[test]
    fn test_sanitize_filename_reserved_characters() {
        let name = sanitize_filename("http://h/p\\q:r*s\"t<u>v|w#x\ty");
        assert_eq!(name, "h_p_q_r_s_t_u_v_w_x_y.html");
    }

    #[test]
    fn test_sanitize_filename_truncates_long_urls() {
        let url = format!("https://example.com/{}", "a".repeat(1000));
        let name = sanitize_filename(&url);
        assert_eq!(name.len(), MAX_FILENAME_BYTES);
        assert!(name.ends_with(".html"));
    }

    #[test]
    fn test_sanitize_filename_truncates_on_char_boundary() {
        let url = format!("https://example.com/{}", "é".repeat(300));
        let name = sanitize_filename(&url);
        assert!(name.len() <= MAX_FILENAME_BYTES);
        assert!(name.ends_with(".html"));
    }

    #[test]
    fn test_sanitize_filename_degenerate() {
        assert_eq!(sanitize_filename("https://"), "index.html");
        assert_eq!(sanitize_filename(".."), "index.html");
        assert_eq!(sanitize_filename("example.com"), "example.com.html");
    }

    #[test]
    fn test_download_task_destination() {
        let task = DownloadTask::new("https://acme.com/x", Path::new("/tmp/out"));
        assert_eq!(task.destination, PathBuf::from("/tmp/out/acme.com_x.html"));
    }

    #[derive(Default)]
    struct Log {
        navigations: Vec<String>,
        resets: usize,
        closes: usize,
    }

    struct FakeSession {
        log: Arc<Mutex<Log>>,
        current: String,
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            self.log.lock().unwrap().navigations.push(url.to_string());
            if url.contains("broken") {
                return Err(DorkError::Browser("net::ERR_CONNECTION_REFUSED".into()));
            }
            if url.contains("slow") {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            self.current = url.to_string();
            Ok(())
        }

        async fn content(&mut self) -> Result<String> {
            Ok(format!("<html>{}</html>", self.current))
        }

        async fn is_alive(&mut self) -> bool {
            true
        }

        async fn click(&mut self, _selector: &str) -> Result<bool> {
            Ok(false)
        }

        async fn evaluate(&mut self, _script: &str) -> Result<Value> {
            Ok(Value::Null)
        }

        async fn reset(&mut self) -> Result<()> {
            self.log.lock().unwrap().resets += 1;
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.log.lock().unwrap().closes += 1;
            Ok(())
        }
    }

    struct FakeFactory {
        log: Arc<Mutex<Log>>,
        opened: AtomicUsize,
    }

    impl FakeFactory {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                log: Arc::new(Mutex::new(Log::default())),
                opened: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SessionFactory for FakeFactory {
        async fn open_session(&self) -> Result<Box<dyn BrowserSession>> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                log: Arc::clone(&self.log),
                current: String::new(),
            }))
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_download_all_reuses_one_session() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory::new();
        let downloader =
            DocumentDownloader::new(factory.clone(), dir.path(), Duration::from_secs(5));

        let report = downloader
            .download_all(&urls(&["https://a.com/1", "https://a.com/2"]))
            .await
            .unwrap();

        assert_eq!(report.saved.len(), 2);
        assert!(report.failed.is_empty());
        assert_eq!(factory.opened.load(Ordering::SeqCst), 1);
        let log = factory.log.lock().unwrap();
        assert_eq!(log.resets, 2);
        assert_eq!(log.closes, 1);

        let saved = std::fs::read_to_string(dir.path().join("a.com_1.html")).unwrap();
        assert_eq!(saved, "<html>https://a.com/1</html>");
    }

    #[tokio::test]
    async fn test_download_failures_do_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory::new();
        let downloader =
            DocumentDownloader::new(factory.clone(), dir.path(), Duration::from_millis(50));

        let report = downloader
            .download_all(&urls(&[
                "https://broken.example/",
                "https://slow.example/",
                "https://ok.example/",
            ]))
            .await
            .unwrap();

        assert_eq!(report.attempted(), 3);
        assert_eq!(report.saved, vec![dir.path().join("ok.example_.html")]);
        assert_eq!(report.failed.len(), 2);
        assert!(report.failed[1].1.contains("did not load"));
        assert_eq!(factory.log.lock().unwrap().closes, 1);
    }

    #[tokio::test]
    async fn test_download_collisions_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory::new();
        let downloader = DocumentDownloader::new(factory, dir.path(), Duration::from_secs(5));

        let report = downloader
            .download_all(&urls(&["https://a.com/x?y", "http://a.com/x&y"]))
            .await
            .unwrap();

        assert_eq!(report.collisions, 1);
        assert_eq!(report.saved.len(), 2);
        let saved = std::fs::read_to_string(dir.path().join("a.com_x_y.html")).unwrap();
        assert!(saved.contains("http://a.com/x&y"));
    }

    #[tokio::test]
    async fn test_download_empty_batch_opens_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FakeFactory::new();
        let downloader =
            DocumentDownloader::new(factory.clone(), dir.path().join("out"), Duration::from_secs(5));
        let report = downloader.download_all(&[]).await.unwrap();
        assert_eq!(report.attempted(), 0);
        assert_eq!(factory.opened.load(Ordering::SeqCst), 0);
    }
}
