//! Plain HTTP file downloads using reqwest.
//!
//! Used for documents discovered by file-type dorking, where the link points
//! straight at a file and no rendering is needed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::downloader::{safe_file_name, DownloadReport};
use crate::Result;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; a3s-dork/0.1)";

/// Streams files to disk over HTTP.
pub struct HttpFetcher {
    client: Client,
    concurrency: usize,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Creates an `HttpFetcher` with a custom reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            concurrency: 4,
        }
    }

    /// Sets how many files download at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Downloads `url` to `destination`.
    ///
    /// The body is streamed into `<destination>.part` and renamed on success,
    /// so a failed transfer never leaves a truncated file behind.
    pub async fn download(&self, url: &str, destination: &Path) -> Result<u64> {
        let mut response = self.client.get(url).send().await?.error_for_status()?;

        let partial = partial_path(destination);
        let mut file = tokio::fs::File::create(&partial).await?;
        let mut written = 0u64;

        let transfer: Result<()> = async {
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(())
        }
        .await;

        if let Err(e) = transfer {
            drop(file);
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        drop(file);
        tokio::fs::rename(&partial, destination).await?;
        Ok(written)
    }

    /// Downloads every URL into `dir`, a few at a time.
    ///
    /// File names come from the last path segment. When two URLs share one,
    /// the later URL is named after its full address instead.
    pub async fn download_all(&self, urls: &[String], dir: &Path) -> Result<DownloadReport> {
        std::fs::create_dir_all(dir)?;

        let mut report = DownloadReport::default();
        let mut claimed = HashSet::new();
        let mut jobs = Vec::with_capacity(urls.len());
        for url in urls {
            let mut name = file_name_from_url(url);
            if !claimed.insert(name.clone()) {
                report.collisions += 1;
                let without_scheme = url.split_once("://").map_or(url.as_str(), |(_, r)| r);
                name = safe_file_name(without_scheme, "");
                debug!("File name taken, saving {} as {}", url, name);
                claimed.insert(name.clone());
            }
            jobs.push((url.clone(), dir.join(name)));
        }

        let outcomes: Vec<_> = stream::iter(jobs)
            .map(|(url, destination)| async move {
                let outcome = self.download(&url, &destination).await;
                (url, destination, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (url, destination, outcome) in outcomes {
            match outcome {
                Ok(bytes) => {
                    info!("Downloaded {} ({} bytes)", url, bytes);
                    report.saved.push(destination);
                }
                Err(e) => {
                    warn!("Failed to download {}: {}", url, e);
                    report.failed.push((url, e.to_string()));
                }
            }
        }
        Ok(report)
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

/// File name for a downloaded document: the decoded last path segment.
pub fn file_name_from_url(url: &str) -> String {
    let segment = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty());

    match segment {
        Some(segment) => {
            let decoded = urlencoding::decode(&segment)
                .map(|s| s.into_owned())
                .unwrap_or(segment);
            safe_file_name(&decoded, "")
        }
        None => {
            let without_scheme = url.split_once("://").map_or(url, |(_, r)| r);
            safe_file_name(without_scheme, "")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_fetcher_new() {
        let fetcher = HttpFetcher::new(Duration::from_secs(30)).unwrap();
        assert_eq!(fetcher.concurrency, 4);
    }

    #[test]
    fn test_http_fetcher_with_client() {
        let client = Client::builder().user_agent("test-agent").build().unwrap();
        let fetcher = HttpFetcher::with_client(client).with_concurrency(0);
        assert_eq!(fetcher.concurrency, 1);
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://acme.com/docs/Annual%20Report.pdf?v=2"),
            "Annual Report.pdf"
        );
        assert_eq!(file_name_from_url("https://acme.com/a/b.docx"), "b.docx");
        assert_eq!(file_name_from_url("https://acme.com/"), "acme.com_");
        assert_eq!(file_name_from_url("https://acme.com/x%2Fy.sql"), "x_y.sql");
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/out/a.pdf")),
            PathBuf::from("/tmp/out/a.pdf.part")
        );
    }

    #[tokio::test]
    async fn test_download_all_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpFetcher::new(Duration::from_secs(2)).unwrap();
        let urls = vec![
            "http://127.0.0.1:9/a/report.pdf".to_string(),
            "http://127.0.0.1:9/b/report.pdf".to_string(),
        ];
        let report = fetcher.download_all(&urls, dir.path()).await.unwrap();
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.collisions, 1);
        assert!(report.saved.is_empty());
        // No partial files are left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_download_live_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpFetcher::new(Duration::from_secs(30)).unwrap();
        let dest = dir.path().join("robots.txt");
        let bytes = fetcher
            .download("https://www.rust-lang.org/robots.txt", &dest)
            .await
            .unwrap();
        assert!(bytes > 0);
        assert!(dest.exists());
    }
}
