//! Document discovery for a domain by file-type dorking.
//!
//! For each requested file type a `filetype:<ext> site:<domain>` query is run
//! through the [`Collector`], so results land in the same link store as any
//! other collection. Links on the domain whose path ends in a requested
//! extension are then reported and can be fetched over HTTP.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::fetcher_http::HttpFetcher;
use crate::processing::{file_links, url_extension};
use crate::{CollectionSummary, Collector, DorkError, DownloadReport, LinkMap, Result};

/// File types searched when none are given.
pub const DEFAULT_FILE_TYPES: &[&str] = &["pdf", "docx", "doc", "txt"];

/// Normalizes file types: trimmed, lowercase, without a leading dot,
/// duplicates dropped.
pub fn normalize_file_types<S: AsRef<str>>(file_types: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::new();
    for ft in file_types {
        let ft = ft.as_ref().trim().trim_start_matches('.').to_ascii_lowercase();
        if !ft.is_empty() && !normalized.contains(&ft) {
            normalized.push(ft);
        }
    }
    normalized
}

/// Builds one dork per file type.
pub fn build_queries(domain: &str, file_types: &[String]) -> Vec<String> {
    file_types
        .iter()
        .map(|ft| format!("filetype:{} site:{}", ft, domain))
        .collect()
}

/// True when `url` is hosted on `domain` or one of its subdomains.
fn on_domain(url: &str, domain: &str) -> bool {
    let Some(host) = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    else {
        return false;
    };
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// Stored links on `domain` that point at one of `file_types`.
pub fn document_links(links: &LinkMap, domain: &str, file_types: &[String]) -> Vec<String> {
    file_links(links, file_types)
        .into_iter()
        .filter(|url| on_domain(url, domain))
        .collect()
}

/// Result of a discovery run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GoofilReport {
    pub domain: String,
    /// One collection summary per file-type query.
    pub searches: Vec<CollectionSummary>,
    /// Matching document URLs, sorted.
    pub documents: Vec<String>,
}

/// File-type discovery for one domain.
pub struct Goofil<'a> {
    collector: &'a Collector,
    domain: String,
    file_types: Vec<String>,
}

impl<'a> Goofil<'a> {
    /// Fails when the domain is blank or no usable file type remains.
    pub fn new<S: AsRef<str>>(
        collector: &'a Collector,
        domain: &str,
        file_types: &[S],
    ) -> Result<Self> {
        let domain = domain
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_ascii_lowercase();
        if domain.is_empty() {
            return Err(DorkError::Config("domain cannot be empty".into()));
        }

        let file_types = normalize_file_types(file_types);
        if file_types.is_empty() {
            return Err(DorkError::Config("no file types given".into()));
        }

        Ok(Self {
            collector,
            domain,
            file_types,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn file_types(&self) -> &[String] {
        &self.file_types
    }

    /// Runs every file-type query and lists the documents found.
    pub async fn discover(&self) -> Result<GoofilReport> {
        let mut report = GoofilReport {
            domain: self.domain.clone(),
            ..Default::default()
        };

        for query in build_queries(&self.domain, &self.file_types) {
            info!("Searching for \"{}\"", query);
            report.searches.push(self.collector.run(&query).await?);
        }

        let store = self.collector.store();
        let store = store.lock().await;
        report.documents = document_links(store.links(), &self.domain, &self.file_types);
        info!(
            "Found {} documents on {} ({})",
            report.documents.len(),
            self.domain,
            self.file_types.join(", ")
        );
        Ok(report)
    }

    /// Fetches `documents` into `<dir>/<domain>/`.
    pub async fn download(
        &self,
        documents: &[String],
        fetcher: &HttpFetcher,
        dir: &Path,
    ) -> Result<DownloadReport> {
        let target = dir.join(&self.domain);
        let wanted: Vec<String> = documents
            .iter()
            .filter(|url| {
                url_extension(url).is_some_and(|ext| self.file_types.contains(&ext))
            })
            .cloned()
            .collect();
        fetcher.download_all(&wanted, &target).await
    }
}
