//! # a3s-dork
//!
//! A concurrent, resumable multi-engine dorking link collector.
//!
//! For one query the [`Collector`] runs one browser-driven task per search
//! engine (Google, Bing, DuckDuckGo, Yandex). Each task pages through its
//! results, extracts links with the engine's [`EngineAdapter`], and merges
//! them into a persistent, deduplicated [`LinkStore`] after every page, so an
//! interrupted run keeps its progress and a repeated run only adds what is new.
//!
//! Collected links can be saved as rendered pages ([`DocumentDownloader`]),
//! mined for emails, keywords and document links ([`processing`]), or used to
//! hunt a domain's documents by file type ([`goofil`]).
//!
//! ## Example
//!
//! ```rust,no_run
//! # #[cfg(feature = "headless")]
//! # async fn run() -> a3s_dork::Result<()> {
//! use std::sync::Arc;
//! use a3s_dork::{BrowserPool, BrowserPoolConfig, Collector, CollectorConfig};
//!
//! let config = CollectorConfig {
//!     max_pages: 5,
//!     ..Default::default()
//! };
//! let pool = Arc::new(BrowserPool::new(BrowserPoolConfig::from_collector(&config)));
//! let collector = Collector::new(config, pool)?;
//!
//! let summary = collector.run("filetype:pdf site:example.com").await?;
//! for result in &summary.results {
//!     println!("{}: {} links ({})", result.engine, result.links.len(), result.reason);
//! }
//! # Ok(())
//! # }
//! ```

mod collector;
mod config;
mod downloader;
mod engine;
mod error;
mod result;
mod store;

pub mod engines;
pub mod fetcher;
pub mod fetcher_http;
pub mod goofil;
pub mod processing;

#[cfg(feature = "headless")]
mod browser;
#[cfg(feature = "headless")]
pub mod chrome;

pub use collector::Collector;
pub use config::CollectorConfig;
pub use downloader::{sanitize_filename, DocumentDownloader, DownloadReport, DownloadTask};
pub use engine::{EngineAdapter, EngineKind, EngineQuery, NextPageControl};
pub use error::{DorkError, Result};
pub use fetcher::{BrowserSession, RetryPolicy, SessionFactory, WaitStrategy};
pub use result::{CollectionResult, CollectionSummary, LinkMap, LinkRecord, TerminationReason};
pub use store::LinkStore;

#[cfg(feature = "headless")]
pub use browser::{BrowserPool, BrowserPoolConfig, ChromeSession};
