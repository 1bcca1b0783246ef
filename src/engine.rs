//! Search engine identity, query construction and the adapter trait.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};

use crate::{DorkError, LinkMap, LinkRecord, Result};

/// The search engines the collector knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Google,
    Bing,
    DuckDuckGo,
    Yandex,
}

/// Controls that advance an engine's results to the next page.
#[derive(Debug, Clone, Copy)]
pub struct NextPageControl {
    /// CSS selectors tried in order.
    pub selectors: &'static [&'static str],
    /// Visible link/button texts tried when no selector matched.
    pub texts: &'static [&'static str],
}

impl EngineKind {
    /// Every registered engine, in the order tasks are spawned.
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Google,
        EngineKind::Bing,
        EngineKind::DuckDuckGo,
        EngineKind::Yandex,
    ];

    /// Short lowercase identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Bing => "bing",
            Self::DuckDuckGo => "duckduckgo",
            Self::Yandex => "yandex",
        }
    }

    /// Human-readable engine name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Bing => "Bing",
            Self::DuckDuckGo => "DuckDuckGo",
            Self::Yandex => "Yandex",
        }
    }

    /// Query URL template; `{query}` is replaced by the encoded query.
    pub fn base_url_template(&self) -> &'static str {
        match self {
            Self::Google => "https://www.google.com/search?q={query}",
            Self::Bing => "https://www.bing.com/search?q={query}",
            Self::DuckDuckGo => "https://duckduckgo.com/?q={query}",
            Self::Yandex => "https://yandex.com/search/?text={query}",
        }
    }

    /// The "next page" / "more results" control for this engine.
    pub fn next_page_control(&self) -> NextPageControl {
        match self {
            Self::Google => NextPageControl {
                selectors: &["a#pnnext", "a[aria-label='Next']"],
                texts: &["Next"],
            },
            Self::Bing => NextPageControl {
                selectors: &[
                    "a[title='Next page']",
                    "a[aria-label='Next page']",
                    "a.sb_pagN",
                ],
                texts: &[],
            },
            Self::DuckDuckGo => NextPageControl {
                selectors: &["button#more-results"],
                texts: &["More results"],
            },
            Self::Yandex => NextPageControl {
                selectors: &["a[aria-label='Next page']", "a.pager__item_kind_next"],
                texts: &["Next"],
            },
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = DorkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "g" => Ok(Self::Google),
            "bing" => Ok(Self::Bing),
            "duckduckgo" | "ddg" => Ok(Self::DuckDuckGo),
            "yandex" => Ok(Self::Yandex),
            _ => Err(DorkError::UnknownEngine(s.to_string())),
        }
    }
}

/// A query bound to one engine. Built once per run per engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineQuery {
    pub engine: EngineKind,
    pub base_url_template: String,
    pub query: String,
}

impl EngineQuery {
    /// Binds `query` to the engine's default URL template.
    pub fn new(engine: EngineKind, query: impl Into<String>) -> Self {
        Self {
            engine,
            base_url_template: engine.base_url_template().to_string(),
            query: query.into(),
        }
    }

    /// Returns the search URL with the query percent-encoded.
    pub fn url(&self) -> String {
        self.base_url_template
            .replace("{query}", &urlencoding::encode(&self.query))
    }
}

/// Turns a rendered results page into url → metadata records.
///
/// Implementations differ only in their selector rules. `seen` carries URLs
/// already known to the caller: they are skipped, and every URL returned is
/// added to it. Incomplete result blocks are skipped, never reported as errors.
pub trait EngineAdapter: Send + Sync {
    /// The engine this adapter parses.
    fn kind(&self) -> EngineKind;

    /// Extracts new links from one results page.
    fn extract(&self, html: &str, seen: &mut HashSet<String>) -> Result<LinkMap>;
}

/// Parses a CSS selector, mapping failures to `DorkError::Parse`.
pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| DorkError::Parse(format!("Failed to parse selector '{}': {:?}", css, e)))
}

/// Collects an element's text with whitespace runs collapsed.
pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Adds a link unless it is incomplete or already seen.
pub(crate) fn record_link(
    links: &mut LinkMap,
    seen: &mut HashSet<String>,
    url: &str,
    title: String,
    description: String,
) {
    let url = url.trim();
    if url.is_empty() || title.is_empty() {
        return;
    }
    if !seen.insert(url.to_string()) {
        return;
    }
    links.insert(
        url.to_string(),
        LinkRecord::new(title).with_description(description),
    );
}
