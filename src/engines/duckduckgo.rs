//! DuckDuckGo results page adapter.

use std::collections::HashSet;

use scraper::Html;

use crate::engine::{element_text, record_link, selector};
use crate::{EngineAdapter, EngineKind, LinkMap, Result};

/// DuckDuckGo result extraction.
///
/// Handles both the JavaScript layout (`article[data-testid="result"]`) and the
/// HTML-only layout (`.result`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDuckGo;

impl EngineAdapter for DuckDuckGo {
    fn kind(&self) -> EngineKind {
        EngineKind::DuckDuckGo
    }

    fn extract(&self, html: &str, seen: &mut HashSet<String>) -> Result<LinkMap> {
        let document = Html::parse_document(html);

        let result_selector = selector("article[data-testid='result'], div.result")?;
        let title_selector = selector("h2 a[href], .result__title a[href], a.result__a[href]")?;
        let snippet_selector = selector("[data-result='snippet'], .result__snippet")?;

        let mut links = LinkMap::new();

        for block in document.select(&result_selector) {
            let Some(anchor) = block.select(&title_selector).next() else {
                continue;
            };
            let title = element_text(anchor);
            let href = anchor.value().attr("href").unwrap_or_default();

            let url = if href.starts_with("//duckduckgo.com/l/") {
                extract_redirect_url(href).unwrap_or_else(|| href.to_string())
            } else {
                href.to_string()
            };
            if !url.starts_with("http") {
                continue;
            }

            let description = block
                .select(&snippet_selector)
                .next()
                .map(element_text)
                .unwrap_or_default();

            record_link(&mut links, seen, &url, title, description);
        }

        Ok(links)
    }
}

fn extract_redirect_url(url: &str) -> Option<String> {
    let url = url.trim_start_matches("//duckduckgo.com/l/?uddg=");
    let encoded = url.split('&').next().unwrap_or(url);
    let decoded = urlencoding::decode(encoded).ok()?;
    Some(decoded.into_owned())
}
