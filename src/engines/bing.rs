//! Bing results page adapter.

use std::collections::HashSet;

use scraper::Html;

use crate::engine::{element_text, record_link, selector};
use crate::{EngineAdapter, EngineKind, LinkMap, Result};

/// Bing result extraction from `li.b_algo` blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bing;

impl EngineAdapter for Bing {
    fn kind(&self) -> EngineKind {
        EngineKind::Bing
    }

    fn extract(&self, html: &str, seen: &mut HashSet<String>) -> Result<LinkMap> {
        let document = Html::parse_document(html);

        let result_selector = selector("li.b_algo")?;
        let title_selector = selector("h2 a[href]")?;
        let snippet_selector = selector(".b_caption p, .b_algoSlug")?;

        let mut links = LinkMap::new();

        for block in document.select(&result_selector) {
            let Some(anchor) = block.select(&title_selector).next() else {
                continue;
            };
            let title = element_text(anchor);
            let url = anchor.value().attr("href").unwrap_or_default();
            if !url.starts_with("http") {
                continue;
            }

            let description = block
                .select(&snippet_selector)
                .next()
                .map(element_text)
                .unwrap_or_else(|| element_text(block));

            record_link(&mut links, seen, url, title, description);
        }

        Ok(links)
    }
}
