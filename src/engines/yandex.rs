//! Yandex results page adapter.

use std::collections::HashSet;

use scraper::Html;

use crate::engine::{element_text, record_link, selector};
use crate::{EngineAdapter, EngineKind, LinkMap, Result};

/// Yandex result extraction from `serp-item` and `Organic` blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Yandex;

impl EngineAdapter for Yandex {
    fn kind(&self) -> EngineKind {
        EngineKind::Yandex
    }

    fn extract(&self, html: &str, seen: &mut HashSet<String>) -> Result<LinkMap> {
        let document = Html::parse_document(html);

        // Nested `serp-item` > `Organic` blocks yield the same url twice; `seen` drops the repeat.
        let result_selector = selector("li.serp-item, div.Organic")?;
        let title_selector = selector(".OrganicTitle-LinkText")?;
        let link_selector = selector("a[href]")?;
        let snippet_selector = selector(".OrganicTextContentSpan, .Organic-ContentWrapper")?;

        let mut links = LinkMap::new();

        for block in document.select(&result_selector) {
            let Some(title) = block.select(&title_selector).next().map(element_text) else {
                continue;
            };
            let Some(url) = block
                .select(&link_selector)
                .filter_map(|a| a.value().attr("href"))
                .find(|href| href.starts_with("http"))
            else {
                continue;
            };

            let description = block
                .select(&snippet_selector)
                .next()
                .map(element_text)
                .unwrap_or_default();

            record_link(&mut links, seen, url, title, description);
        }

        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yandex_kind() {
        assert_eq!(Yandex.kind(), EngineKind::Yandex);
    }

    #[test]
    fn test_extract_with_results() {
        let html = r#"
            <ul id="search-result">
                <li class="serp-item">
                    <div class="Organic">
                        <a class="OrganicTitle-Link" href="https://acme.ru/report.docx">
                            <h2 class="OrganicTitle-LinkText">Acme report</h2>
                        </a>
                        <span class="OrganicTextContentSpan">Quarterly report</span>
                    </div>
                </li>
                <li class="serp-item">
                    <div class="Organic">
                        <a href="/search/?text=more">internal</a>
                        <a href="https://acme.ru/">
                            <span class="OrganicTitle-LinkText">Acme home</span>
                        </a>
                    </div>
                </li>
            </ul>
        "#;
        let links = Yandex.extract(html, &mut HashSet::new()).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links["https://acme.ru/report.docx"].title, "Acme report");
        assert_eq!(
            links["https://acme.ru/report.docx"].description.as_deref(),
            Some("Quarterly report")
        );
        assert_eq!(links["https://acme.ru/"].title, "Acme home");
    }

    #[test]
    fn test_extract_serp_item_without_organic_wrapper() {
        let html = r#"
            <ul>
                <li class="serp-item">
                    <a href="https://acme.ru/plan.pdf">
                        <h2 class="OrganicTitle-LinkText">Plan</h2>
                    </a>
                    <div class="Organic-ContentWrapper">Budget plan</div>
                </li>
            </ul>
        "#;
        let links = Yandex.extract(html, &mut HashSet::new()).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links["https://acme.ru/plan.pdf"].title, "Plan");
    }

    #[test]
    fn test_extract_skips_blocks_without_title() {
        let html = r#"<div class="Organic"><a href="https://acme.ru/">Untitled</a></div>"#;
        let links = Yandex.extract(html, &mut HashSet::new()).unwrap();
        assert!(links.is_empty());
    }
}
