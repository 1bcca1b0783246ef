//! Google results page adapter.

use std::collections::HashSet;

use scraper::Html;

use crate::engine::{element_text, record_link, selector};
use crate::{EngineAdapter, EngineKind, LinkMap, Result};

/// Google result extraction.
///
/// Result blocks are `div.g`. When Google serves a layout without them, any
/// `a[href]` wrapping an `h3` is taken as a result instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct Google;

impl Google {
    /// Resolves a result href, unwrapping `/url?q=` redirects.
    ///
    /// Returns `None` for Google-internal links.
    fn resolve_href(href: &str) -> Option<String> {
        if let Some(rest) = href.strip_prefix("/url?q=") {
            let target = rest.split('&').next().unwrap_or(rest);
            return urlencoding::decode(target).ok().map(|s| s.into_owned());
        }
        if href.starts_with("http://") || href.starts_with("https://") {
            return Some(href.to_string());
        }
        None
    }
}

impl EngineAdapter for Google {
    fn kind(&self) -> EngineKind {
        EngineKind::Google
    }

    fn extract(&self, html: &str, seen: &mut HashSet<String>) -> Result<LinkMap> {
        let document = Html::parse_document(html);

        let container_selector = selector("div.g")?;
        let title_selector = selector("h3")?;
        let link_selector = selector("a[href]")?;
        let snippet_selector = selector("div.VwiC3b, div[data-sncf]")?;

        let mut links = LinkMap::new();
        let mut found_blocks = false;

        for block in document.select(&container_selector) {
            found_blocks = true;

            let Some(title) = block.select(&title_selector).next().map(element_text) else {
                continue;
            };
            let Some(url) = block
                .select(&link_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(Self::resolve_href)
            else {
                continue;
            };

            let description = block
                .select(&snippet_selector)
                .next()
                .map(element_text)
                .unwrap_or_default();

            record_link(&mut links, seen, &url, title, description);
        }

        if !found_blocks {
            for anchor in document.select(&link_selector) {
                let Some(title) = anchor.select(&title_selector).next().map(element_text) else {
                    continue;
                };
                let Some(url) = anchor.value().attr("href").and_then(Self::resolve_href) else {
                    continue;
                };
                record_link(&mut links, seen, &url, title, String::new());
            }
        }

        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(html: &str) -> LinkMap {
        Google.extract(html, &mut HashSet::new()).unwrap()
    }

    #[test]
    fn test_google_kind() {
        assert_eq!(Google.kind(), EngineKind::Google);
    }

    #[test]
    fn test_extract_empty_html() {
        assert!(extract("<html><body></body></html>").is_empty());
    }

    #[test]
    fn test_extract_with_results() {
        let html = r#"
            <html>
            <body>
                <div class="g">
                    <a href="https://www.rust-lang.org/">
                        <h3>Rust Programming Language</h3>
                    </a>
                    <div class="VwiC3b">A language empowering everyone to build reliable software.</div>
                </div>
                <div class="g">
                    <a href="https://doc.rust-lang.org/book/">
                        <h3>The Rust Programming Language Book</h3>
                    </a>
                </div>
            </body>
            </html>
        "#;
        let links = extract(html);
        assert_eq!(links.len(), 2);

        let rust = &links["https://www.rust-lang.org/"];
        assert_eq!(rust.title, "Rust Programming Language");
        assert_eq!(
            rust.description.as_deref(),
            Some("A language empowering everyone to build reliable software.")
        );

        let book = &links["https://doc.rust-lang.org/book/"];
        assert_eq!(book.title, "The Rust Programming Language Book");
        assert!(book.description.is_none());
    }

    #[test]
    fn test_extract_unwraps_redirect_url() {
        let html = r#"
            <div class="g">
                <a href="/url?q=https%3A%2F%2Fexample.com%2Freport.pdf&sa=U"><h3>Report</h3></a>
                <div data-sncf="1">Annual report</div>
            </div>
        "#;
        let links = extract(html);
        assert_eq!(links.len(), 1);
        assert_eq!(
            links["https://example.com/report.pdf"].description.as_deref(),
            Some("Annual report")
        );
    }

    #[test]
    fn test_extract_skips_internal_links_and_missing_titles() {
        let html = r#"
            <div class="g"><a href="/search?q=related"><h3>Related Search</h3></a></div>
            <div class="g"><a href="https://example.com">No h3 here</a></div>
            <div class="g"><h3>No link</h3></div>
        "#;
        assert!(extract(html).is_empty());
    }

    #[test]
    fn test_extract_fallback_without_result_blocks() {
        let html = r#"
            <div><div>
                <a href="https://example.org/a"><h3>A</h3></a>
                <a href="https://example.org/b"><br><h3>B</h3></a>
                <a href="https://example.org/nav">Navigation</a>
            </div></div>
        "#;
        let links = extract(html);
        assert_eq!(links.len(), 2);
        assert!(links.contains_key("https://example.org/a"));
        assert!(links.contains_key("https://example.org/b"));
    }

    #[test]
    fn test_extract_skips_seen_and_marks_new() {
        let html = r#"
            <div class="g"><a href="https://a.com"><h3>A</h3></a></div>
            <div class="g"><a href="https://b.com"><h3>B</h3></a></div>
        "#;
        let mut seen = HashSet::from(["https://a.com".to_string()]);
        let links = Google.extract(html, &mut seen).unwrap();
        assert_eq!(links.len(), 1);
        assert!(links.contains_key("https://b.com"));
        assert!(seen.contains("https://b.com"));

        let again = Google.extract(html, &mut seen).unwrap();
        assert!(again.is_empty());
    }
}
