use scraper::{Html, Selector};
use tracing::debug;

use crate::canon::CanonicalUrl;
use crate::traits::{ContentRenderer, LinkExtractor};
use crate::types::{ContentHash, RenderedPage};

/// Converts fetched HTML to markdown and stamps it with a provenance
/// comment naming the source URL.
#[derive(Debug, Default)]
pub struct MarkdownRenderer;

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl ContentRenderer for MarkdownRenderer {
    fn render(&self, html: &str, source_url: &CanonicalUrl) -> RenderedPage {
        let body = match htmd::convert(html) {
            Ok(markdown) => markdown,
            Err(_) => {
                debug!(url = %source_url, "markdown conversion failed, keeping plain text");
                plain_text(html)
            }
        };
        let body = body.trim().to_string();

        // Hash the body before the provenance line goes in, so the same
        // content served at two URLs produces the same hash.
        let hash = ContentHash::from_text(&body);
        let markdown = format!("<!-- Source: {source_url} -->\n\n{body}\n");

        RenderedPage {
            markdown,
            title: extract_title(html),
            hash,
        }
    }
}

fn plain_text(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// The document `<title>`, trimmed, when present and non-empty.
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let element = document.select(&selector).next()?;
    let title = element.text().collect::<String>().trim().to_string();
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Pulls raw `href` values out of anchor elements. Values come back as
/// written in the document; resolution against the page URL happens later.
#[derive(Debug, Default)]
pub struct HtmlLinkExtractor;

impl HtmlLinkExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl LinkExtractor for HtmlLinkExtractor {
    fn extract(&self, html: &str, _base_url: &CanonicalUrl) -> Vec<String> {
        let document = Html::parse_document(html);
        let selector = match Selector::parse("a[href], area[href]") {
            Ok(selector) => selector,
            Err(_) => return Vec::new(),
        };
        document
            .select(&selector)
            .filter_map(|element| element.value().attr("href"))
            .map(str::to_string)
            .collect()
    }
}
