//! Content extraction for fetched pages
//!
//! This module turns a [`RawPage`] into the three things the pipeline
//! needs from it:
//! - a title (first `<title>`, else first `<h1>`, else [`UNTITLED`])
//! - visible text with whitespace collapsed to single spaces
//! - every hyperlink, resolved to an absolute, normalized URL
//!
//! Extraction is pure: no I/O, same input gives the same output.

use crate::crawler::fetcher::{ContentKind, RawPage};
use crate::url::resolve_url;
use scraper::{Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Title used when a page has no title-like element
pub const UNTITLED: &str = "Untitled";

/// Elements whose text is never visible
const HIDDEN_ELEMENTS: &[&str] = &[
    "head", "title", "script", "style", "noscript", "template", "iframe", "object",
];

/// Elements that break text flow; a space is inserted before each one
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Extracted information from a fetched page
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPage {
    pub title: String,

    /// Visible text, whitespace-collapsed and trimmed
    pub text: String,

    /// Absolute links in document order, without duplicates
    pub links: Vec<Url>,
}

/// Extracts title, text and links from a fetched page
pub fn extract(page: &RawPage) -> ExtractedPage {
    match page.kind {
        ContentKind::Html => extract_html(&page.body, &page.url),
        ContentKind::PlainText => extract_plain(&page.body),
    }
}

/// Parses HTML content and extracts title, text and links
///
/// # Link Extraction Rules
///
/// - `<a href>` and `<area href>` are followed
/// - hrefs resolve against `<base href>` when present, else `page_url`
/// - fragment-only links resolve to the page itself
/// - `javascript:`, `mailto:`, `tel:` and data URIs are dropped
///
/// # Example
///
/// ```
/// use sumi_ingest::crawler::extract_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="../up">Link</a></body></html>"#;
/// let page_url = Url::parse("https://example.com/a/b").unwrap();
/// let page = extract_html(html, &page_url);
/// assert_eq!(page.title, "Test");
/// assert_eq!(page.text, "Link");
/// assert_eq!(page.links[0].as_str(), "https://example.com/up");
/// ```
pub fn extract_html(html: &str, page_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);
    let base = base_url(&document, page_url);

    ExtractedPage {
        title: extract_title(&document),
        text: visible_text(&document),
        links: extract_links(&document, &base),
    }
}

/// Plain-text bodies have no title element and no links
pub fn extract_plain(body: &str) -> ExtractedPage {
    ExtractedPage {
        title: UNTITLED.to_string(),
        text: collapse_whitespace(body),
        links: Vec::new(),
    }
}

/// Collapses every whitespace run to one space and trims both ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_title(document: &Html) -> String {
    for tag in ["title", "h1"] {
        let Ok(selector) = Selector::parse(tag) else {
            continue;
        };
        let found = document
            .select(&selector)
            .map(|element| collapse_whitespace(&element.text().collect::<String>()))
            .find(|title| !title.is_empty());
        if let Some(title) = found {
            return title;
        }
    }

    UNTITLED.to_string()
}

fn visible_text(document: &Html) -> String {
    let mut text = String::new();

    for node in document.root_element().descendants() {
        match node.value() {
            Node::Element(element) if BLOCK_ELEMENTS.contains(&element.name()) => {
                text.push(' ');
            }
            Node::Text(fragment) => {
                let hidden = node.ancestors().any(|ancestor| {
                    matches!(ancestor.value(), Node::Element(e) if HIDDEN_ELEMENTS.contains(&e.name()))
                });
                if !hidden {
                    text.push_str(fragment);
                }
            }
            _ => {}
        }
    }

    collapse_whitespace(&text)
}

/// Resolves `<base href>` against the page URL, falling back to the page URL
fn base_url(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .filter(|url| url.scheme() == "http" || url.scheme() == "https")
        .unwrap_or_else(|| page_url.clone())
}

fn extract_links(document: &Html, base: &Url) -> Vec<Url> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    let Ok(selector) = Selector::parse("a[href], area[href]") else {
        return links;
    };

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if href.trim().is_empty() {
            continue;
        }

        match resolve_url(base, href) {
            Ok(url) => {
                if seen.insert(url.as_str().to_string()) {
                    links.push(url);
                }
            }
            Err(e) => tracing::trace!("Skipping link {}: {}", href, e),
        }
    }

    links
}
