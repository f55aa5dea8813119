//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow (from `<a>` tags and canonical links)
//! - Page title
//! - Hrefs that could not be resolved into a valid URL

use crate::url::normalize_url;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Schemes that never lead to a crawlable page
const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from `<title>`)
    pub title: Option<String>,

    /// Canonical, deduplicated links in document order
    pub links: Vec<Url>,

    /// Raw hrefs that failed resolution or canonicalization
    pub malformed: Vec<String>,
}

/// Links found in a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedLinks {
    pub links: Vec<Url>,
    pub malformed: Vec<String>,
}

/// Parses HTML content and extracts the title and links
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">`
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` and `data:` links
/// - Fragment-only links
/// - Anything that is not http(s) after resolution
///
/// Relative references resolve against `<base href>` when the document has
/// one, otherwise against `base_url`.
///
/// # Example
///
/// ```
/// use site_sentinel::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let title = extract_title(&document);
    let ExtractedLinks { links, malformed } = links_from_document(&document, base_url);

    ParsedPage {
        title,
        links,
        malformed,
    }
}

/// Extracts only the links from HTML content
pub fn extract_links(html: &str, base_url: &Url) -> ExtractedLinks {
    let document = Html::parse_document(html);
    links_from_document(&document, base_url)
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolves the document's `<base href>` against the page URL
fn effective_base(document: &Html, page_url: &Url) -> Url {
    let Ok(selector) = Selector::parse("base[href]") else {
        return page_url.clone();
    };

    document
        .select(&selector)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .filter(|base| base.scheme() == "http" || base.scheme() == "https")
        .unwrap_or_else(|| page_url.clone())
}

fn links_from_document(document: &Html, page_url: &Url) -> ExtractedLinks {
    let base = effective_base(document, page_url);
    let mut extracted = ExtractedLinks::default();
    let mut seen: HashSet<String> = HashSet::new();

    let Ok(selector) = Selector::parse("a[href], link[href]") else {
        return extracted;
    };

    for element in document.select(&selector) {
        if !is_followable_element(&element) {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };

        match resolve_link(href, &base) {
            LinkResolution::Link(url) => {
                if seen.insert(url.as_str().to_string()) {
                    extracted.links.push(url);
                }
            }
            LinkResolution::Malformed => extracted.malformed.push(href.to_string()),
            LinkResolution::Skipped => {}
        }
    }

    extracted
}

/// `<a>` without `download`, or `<link rel="canonical">`
fn is_followable_element(element: &ElementRef<'_>) -> bool {
    let value = element.value();
    match value.name() {
        "a" => value.attr("download").is_none(),
        "link" => value.attr("rel").is_some_and(|rel| {
            rel.split_whitespace()
                .any(|token| token.eq_ignore_ascii_case("canonical"))
        }),
        _ => false,
    }
}

enum LinkResolution {
    Link(Url),
    Skipped,
    Malformed,
}

/// Resolves a link href to a canonical absolute URL
fn resolve_link(href: &str, base_url: &Url) -> LinkResolution {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return LinkResolution::Skipped;
    }

    let lowered = href.to_ascii_lowercase();
    if SKIPPED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        return LinkResolution::Skipped;
    }

    let absolute = match base_url.join(href) {
        Ok(url) => url,
        Err(_) => return LinkResolution::Malformed,
    };

    if absolute.scheme() != "http" && absolute.scheme() != "https" {
        return LinkResolution::Skipped;
    }

    match normalize_url(absolute.as_str()) {
        Ok(url) => LinkResolution::Link(url),
        Err(_) => LinkResolution::Malformed,
    }
}
