//! Main-content extraction
//!
//! Extraction sits behind the [`ContentExtractor`] trait so the boilerplate-removal strategy
//! can be swapped. The default [`HtmlExtractor`] keeps the readable blocks of the main content
//! region and drops navigation chrome.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Elements whose text is collected as one block each
const BLOCK_ELEMENTS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "li", "pre", "blockquote", "td", "th", "dt", "dd",
];

/// Elements whose contents never count as main text
const SKIPPED_ELEMENTS: &[&str] = &[
    "nav", "header", "footer", "aside", "script", "style", "noscript", "template", "form",
];

/// Main-content region candidates, most specific first
const REGION_SELECTORS: &[&str] = &["main", "article", "[role=main]", "body"];

/// Where a publication date may be declared, with the attribute holding it
const DATE_SOURCES: &[(&str, &str)] = &[
    ("meta[property='article:published_time']", "content"),
    ("meta[name='date']", "content"),
    ("meta[itemprop='datePublished']", "content"),
    ("[itemprop='datePublished'][datetime]", "datetime"),
    ("time[datetime]", "datetime"),
];

/// Why a response produced no indexable content
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("not an HTML document (content type '{0}')")]
    NotHtml(String),

    #[error("no main text found")]
    EmptyContent,

    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Output of main-content extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: Option<String>,

    /// Main text; one block per paragraph, blocks separated by blank lines
    pub text: String,

    /// Publication date exactly as the page declares it
    pub published: Option<String>,
}

/// Turns raw HTML into title, main text and publication date
pub trait ContentExtractor: Send + Sync {
    fn extract(&self, html: &str, url: &Url) -> Result<ExtractedContent, ExtractionError>;
}

/// Default extractor built on `scraper`
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlExtractor;

impl ContentExtractor for HtmlExtractor {
    fn extract(&self, html: &str, _url: &Url) -> Result<ExtractedContent, ExtractionError> {
        let document = Html::parse_document(html);

        let region = main_region(&document)?;
        let mut blocks = collect_blocks(region)?;
        if blocks.is_empty() {
            // Bare text straight inside the region
            let text = loose_text(region);
            if !text.is_empty() {
                blocks.push(text);
            }
        }

        if blocks.is_empty() {
            return Err(ExtractionError::EmptyContent);
        }

        Ok(ExtractedContent {
            title: extract_title(&document)?,
            text: blocks.join("\n\n"),
            published: extract_published(&document)?,
        })
    }
}

/// Returns true if the content type names an HTML document
///
/// An empty content type is given the benefit of the doubt.
pub fn is_html_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    ct.trim().is_empty() || ct.contains("text/html") || ct.contains("application/xhtml+xml")
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::Malformed(format!("{}: {:?}", css, e)))
}

fn main_region(document: &Html) -> Result<ElementRef<'_>, ExtractionError> {
    for css in REGION_SELECTORS {
        if let Some(region) = document.select(&selector(css)?).next() {
            return Ok(region);
        }
    }
    Ok(document.root_element())
}

fn collect_blocks(region: ElementRef<'_>) -> Result<Vec<String>, ExtractionError> {
    let blocks = selector(&BLOCK_ELEMENTS.join(", "))?;
    let mut out = Vec::new();

    for element in region.select(&blocks) {
        if is_nested_or_skipped(element, region) {
            continue;
        }

        let raw: String = element.text().collect();
        let text = if element.value().name() == "pre" {
            raw.trim_matches('\n').trim_end().to_string()
        } else {
            collapse_whitespace(&raw)
        };

        if !text.is_empty() {
            out.push(text);
        }
    }

    Ok(out)
}

/// True when an ancestor below the region is itself a block or a skipped element
fn is_nested_or_skipped(element: ElementRef<'_>, region: ElementRef<'_>) -> bool {
    for ancestor in element.ancestors().filter_map(ElementRef::wrap) {
        if ancestor.id() == region.id() {
            return false;
        }
        let name = ancestor.value().name();
        if BLOCK_ELEMENTS.contains(&name) || SKIPPED_ELEMENTS.contains(&name) {
            return true;
        }
    }
    false
}

/// All text in the region outside skipped elements, whitespace-collapsed
fn loose_text(region: ElementRef<'_>) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in region.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take_while(|a| a.id() != region.id())
            .any(|a| SKIPPED_ELEMENTS.contains(&a.value().name()));
        if !skipped {
            parts.push(&**text);
        }
    }
    collapse_whitespace(&parts.join(" "))
}

fn extract_title(document: &Html) -> Result<Option<String>, ExtractionError> {
    for css in ["title", "h1"] {
        let found = document
            .select(&selector(css)?)
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .find(|t| !t.is_empty());
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

fn extract_published(document: &Html) -> Result<Option<String>, ExtractionError> {
    for (css, attr) in DATE_SOURCES {
        let found = document
            .select(&selector(css)?)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|v| !v.is_empty());
        if let Some(value) = found {
            return Ok(Some(value.to_string()));
        }
    }
    Ok(None)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
