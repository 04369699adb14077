//! Content pipeline: raw fetch result → content hash, metadata, chunks and links
//!
//! Everything here is synchronous and CPU-bound; the orchestrator runs it on the blocking
//! thread pool so it stays off the fetch path.
//!
//! # Components
//!
//! - `ContentExtractor` / `HtmlExtractor`: main-content extraction
//! - `chunk_text`: deterministic chunker
//! - `extract_links`: canonical outbound links
//! - `tokenize` / `score`: search tokens and term-frequency ranking

mod chunker;
mod extract;
mod links;
mod tokens;

pub use chunker::{chunk_text, TextChunk};
pub use extract::{
    is_html_content_type, ContentExtractor, ExtractedContent, ExtractionError, HtmlExtractor,
};
pub use links::extract_links;
pub use tokens::{query_terms, score, token_string, tokenize};

use crate::crawler::RawResponse;
use sha2::{Digest, Sha256};
use url::Url;

/// A page ready to be reconciled with storage
#[derive(Debug, Clone)]
pub struct ProcessedPage {
    /// SHA-256 (hex) of the extracted main text
    pub content_hash: String,
    pub title: Option<String>,
    pub published: Option<String>,
    /// Extracted main text; chunk offsets index into it
    pub text: String,
    pub chunks: Vec<TextChunk>,
    /// Canonical outbound links, resolved against the final (post-redirect) URL
    pub links: Vec<Url>,
}

/// Hex SHA-256 of extracted text
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Runs extraction, hashing, chunking and link extraction over one response
///
/// # Returns
///
/// * `Ok(ProcessedPage)` - The page's hash, metadata, chunks and links
/// * `Err(ExtractionError)` - The response is not HTML or has no main text
pub fn extract_and_chunk(
    extractor: &dyn ContentExtractor,
    raw: &RawResponse,
    url: &Url,
    max_chars: usize,
) -> Result<ProcessedPage, ExtractionError> {
    if !is_html_content_type(&raw.content_type) {
        return Err(ExtractionError::NotHtml(raw.content_type.clone()));
    }

    let html = raw.text();
    let content = extractor.extract(&html, url)?;
    let chunks = chunk_text(&content.text, max_chars);
    if chunks.is_empty() {
        return Err(ExtractionError::EmptyContent);
    }

    Ok(ProcessedPage {
        content_hash: content_hash(&content.text),
        title: content.title,
        published: content.published,
        links: extract_links(&html, &raw.final_url),
        chunks,
        text: content.text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(body: &str, content_type: &str) -> RawResponse {
        RawResponse {
            final_url: Url::parse("https://ex.com/docs/").unwrap(),
            status: 200,
            content_type: content_type.to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn url() -> Url {
        Url::parse("https://ex.com/docs").unwrap()
    }

    #[test]
    fn test_extract_and_chunk() {
        let body = r#"<html><head><title>Docs</title></head><body>
            <nav><a href="/">Home</a></nav>
            <main><h1>Docs</h1><p>Read the <a href="guide">guide</a>.</p></main>
        </body></html>"#;

        let page = extract_and_chunk(&HtmlExtractor, &raw(body, "text/html"), &url(), 800).unwrap();
        assert_eq!(page.title.as_deref(), Some("Docs"));
        assert_eq!(page.text, "Docs\n\nRead the guide.");
        assert_eq!(page.chunks.len(), 1);
        assert_eq!(page.content_hash, content_hash("Docs\n\nRead the guide."));
        let links: Vec<&str> = page.links.iter().map(|u| u.as_str()).collect();
        assert_eq!(links, vec!["https://ex.com/", "https://ex.com/docs/guide"]);
    }

    #[test]
    fn test_markup_only_change_keeps_hash() {
        let a = r#"<main><p>Stable text.</p></main>"#;
        let b = r#"<div class="new-theme"><main><p><em>Stable</em> text.</p></main></div>"#;
        let pa = extract_and_chunk(&HtmlExtractor, &raw(a, "text/html"), &url(), 800).unwrap();
        let pb = extract_and_chunk(&HtmlExtractor, &raw(b, "text/html"), &url(), 800).unwrap();
        assert_eq!(pa.content_hash, pb.content_hash);
    }

    #[test]
    fn test_non_html_rejected() {
        let err = extract_and_chunk(&HtmlExtractor, &raw("%PDF", "application/pdf"), &url(), 800)
            .unwrap_err();
        assert!(matches!(err, ExtractionError::NotHtml(_)));
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
