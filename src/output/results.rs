//! Rendering of search hits and stored pages

use crate::storage::{ChunkResult, Liveness, PageDetail};

/// Longest chunk excerpt shown per search hit
const EXCERPT_CHARS: usize = 300;

/// Formats ranked search hits for the terminal
pub fn format_search_results(query: &str, results: &[ChunkResult]) -> String {
    if results.is_empty() {
        return format!("No results for \"{}\".\n", query);
    }

    let mut out = format!("{} results for \"{}\"\n\n", results.len(), query);
    for (rank, hit) in results.iter().enumerate() {
        out.push_str(&format!(
            "{}. [{:.3}] {}\n",
            rank + 1,
            hit.score,
            hit.page_title.as_deref().unwrap_or(&hit.page_url)
        ));
        out.push_str(&format!(
            "   {} (chunk {}, chars {}-{})\n",
            hit.page_url, hit.chunk_id, hit.start, hit.end
        ));
        out.push_str(&format!("   {}\n\n", excerpt(&hit.text)));
    }
    out
}

/// Formats a stored page with its chunks
pub fn format_page(detail: &PageDetail) -> String {
    let page = &detail.page;
    let mut out = String::new();

    out.push_str(&format!(
        "# {}\n\n",
        page.title.as_deref().unwrap_or(&page.url)
    ));
    out.push_str(&format!("- **URL**: {}\n", page.url));
    out.push_str(&format!("- **Liveness**: {}\n", page.liveness.to_db_string()));
    if let Some(published) = &page.published {
        out.push_str(&format!("- **Published**: {}\n", published));
    }
    if let Some(status) = page.status_code {
        out.push_str(&format!("- **Last Status**: {}\n", status));
    }
    out.push_str(&format!("- **Depth**: {}\n", page.depth));
    out.push_str(&format!("- **Content Hash**: {}\n", page.content_hash));
    out.push_str(&format!(
        "- **Last Crawled**: {}\n",
        page.last_crawled_at.to_rfc3339()
    ));
    if let Some(at) = page.tombstoned_at {
        out.push_str(&format!("- **Tombstoned**: {}\n", at.to_rfc3339()));
    }

    if page.liveness == Liveness::Tombstoned {
        out.push_str("\nThis page is gone; its chunks were removed from the index.\n");
        return out;
    }

    out.push_str(&format!("\n## Chunks ({})\n", detail.chunks.len()));
    for chunk in &detail.chunks {
        out.push_str(&format!(
            "\n### {} (chars {}-{})\n\n{}\n",
            chunk.id, chunk.start, chunk.end, chunk.text
        ));
    }
    out
}

/// First characters of a chunk on one line
fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut.trim_end())
}
