//! Search ranking and page lookup over an indexed mock site

use crate::common::{mount_page, open_indexer, site_config, url_on};
use site_indexer::SiteIndexer;
use tempfile::TempDir;
use wiremock::MockServer;

async fn indexed_site(server: &MockServer, extra: &str) -> (TempDir, SiteIndexer) {
    mount_page(
        server,
        "/",
        "Rust Guide",
        "Rust ownership explained. Rust borrowing rules and Rust lifetimes.",
        &["/async", "/cargo", "/misc"],
    )
    .await;
    mount_page(
        server,
        "/async",
        "Async",
        "Async Rust uses futures and executors.",
        &[],
    )
    .await;
    mount_page(
        server,
        "/cargo",
        "Cargo",
        "Cargo builds Rust packages and fetches their dependencies from the registry, \
         resolving versions, compiling crates, running tests and publishing documentation.",
        &[],
    )
    .await;
    mount_page(server, "/misc", "Misc", "Gardening tips for spring.", &[]).await;

    let (dir, indexer) = open_indexer();
    indexer
        .run_index(site_config(server, "guide", extra))
        .await
        .expect("index job");
    (dir, indexer)
}

#[tokio::test]
async fn test_search_ranks_by_score() {
    let server = MockServer::start().await;
    let (_dir, indexer) = indexed_site(&server, "").await;

    let results = indexer.search("guide", "rust", Some(10)).expect("search");

    assert_eq!(results.len(), 3);
    assert!(results
        .windows(2)
        .all(|pair| pair[0].score >= pair[1].score));
    assert_eq!(results[0].page_url, url_on(&server, "/"));
    assert!(results.iter().all(|r| r.score > 0.0));
    assert!(results.iter().all(|r| r.text.to_lowercase().contains("rust")));
    assert!(results
        .iter()
        .all(|r| r.page_url != url_on(&server, "/misc")));
}

#[tokio::test]
async fn test_search_limits() {
    let server = MockServer::start().await;
    let (_dir, indexer) = indexed_site(&server, "[search]\ndefault-limit = 2\n").await;

    assert_eq!(indexer.search("guide", "rust", None).expect("search").len(), 2);
    assert_eq!(indexer.search("guide", "rust", Some(1)).expect("search").len(), 1);
    assert!(indexer.search("guide", "rust", Some(0)).expect("search").is_empty());
}

#[tokio::test]
async fn test_search_without_matches() {
    let server = MockServer::start().await;
    let (_dir, indexer) = indexed_site(&server, "").await;

    assert!(indexer.search("guide", "kubernetes", None).expect("search").is_empty());
    assert!(indexer.search("guide", "  ,;  ", None).expect("search").is_empty());
}

#[tokio::test]
async fn test_get_page_canonicalizes_url() {
    let server = MockServer::start().await;
    let (_dir, indexer) = indexed_site(&server, "").await;

    let variant = format!("{}/cargo/?utm_source=feed#install", server.uri());
    let detail = indexer
        .get_page("guide", &variant)
        .expect("page lookup")
        .expect("cargo stored");

    assert_eq!(detail.page.url, url_on(&server, "/cargo"));
    assert_eq!(detail.page.title.as_deref(), Some("Cargo"));
    assert!(detail.content_text.starts_with("Cargo"));

    let ordinals: Vec<u32> = detail.chunks.iter().map(|c| c.ordinal).collect();
    let expected: Vec<u32> = (0..detail.chunks.len() as u32).collect();
    assert_eq!(ordinals, expected);
    for chunk in &detail.chunks {
        let located: String = detail
            .content_text
            .chars()
            .skip(chunk.start)
            .take(chunk.end - chunk.start)
            .collect();
        assert_eq!(located, chunk.text);
    }

    assert!(indexer
        .get_page("guide", &url_on(&server, "/never-linked"))
        .expect("page lookup")
        .is_none());
}
