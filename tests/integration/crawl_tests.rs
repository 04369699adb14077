//! End-to-end index jobs against a mock site

use crate::common::{
    html_page, mount_page, mount_small_site, mount_status, open_indexer, site_config, url_on,
};
use site_indexer::pipeline::{ContentExtractor, ExtractedContent, ExtractionError, HtmlExtractor};
use site_indexer::state::StopReason;
use site_indexer::{CancelToken, IndexerError, JobKind, JobState, SiteIndexer};
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_index_follows_links_to_depth() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let (_dir, indexer) = open_indexer();
    let config = site_config(&server, "ex-docs", "[scope]\nmax-depth = 1\nmax-pages = 5\n");

    let summary = indexer.run_index(config).await.expect("index job");

    assert_eq!(summary.kind, JobKind::Index);
    assert_eq!(summary.state, JobState::Completed);
    assert_eq!(summary.stop_reason, Some(StopReason::FrontierExhausted));
    assert_eq!(summary.counters.discovered, 4);
    assert_eq!(summary.counters.fetched, 4);
    assert_eq!(summary.counters.indexed, 4);
    assert_eq!(summary.counters.excluded, 0);
    assert_eq!(summary.counters.failed, 0);
    assert!(summary.started_at.is_some());
    assert!(summary.finished_at.is_some());

    // D sits at depth 2: fetched, but its links are not followed
    let page = indexer
        .get_page("ex-docs", &url_on(&server, "/d"))
        .expect("page lookup")
        .expect("D stored");
    assert_eq!(page.page.depth, 2);
    assert_eq!(page.page.title.as_deref(), Some("Delta"));
    assert!(!page.chunks.is_empty());

    let sites = indexer.list_sites().expect("list sites");
    assert_eq!(sites.len(), 1);
    assert_eq!(sites[0].active_pages, 4);
}

#[tokio::test]
async fn test_out_of_scope_links_are_excluded() {
    let server = MockServer::start().await;
    mount_page(&server, "/docs", "Docs", "Documentation home.", &["/docs/a", "/blog"]).await;
    mount_page(&server, "/docs/a", "Page A", "First docs page.", &[]).await;
    Mock::given(method("GET"))
        .and(path("/blog"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_dir, indexer) = open_indexer();
    let mut config = site_config(&server, "scoped", "[scope]\nallowed-prefixes = [\"/docs\"]\n");
    config.site.seeds = vec![url_on(&server, "/docs")];

    let summary = indexer.run_index(config).await.expect("index job");

    assert_eq!(summary.counters.indexed, 2);
    // The nav link to "/" and the /blog link
    assert_eq!(summary.counters.excluded, 2);
    assert_eq!(summary.state, JobState::Completed);
}

#[tokio::test]
async fn test_robots_disallowed_pages_are_never_fetched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/", "Home", "Public home page.", &["/private", "/open"]).await;
    mount_page(&server, "/open", "Open", "Public page.", &[]).await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_dir, indexer) = open_indexer();
    let summary = indexer
        .run_index(site_config(&server, "robots", ""))
        .await
        .expect("index job");

    assert_eq!(summary.counters.indexed, 2);
    assert_eq!(summary.counters.excluded, 1);
    assert_eq!(summary.counters.fetched, 2);
    assert!(indexer
        .get_page("robots", &url_on(&server, "/private"))
        .expect("page lookup")
        .is_none());
}

#[tokio::test]
async fn test_url_variants_are_fetched_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        "Home",
        "Links to one page in many spellings.",
        &["/b", "/b/", "/b#section", "/./b", "/b?utm_source=feed"],
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            html_page("Bravo", "Only once.", &[]).into_bytes(),
            "text/html",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let (_dir, indexer) = open_indexer();
    let summary = indexer
        .run_index(site_config(&server, "dedup", ""))
        .await
        .expect("index job");

    assert_eq!(summary.counters.discovered, 2);
    assert_eq!(summary.counters.indexed, 2);
}

#[tokio::test]
async fn test_page_budget_stops_dispatch() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let (_dir, indexer) = open_indexer();
    let mut config = site_config(&server, "budget", "[scope]\nmax-pages = 2\n");
    config.politeness.max_workers = 1;

    let summary = indexer.run_index(config).await.expect("index job");

    assert_eq!(summary.stop_reason, Some(StopReason::PageBudgetReached));
    assert_eq!(summary.state, JobState::Completed);
    assert_eq!(summary.counters.fetched, 2);
    assert_eq!(summary.counters.indexed, 2);
}

#[tokio::test]
async fn test_per_url_failures_do_not_fail_the_job() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        "Home",
        "Links to broken pages.",
        &["/flaky", "/report.pdf", "/missing"],
    )
    .await;
    // One retry for a server error
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/report.pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4".to_vec(), "application/pdf"),
        )
        .mount(&server)
        .await;
    mount_status(&server, "/missing", 404).await;

    let (_dir, indexer) = open_indexer();
    let summary = indexer
        .run_index(site_config(&server, "broken", ""))
        .await
        .expect("index job");

    assert_eq!(summary.state, JobState::Completed);
    assert_eq!(summary.counters.indexed, 1);
    assert_eq!(summary.counters.failed, 3);
    // A 404 for a page never stored tombstones nothing
    assert_eq!(summary.counters.tombstoned, 0);
    assert!(summary.error.is_none());
}

#[tokio::test]
async fn test_cancelled_job_fetches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_dir, indexer) = open_indexer();
    let cancel = CancelToken::new();
    cancel.cancel();

    let summary = indexer
        .run_index_with_cancel(site_config(&server, "cancelled", ""), cancel)
        .await
        .expect("index job");

    assert_eq!(summary.state, JobState::Cancelled);
    assert_eq!(summary.stop_reason, Some(StopReason::Cancelled));
    assert_eq!(summary.counters.fetched, 0);
    assert_eq!(summary.counters.indexed, 0);

    let jobs = indexer.recent_jobs("cancelled", 10).expect("recent jobs");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, summary.job_id);
}

#[tokio::test]
async fn test_sitemap_seeds_unlinked_pages() {
    let server = MockServer::start().await;
    mount_page(&server, "/", "Home", "Home links nowhere.", &[]).await;
    mount_page(&server, "/orphan", "Orphan", "Only the sitemap knows me.", &[]).await;
    let sitemap = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{}</loc></url>
</urlset>"#,
        url_on(&server, "/orphan")
    );
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sitemap.into_bytes(), "application/xml"),
        )
        .mount(&server)
        .await;

    let (_dir, indexer) = open_indexer();
    let mut config = site_config(&server, "mapped", "");
    config.site.seed_from_sitemap = true;

    let summary = indexer.run_index(config).await.expect("index job");

    assert_eq!(summary.counters.indexed, 2);
    let orphan = indexer
        .get_page("mapped", &url_on(&server, "/orphan"))
        .expect("page lookup")
        .expect("orphan stored");
    assert_eq!(orphan.page.depth, 0);
}

#[tokio::test]
async fn test_absurd_crawl_delay_does_not_fail_the_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 1e30\n"),
        )
        .mount(&server)
        .await;
    mount_page(&server, "/", "Home", "A single page behind a hostile robots file.", &[]).await;

    let (_dir, indexer) = open_indexer();
    let summary = indexer
        .run_index(site_config(&server, "hostile", ""))
        .await
        .expect("index job");

    assert_eq!(summary.state, JobState::Completed);
    assert_eq!(summary.stop_reason, Some(StopReason::FrontierExhausted));
    assert_eq!(summary.counters.indexed, 1);
}

/// Extracts normally, but fires a cancel token once a given path has been processed
struct CancelAfter {
    path: &'static str,
    cancel: CancelToken,
}

impl ContentExtractor for CancelAfter {
    fn extract(&self, html: &str, url: &Url) -> Result<ExtractedContent, ExtractionError> {
        let content = HtmlExtractor.extract(html, url);
        if url.path() == self.path {
            // Give the other worker time to have its request in flight
            std::thread::sleep(Duration::from_millis(100));
            self.cancel.cancel();
        }
        content
    }
}

#[tokio::test]
async fn test_cancel_mid_crawl_drains_in_flight_pages() {
    let server = MockServer::start().await;
    mount_page(&server, "/a", "Fast", "Answers at once.", &["/c"]).await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(html_page("Slow", "Takes a while.", &[]).into_bytes(), "text/html")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (_dir, indexer) = open_indexer();
    let cancel = CancelToken::new();
    let indexer = indexer.with_extractor(Arc::new(CancelAfter {
        path: "/a",
        cancel: cancel.clone(),
    }));

    let mut config = site_config(&server, "draining", "");
    config.site.seeds = vec![url_on(&server, "/a"), url_on(&server, "/b")];
    config.politeness.max_workers = 2;

    let summary = indexer
        .run_index_with_cancel(config, cancel)
        .await
        .expect("index job");

    assert_eq!(summary.state, JobState::Cancelled);
    assert_eq!(summary.stop_reason, Some(StopReason::Cancelled));
    // The slow page was already being fetched and is still stored
    assert_eq!(summary.counters.fetched, 2);
    assert_eq!(summary.counters.indexed, 2);
    assert!(indexer
        .get_page("draining", &url_on(&server, "/b"))
        .expect("page lookup")
        .is_some());
}

#[tokio::test]
async fn test_storage_failure_fails_the_job() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let dir = tempfile::TempDir::new().expect("temp dir");
    let db_path = dir.path().join("index.db");
    let indexer = SiteIndexer::open(&db_path).expect("open indexer");
    let config = site_config(&server, "doomed", "");
    indexer.plan_index(&config).expect("plan");

    // Every page write is rejected from here on
    let conn = rusqlite::Connection::open(&db_path).expect("second connection");
    conn.execute_batch(
        "CREATE TRIGGER reject_pages BEFORE INSERT ON pages
         BEGIN SELECT RAISE(ABORT, 'disk is full'); END;",
    )
    .expect("install trigger");
    drop(conn);

    let result = indexer.run_index(config).await;
    assert!(matches!(result, Err(IndexerError::Storage(_))));

    let jobs = indexer.recent_jobs("doomed", 1).expect("recent jobs");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].state, JobState::Failed);
    assert_eq!(jobs[0].stop_reason, Some(StopReason::StorageFailure));
    assert!(jobs[0]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("disk is full")));
    assert!(jobs[0].finished_at.is_some());
}
