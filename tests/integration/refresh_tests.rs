//! Refresh jobs: unchanged skips, changed re-indexing and tombstones

use crate::common::{mount_page, mount_small_site, mount_status, open_indexer, site_config, url_on};
use site_indexer::storage::Liveness;
use site_indexer::{IndexerError, JobKind, JobState};
use wiremock::MockServer;

const SCOPE: &str = "[scope]\nmax-depth = 1\nmax-pages = 10\n";

#[tokio::test]
async fn test_refresh_skips_unchanged_pages() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let (_dir, indexer) = open_indexer();
    indexer
        .run_index(site_config(&server, "ex-docs", SCOPE))
        .await
        .expect("index job");

    let before = indexer
        .get_page("ex-docs", &url_on(&server, "/b"))
        .expect("page lookup")
        .expect("B stored");

    let summary = indexer.refresh("ex-docs").await.expect("refresh job");

    assert_eq!(summary.kind, JobKind::Refresh);
    assert_eq!(summary.state, JobState::Completed);
    assert_eq!(summary.counters.fetched, 4);
    assert_eq!(summary.counters.skipped, 4);
    assert_eq!(summary.counters.indexed, 0);
    assert_eq!(summary.counters.tombstoned, 0);

    let after = indexer
        .get_page("ex-docs", &url_on(&server, "/b"))
        .expect("page lookup")
        .expect("B stored");
    assert_eq!(after.page.indexed_at, before.page.indexed_at);
    assert!(after.page.last_crawled_at >= before.page.last_crawled_at);
    assert_eq!(after.chunks, before.chunks);
}

#[tokio::test]
async fn test_refresh_reindexes_changed_page() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let (_dir, indexer) = open_indexer();
    indexer
        .run_index(site_config(&server, "ex-docs", SCOPE))
        .await
        .expect("index job");

    server.reset().await;
    mount_page(&server, "/", "Alpha", "Alpha introduces the guide.", &["/b", "/c"]).await;
    mount_page(&server, "/b", "Bravo", "Bravo now explains upgrades.", &["/d"]).await;
    mount_page(&server, "/c", "Charlie", "Charlie covers configuration.", &[]).await;
    mount_page(&server, "/d", "Delta", "Delta documents deployment.", &[]).await;

    let summary = indexer.refresh("ex-docs").await.expect("refresh job");
    assert_eq!(summary.counters.indexed, 1);
    assert_eq!(summary.counters.skipped, 3);

    let b = indexer
        .get_page("ex-docs", &url_on(&server, "/b"))
        .expect("page lookup")
        .expect("B stored");
    assert!(b.content_text.contains("upgrades"));
    assert!(b.chunks.iter().all(|c| !c.text.contains("installation")));

    let hits = indexer
        .search("ex-docs", "installation", None)
        .expect("search");
    assert!(hits.is_empty());
    let hits = indexer.search("ex-docs", "upgrades", None).expect("search");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].page_url, url_on(&server, "/b"));
}

#[tokio::test]
async fn test_refresh_tombstones_gone_pages() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let (_dir, indexer) = open_indexer();
    indexer
        .run_index(site_config(&server, "ex-docs", SCOPE))
        .await
        .expect("index job");
    assert_eq!(
        indexer
            .search("ex-docs", "deployment", None)
            .expect("search")
            .len(),
        1
    );

    server.reset().await;
    mount_page(&server, "/", "Alpha", "Alpha introduces the guide.", &["/b", "/c"]).await;
    mount_page(&server, "/b", "Bravo", "Bravo explains installation.", &["/d"]).await;
    mount_page(&server, "/c", "Charlie", "Charlie covers configuration.", &[]).await;
    mount_status(&server, "/d", 410).await;

    let summary = indexer.refresh("ex-docs").await.expect("refresh job");
    assert_eq!(summary.state, JobState::Completed);
    assert_eq!(summary.counters.tombstoned, 1);
    assert_eq!(summary.counters.failed, 1);
    assert_eq!(summary.counters.skipped, 3);

    assert!(indexer
        .search("ex-docs", "deployment", None)
        .expect("search")
        .is_empty());

    let d = indexer
        .get_page("ex-docs", &url_on(&server, "/d"))
        .expect("page lookup")
        .expect("D still recorded");
    assert_eq!(d.page.liveness, Liveness::Tombstoned);
    assert!(d.page.tombstoned_at.is_some());
    assert!(d.chunks.is_empty());

    let sites = indexer.list_sites().expect("list sites");
    assert_eq!(sites[0].active_pages, 3);
    assert_eq!(sites[0].tombstoned_pages, 1);

    // Already tombstoned: another refresh records nothing new
    let again = indexer.refresh("ex-docs").await.expect("refresh job");
    assert_eq!(again.counters.tombstoned, 0);

    let jobs = indexer.recent_jobs("ex-docs", 10).expect("recent jobs");
    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[0].job_id, again.job_id);
}

#[tokio::test]
async fn test_tombstoned_page_is_revived_when_it_returns() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let (_dir, indexer) = open_indexer();
    indexer
        .run_index(site_config(&server, "ex-docs", SCOPE))
        .await
        .expect("index job");

    server.reset().await;
    mount_page(&server, "/", "Alpha", "Alpha introduces the guide.", &["/b", "/c"]).await;
    mount_page(&server, "/b", "Bravo", "Bravo explains installation.", &["/d"]).await;
    mount_page(&server, "/c", "Charlie", "Charlie covers configuration.", &[]).await;
    mount_status(&server, "/d", 404).await;
    indexer.refresh("ex-docs").await.expect("refresh job");

    server.reset().await;
    mount_small_site(&server).await;
    let summary = indexer.refresh("ex-docs").await.expect("refresh job");
    assert_eq!(summary.counters.indexed, 1);

    let d = indexer
        .get_page("ex-docs", &url_on(&server, "/d"))
        .expect("page lookup")
        .expect("D stored");
    assert_eq!(d.page.liveness, Liveness::Active);
    assert!(d.page.tombstoned_at.is_none());
    assert!(!d.chunks.is_empty());
}

#[tokio::test]
async fn test_refresh_unknown_site() {
    let (_dir, indexer) = open_indexer();
    assert!(matches!(
        indexer.refresh("missing").await,
        Err(IndexerError::SiteNotFound(_))
    ));
}

#[tokio::test]
async fn test_run_index_keeps_planned_definition() {
    let server = MockServer::start().await;
    mount_small_site(&server).await;

    let (_dir, indexer) = open_indexer();
    indexer
        .plan_index(&site_config(&server, "ex-docs", SCOPE))
        .expect("plan");

    // A one-off run with a tighter budget does not replace the planned site
    indexer
        .run_index(site_config(&server, "ex-docs", "[scope]\nmax-depth = 1\nmax-pages = 1\n"))
        .await
        .expect("index job");
    assert_eq!(
        indexer
            .site_config("ex-docs")
            .expect("stored config")
            .scope
            .max_pages,
        10
    );

    let summary = indexer.refresh("ex-docs").await.expect("refresh job");
    assert_eq!(summary.counters.fetched, 4);
}
