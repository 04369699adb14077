//! Crawl orchestrator - drives one crawl job to a terminal state
//!
//! This module contains the job loop that coordinates all aspects of one crawl, including:
//! - Recording the job lifecycle (`Planned → Running → Completed|Cancelled|Failed`)
//! - Seeding the frontier (configured seeds, sitemaps, or the stored page set on refresh)
//! - Running a fixed pool of workers that fetch, process and reconcile pages with storage
//! - Tombstoning pages confirmed gone
//! - Producing the job summary
//!
//! Per-URL failures are recorded as crawl states and never end the job. Only a storage
//! failure does: the frontier is halted, in-flight work drains, and the job is marked `Failed`.

use crate::config::SiteConfig;
use crate::crawler::frontier::{AddOutcome, Frontier, FrontierEntry};
use crate::crawler::sitemap::discover_sitemap_urls;
use crate::crawler::{FetchError, FetcherPool};
use crate::pipeline::{extract_and_chunk, ContentExtractor, HtmlExtractor, ProcessedPage};
use crate::state::{CancelToken, CrawlState, JobKind, JobState, StopReason};
use crate::storage::{
    lock_storage, CrawlJobSummary, JobCounters, Liveness, NewPage, SharedStorage, Storage,
    StorageError,
};
use crate::url::canonicalize;
use crate::{IndexerError, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

/// Runs crawl jobs for one site
pub struct CrawlOrchestrator {
    config: Arc<SiteConfig>,
    site_id: i64,
    storage: SharedStorage,
    extractor: Arc<dyn ContentExtractor>,
}

/// State shared by the workers of one job
struct JobContext {
    site_id: i64,
    max_depth: u32,
    max_chars: usize,
    frontier: Frontier,
    pool: FetcherPool,
    storage: SharedStorage,
    extractor: Arc<dyn ContentExtractor>,
    fetched: AtomicU32,
    tombstoned: AtomicU32,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator for a site already stored under `site_id`
    ///
    /// # Arguments
    ///
    /// * `config` - The validated site configuration
    /// * `site_id` - Row id of the site in storage
    /// * `storage` - Storage shared with the caller
    pub fn new(config: SiteConfig, site_id: i64, storage: SharedStorage) -> Self {
        Self {
            config: Arc::new(config),
            site_id,
            storage,
            extractor: Arc::new(HtmlExtractor),
        }
    }

    /// Replaces the main-content extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Runs one job until it reaches a terminal state
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlJobSummary)` - The job completed or was cancelled; per-URL failures are
    ///   reported in the counters
    /// * `Err(IndexerError)` - Storage failed; the job is recorded as `Failed`
    pub async fn run(&self, kind: JobKind, cancel: CancelToken) -> Result<CrawlJobSummary> {
        let frontier = Frontier::from_config(&self.config, cancel.clone())?;
        let pool = FetcherPool::new(&self.config)?;

        let job_id = {
            let mut storage = lock_storage(&self.storage)?;
            let job_id = storage.create_job(self.site_id, kind)?;
            storage.mark_job_running(job_id)?;
            job_id
        };

        info!(
            "Starting {} job {} for site '{}'",
            kind, job_id, self.config.site.name
        );
        let start_time = Instant::now();

        let context = Arc::new(JobContext {
            site_id: self.site_id,
            max_depth: self.config.scope.max_depth,
            max_chars: self.config.chunking.max_chars,
            frontier,
            pool,
            storage: self.storage.clone(),
            extractor: self.extractor.clone(),
            fetched: AtomicU32::new(0),
            tombstoned: AtomicU32::new(0),
        });

        let outcome = match self.seed(&context, kind).await {
            Ok(()) => self.run_workers(&context).await,
            Err(e) => Err(e),
        };

        let counts = context.frontier.counts();
        let counters = JobCounters {
            discovered: counts.discovered,
            fetched: context.fetched.load(Ordering::Relaxed),
            indexed: counts.indexed,
            skipped: counts.skipped,
            failed: counts.failed,
            excluded: counts.excluded,
            tombstoned: context.tombstoned.load(Ordering::Relaxed),
        };

        if let Err(e) = outcome {
            error!("Job {} failed: {}", job_id, e);
            let message = e.to_string();
            let stop_reason = match e {
                IndexerError::Task(_) => StopReason::WorkerFailure,
                _ => StopReason::StorageFailure,
            };
            match lock_storage(&self.storage) {
                Ok(mut storage) => {
                    if let Err(finish_error) = storage.finish_job(
                        job_id,
                        JobState::Failed,
                        Some(stop_reason),
                        &counters,
                        Some(&message),
                    ) {
                        error!("Could not record failure of job {}: {}", job_id, finish_error);
                    }
                }
                Err(lock_error) => {
                    error!("Could not record failure of job {}: {}", job_id, lock_error)
                }
            }
            return Err(e);
        }

        let stop_reason = context.frontier.stop_reason();
        let summary = {
            let mut storage = lock_storage(&self.storage)?;
            storage.finish_job(
                job_id,
                stop_reason.final_state(),
                Some(stop_reason),
                &counters,
                None,
            )?;
            storage
                .get_job(job_id)?
                .ok_or(StorageError::JobNotFound(job_id))?
        };

        info!(
            "Job {} {} ({}): {} indexed, {} unchanged, {} failed, {} excluded, {} tombstoned in {:?}",
            job_id,
            summary.state,
            stop_reason,
            counters.indexed,
            counters.skipped,
            counters.failed,
            counters.excluded,
            counters.tombstoned,
            start_time.elapsed()
        );

        Ok(summary)
    }

    /// Fills the frontier before any worker starts
    ///
    /// Index jobs start from the configured seeds (and sitemaps when enabled). Refresh jobs
    /// additionally re-enqueue every active page at its stored depth.
    async fn seed(&self, context: &JobContext, kind: JobKind) -> Result<()> {
        let mut seeds: Vec<(Url, u32)> = Vec::new();

        for raw in self.config.site.seed_urls() {
            seeds.push((canonicalize(&raw)?, 0));
        }

        if kind == JobKind::Refresh {
            let pages = lock_storage(&self.storage)?.active_pages(self.site_id)?;
            debug!("Refresh re-seeding {} active pages", pages.len());
            for page in pages {
                match Url::parse(&page.url) {
                    Ok(url) => seeds.push((url, page.depth)),
                    Err(e) => warn!("Stored page URL {} is invalid: {}", page.url, e),
                }
            }
        }

        if self.config.site.seed_from_sitemap {
            let base = canonicalize(&self.config.site.base_url)?;
            for url in discover_sitemap_urls(&context.pool, &base).await {
                seeds.push((url, 0));
            }
        }

        for (url, depth) in seeds {
            if let AddOutcome::Excluded(reason) = context.frontier.add(&url, depth, None).await {
                debug!("Seed {} excluded: {:?}", url, reason);
            }
        }

        Ok(())
    }

    /// Runs the worker pool until the frontier stops yielding
    async fn run_workers(&self, context: &Arc<JobContext>) -> Result<()> {
        let workers = self.config.politeness.max_workers.max(1);
        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            let context = context.clone();
            set.spawn(async move { worker(worker_id, context).await });
        }

        let mut failure: Option<IndexerError> = None;
        while let Some(joined) = set.join_next().await {
            let result = match joined {
                Ok(result) => result.map_err(IndexerError::from),
                Err(e) => Err(IndexerError::Task(e.to_string())),
            };
            if let Err(e) = result {
                context.frontier.halt();
                failure.get_or_insert(e);
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// One worker: pull, process, record, repeat
///
/// Each URL is processed in its own task, so a panic while handling one page marks that page
/// `Failed` and the worker moves on.
async fn worker(worker_id: u32, context: Arc<JobContext>) -> std::result::Result<(), StorageError> {
    while let Some(entry) = context.frontier.next().await {
        let key = entry.key().to_string();
        let task = {
            let context = context.clone();
            tokio::spawn(async move { process_url(&context, &entry).await })
        };

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("[worker {}] processing {} aborted: {}", worker_id, key, e);
                Ok(CrawlState::Failed)
            }
        };

        match outcome {
            Ok(state) => {
                debug!("[worker {}] {} -> {}", worker_id, key, state);
                context.frontier.complete(&key, state);
            }
            Err(e) => {
                error!("[worker {}] storage failure on {}: {}", worker_id, key, e);
                context.frontier.complete(&key, CrawlState::Failed);
                context.frontier.halt();
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Processes a single URL and returns its terminal crawl state
///
/// This function:
/// 1. Fetches the page through the fetcher pool
/// 2. Tombstones the stored page on a terminal 404/410
/// 3. Runs the content pipeline off the async threads
/// 4. Skips unchanged content or writes the new version with its chunks
/// 5. Enqueues outbound links when the page is shallow enough
async fn process_url(
    context: &JobContext,
    entry: &FrontierEntry,
) -> std::result::Result<CrawlState, StorageError> {
    let url = &entry.url;

    let raw = match context.pool.fetch(url).await {
        Ok(raw) => raw,
        Err(FetchError::RobotsDisallowed) => {
            debug!("{} disallowed by robots.txt", url);
            return Ok(CrawlState::Excluded);
        }
        Err(e) if e.is_gone() => {
            let tombstoned = lock_storage(&context.storage)?.tombstone_page(
                context.site_id,
                url.as_str(),
                Utc::now(),
            )?;
            if tombstoned {
                info!("Tombstoned {} ({})", url, e);
                context.tombstoned.fetch_add(1, Ordering::Relaxed);
            }
            return Ok(CrawlState::Failed);
        }
        Err(e) => {
            debug!("Fetch failed for {}: {}", url, e);
            return Ok(CrawlState::Failed);
        }
    };
    context.fetched.fetch_add(1, Ordering::Relaxed);

    let status = raw.status;
    let processed = {
        let extractor = context.extractor.clone();
        let page_url = url.clone();
        let max_chars = context.max_chars;
        tokio::task::spawn_blocking(move || {
            extract_and_chunk(extractor.as_ref(), &raw, &page_url, max_chars)
        })
        .await
    };

    let processed: ProcessedPage = match processed {
        Ok(Ok(page)) => page,
        Ok(Err(e)) => {
            debug!("Extraction failed for {}: {}", url, e);
            return Ok(CrawlState::Failed);
        }
        Err(e) => {
            warn!("Content processing panicked for {}: {}", url, e);
            return Ok(CrawlState::Failed);
        }
    };

    let state = reconcile(context, entry, status, &processed)?;

    if entry.depth <= context.max_depth {
        for link in &processed.links {
            context.frontier.add(link, entry.depth + 1, Some(url)).await;
        }
    }

    Ok(state)
}

/// Compares a processed page with its stored version and writes what changed
fn reconcile(
    context: &JobContext,
    entry: &FrontierEntry,
    status: u16,
    processed: &ProcessedPage,
) -> std::result::Result<CrawlState, StorageError> {
    let now = Utc::now();
    let mut storage = lock_storage(&context.storage)?;

    let existing = storage.get_page(context.site_id, entry.key())?;
    if let Some(page) = existing {
        if page.liveness == Liveness::Active && page.content_hash == processed.content_hash {
            storage.touch_page(page.id, now)?;
            return Ok(CrawlState::SkippedUnchanged);
        }
    }

    storage.upsert_page(
        context.site_id,
        &NewPage {
            url: entry.key(),
            title: processed.title.as_deref(),
            published: processed.published.as_deref(),
            status_code: status,
            content_hash: &processed.content_hash,
            content_text: &processed.text,
            depth: entry.depth,
            crawled_at: now,
        },
        &processed.chunks,
    )?;

    Ok(CrawlState::Indexed)
}
