//! Storage trait definitions
//!
//! This module defines the storage interface used by the indexer and the crawl orchestrator.

use super::{
    ChunkRecord, ChunkResult, ColumnInfo, CrawlJobSummary, JobCounters, NewPage, PageDetail,
    PageRecord, SiteRecord, SiteSummary, TableSummary,
};
use crate::pipeline::TextChunk;
use crate::state::{JobKind, JobState, StopReason};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobState, to: JobState },

    #[error("Site not found: {0}")]
    SiteNotFound(String),

    #[error("Crawl job not found: {0}")]
    JobNotFound(i64),

    #[error("Storage lock poisoned")]
    Lock,
}

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Trait for index storage backends
pub trait Storage {
    // ===== Site Operations =====

    /// Creates the site or updates its base URL and persisted configuration
    fn upsert_site(
        &mut self,
        name: &str,
        base_url: &str,
        config_toml: &str,
    ) -> StorageResult<SiteRecord>;

    /// Creates the site if no site of that name exists; an existing site is returned unchanged
    fn ensure_site(
        &mut self,
        name: &str,
        base_url: &str,
        config_toml: &str,
    ) -> StorageResult<SiteRecord>;

    /// Gets a site by name
    fn get_site(&self, name: &str) -> StorageResult<Option<SiteRecord>>;

    /// Lists all sites with their index statistics, ordered by name
    fn list_sites(&self) -> StorageResult<Vec<SiteSummary>>;

    // ===== Page Operations =====

    /// Gets a page by its canonical URL, whatever its liveness
    fn get_page(&self, site_id: i64, url: &str) -> StorageResult<Option<PageRecord>>;

    /// Gets all active pages of a site, ordered by depth then URL
    fn active_pages(&self, site_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Writes a page version and replaces its chunk set in one transaction
    ///
    /// An existing row for the URL is revived if it was tombstoned. Either the page row and
    /// all of its chunks are written, or nothing changes.
    fn upsert_page(
        &mut self,
        site_id: i64,
        page: &NewPage<'_>,
        chunks: &[TextChunk],
    ) -> StorageResult<i64>;

    /// Records a fetch that found the content unchanged; only `last_crawled_at` moves
    fn touch_page(&mut self, page_id: i64, crawled_at: DateTime<Utc>) -> StorageResult<()>;

    /// Marks an active page as gone and drops its chunks from the searchable set
    ///
    /// Returns true if the page was active before the call.
    fn tombstone_page(
        &mut self,
        site_id: i64,
        url: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<bool>;

    /// Gets the chunks of a page ordered by ordinal
    fn get_chunks(&self, page_id: i64) -> StorageResult<Vec<ChunkRecord>>;

    /// Gets a page with its text and chunks
    fn get_page_detail(&self, site_id: i64, url: &str) -> StorageResult<Option<PageDetail>>;

    // ===== Search =====

    /// Ranks the active chunks of a site against a query
    fn search(
        &self,
        site_id: i64,
        query: &str,
        limit: usize,
        length_normalization: bool,
    ) -> StorageResult<Vec<ChunkResult>>;

    // ===== Job Operations =====

    /// Creates a job in the `Planned` state
    fn create_job(&mut self, site_id: i64, kind: JobKind) -> StorageResult<i64>;

    /// Moves a job from `Planned` to `Running`
    fn mark_job_running(&mut self, job_id: i64) -> StorageResult<()>;

    /// Moves a job into a terminal state with its final counters
    ///
    /// Fails with `InvalidTransition` if the job is already terminal.
    fn finish_job(
        &mut self,
        job_id: i64,
        state: JobState,
        stop_reason: Option<StopReason>,
        counters: &JobCounters,
        error: Option<&str>,
    ) -> StorageResult<()>;

    /// Gets a job with its site name
    fn get_job(&self, job_id: i64) -> StorageResult<Option<CrawlJobSummary>>;

    /// Gets the most recent jobs of a site, newest first
    fn recent_jobs(&self, site_id: i64, limit: usize) -> StorageResult<Vec<CrawlJobSummary>>;

    // ===== Inspection =====

    /// Lists the database tables with their row counts, ordered by name
    fn list_tables(&self) -> StorageResult<Vec<TableSummary>>;

    /// Describes the columns of a table; `None` when no such table exists
    fn describe_table(&self, table: &str) -> StorageResult<Option<Vec<ColumnInfo>>>;
}
