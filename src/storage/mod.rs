//! Storage module for persisting the index
//!
//! This module handles all database operations for the indexer, including:
//! - SQLite database initialization and schema management
//! - Sites with their persisted configuration
//! - Pages and their chunk sets, replaced transactionally
//! - Tombstones for pages confirmed gone
//! - Crawl job history
//! - Ranked chunk search
//! - Read-only table listing and column inspection

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::{JobKind, JobState, StopReason};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage shared between the facade and the workers of a running job
///
/// The lock is only ever held for the duration of one storage call, never across an `.await`.
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Opens (or creates) a storage database
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Locks shared storage, mapping a poisoned mutex to `StorageError::Lock`
pub fn lock_storage(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::Lock)
}

/// Whether a page is part of the live index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Liveness {
    Active,
    Tombstoned,
}

impl Liveness {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Tombstoned => "tombstoned",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "tombstoned" => Some(Self::Tombstoned),
            _ => None,
        }
    }
}

/// Represents a site in the database
#[derive(Debug, Clone)]
pub struct SiteRecord {
    pub id: i64,
    pub name: String,
    pub base_url: String,
    /// The site configuration serialized as TOML
    pub config_toml: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A site with index statistics, as listed by `list_sites`
#[derive(Debug, Clone)]
pub struct SiteSummary {
    pub name: String,
    pub base_url: String,
    pub active_pages: u32,
    pub tombstoned_pages: u32,
    pub chunks: u32,
    pub last_crawled_at: Option<DateTime<Utc>>,
}

/// A table of the index database with its row count
#[derive(Debug, Clone)]
pub struct TableSummary {
    pub name: String,
    pub rows: u64,
}

/// One column of a table, as reported by `PRAGMA table_info`
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub decl_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: bool,
}

/// Represents a page in the database
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub id: i64,
    pub site_id: i64,
    pub url: String,
    pub title: Option<String>,
    pub published: Option<String>,
    /// HTTP status of the last successful fetch
    pub status_code: Option<u16>,
    pub content_hash: String,
    /// Depth at which the page was last reached
    pub depth: u32,
    pub liveness: Liveness,
    pub first_indexed_at: DateTime<Utc>,
    /// When the current content version (and its chunks) was written
    pub indexed_at: DateTime<Utc>,
    pub last_crawled_at: DateTime<Utc>,
    pub tombstoned_at: Option<DateTime<Utc>>,
}

/// A page version to be written together with its chunks
#[derive(Debug, Clone)]
pub struct NewPage<'a> {
    pub url: &'a str,
    pub title: Option<&'a str>,
    pub published: Option<&'a str>,
    pub status_code: u16,
    pub content_hash: &'a str,
    pub content_text: &'a str,
    pub depth: u32,
    pub crawled_at: DateTime<Utc>,
}

/// Represents a stored chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// `"{page_id}:{ordinal}"`
    pub id: String,
    pub page_id: i64,
    pub ordinal: u32,
    pub text: String,
    /// Character offsets into the page's content text
    pub start: usize,
    pub end: usize,
}

/// A page with its stored text and ordered chunks
#[derive(Debug, Clone)]
pub struct PageDetail {
    pub page: PageRecord,
    pub content_text: String,
    pub chunks: Vec<ChunkRecord>,
}

/// One ranked search hit
#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub chunk_id: String,
    pub page_id: i64,
    pub page_url: String,
    pub page_title: Option<String>,
    pub ordinal: u32,
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub score: f64,
    pub last_crawled_at: DateTime<Utc>,
}

/// Per-job counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounters {
    /// Distinct canonical URLs the job recorded a state for
    pub discovered: u32,
    /// Responses received (2xx) from the fetcher pool
    pub fetched: u32,
    pub indexed: u32,
    pub skipped: u32,
    pub failed: u32,
    pub excluded: u32,
    /// Pages flipped to tombstoned by this job
    pub tombstoned: u32,
}

/// Outcome of a crawl job, also the row kept as job history
#[derive(Debug, Clone)]
pub struct CrawlJobSummary {
    pub job_id: i64,
    pub site: String,
    pub kind: JobKind,
    pub state: JobState,
    pub stop_reason: Option<StopReason>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub counters: JobCounters,
    pub error: Option<String>,
}

impl CrawlJobSummary {
    /// Wall-clock duration of a finished job
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}
