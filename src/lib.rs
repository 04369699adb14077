//! Site Indexer: crawl, extract, chunk and search a web site
//!
//! This crate discovers the pages of a site within a scope rule, extracts their main text,
//! splits it into citeable chunks and keeps a SQLite index of pages and chunks that converges
//! to the live site on every refresh.

pub mod config;
pub mod crawler;
pub mod indexer;
pub mod output;
pub mod pipeline;
pub mod planner;
pub mod robots;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for indexer operations
///
/// Per-URL failures never surface here; they are recorded as crawl states. Only configuration
/// problems, storage failures and lookups of unknown sites escape a job.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Unknown site: {0}")]
    SiteNotFound(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Task(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for indexer operations
pub type Result<T> = std::result::Result<T, IndexerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::SiteConfig;
pub use indexer::SiteIndexer;
pub use planner::{plan, CrawlPlan};
pub use state::{CancelToken, CrawlState, JobKind, JobState};
pub use storage::{ChunkResult, CrawlJobSummary, PageDetail};
pub use url::canonicalize;
