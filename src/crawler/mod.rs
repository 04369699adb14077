//! Crawler module for discovering and fetching a site's pages
//!
//! This module contains the core crawling logic, including:
//! - The bounded, deduplicating URL frontier
//! - HTTP fetching with robots compliance, per-host politeness and retry logic
//! - Sitemap discovery
//! - Overall job orchestration

mod coordinator;
mod fetcher;
pub mod frontier;
mod politeness;
mod retry;
pub mod sitemap;

pub use coordinator::CrawlOrchestrator;
pub use fetcher::{build_http_client, http_fetch, FetchError, FetcherPool, RawResponse};
pub use frontier::{AddOutcome, Frontier, FrontierCounts, FrontierEntry, Rejection};
pub use politeness::{HostLimiter, HostPermit};
pub use retry::{random_jitter, RetryDecision, RetryPolicy};
pub use sitemap::{
    decode_sitemap_body, discover_sitemap_urls, parse_sitemap, SitemapDocument,
};
