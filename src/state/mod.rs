//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: per-URL state within one job (discovered, fetching, indexed, ...)
//! - `JobState` / `JobKind` / `StopReason`: lifecycle of a crawl job
//! - `CancelToken`: job-wide cancellation flag shared with workers

mod cancel;
mod crawl_state;
mod job;

// Re-export main types
pub use cancel::CancelToken;
pub use crawl_state::CrawlState;
pub use job::{JobKind, JobState, StopReason};
