//! URL handling module for the site indexer
//!
//! This module provides URL canonicalization, politeness host keys and the scope rule that
//! decides which discovered URLs a crawl may visit.

mod domain;
mod normalize;
mod scope;

// Re-export main functions
pub use domain::{host_key, origin_of};
pub use normalize::{canonicalize, canonicalize_url, resolve};
pub use scope::{ScopeExclusion, ScopeRule};
