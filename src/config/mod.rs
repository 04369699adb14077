//! Configuration module for the site indexer
//!
//! This module handles loading, parsing, and validating TOML site configurations.
//!
//! # Example
//!
//! ```no_run
//! use site_indexer::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("site.toml")).unwrap();
//! println!("Will index at most {} pages", config.scope.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ChunkingConfig, FetchConfig, PolitenessConfig, ScopeConfig, SearchConfig, SiteConfig,
    SiteSection, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, from_toml_str, load_config, load_config_with_hash, to_toml_string,
};
pub use validation::{validate, validate_site_name};
