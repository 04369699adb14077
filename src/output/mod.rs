//! Output module for rendering indexer results
//!
//! This module handles:
//! - Markdown rendering of crawl plans and job summaries (optionally written to a report file)
//! - Site listings
//! - Search hits and stored pages for the terminal

mod markdown;
mod results;

pub use markdown::{
    format_columns, format_plan, format_sites, format_summary, format_tables, write_report,
};
pub use results::{format_page, format_search_results};
