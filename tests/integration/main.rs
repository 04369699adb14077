//! Integration tests for the site indexer
//!
//! These tests use wiremock to stand up mock sites and run full index and refresh jobs
//! end-to-end against a temporary database.

mod common;
mod crawl_tests;
mod refresh_tests;
mod search_tests;
