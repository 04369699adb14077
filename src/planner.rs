//! Index planner
//!
//! Validates a site configuration and summarizes what a job built from it would do, without
//! touching the network or the database. Every configuration error surfaces here, before any
//! job is created.

use crate::config::{validate, SiteConfig};
use crate::url::{canonicalize, ScopeRule};
use crate::ConfigError;
use std::time::Duration;

/// What a crawl job for a site would do
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlPlan {
    pub site_name: String,
    pub base_url: String,
    /// Canonical seed URLs, in configured order
    pub seeds: Vec<String>,
    pub seed_from_sitemap: bool,
    /// Upper bound on pages fetched by one job
    pub max_pages: u32,
    pub scope: ScopeSummary,
    pub politeness: PolitenessSummary,
    /// Non-fatal problems, such as seeds the scope rule would exclude
    pub warnings: Vec<String>,
}

/// Scope rule as planned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSummary {
    pub allowed_prefixes: Vec<String>,
    /// Deepest page whose links are followed
    pub max_depth: u32,
    pub follow_external: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

/// Politeness settings as planned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolitenessSummary {
    pub max_workers: u32,
    pub per_host_concurrency: u32,
    pub delay: Duration,
    pub respect_robots: bool,
    pub user_agent: String,
    /// Lower bound on job duration when every page lives on one host
    pub min_single_host_duration: Duration,
}

/// Plans a crawl job
///
/// # Arguments
///
/// * `config` - The site configuration to plan
///
/// # Returns
///
/// * `Ok(CrawlPlan)` - The configuration is valid
/// * `Err(ConfigError)` - The configuration is invalid; no job should be created
pub fn plan(config: &SiteConfig) -> Result<CrawlPlan, ConfigError> {
    validate(config)?;
    let scope = ScopeRule::from_config(config)?;

    let mut seeds = Vec::new();
    let mut warnings = Vec::new();
    for raw in config.site.seed_urls() {
        let url = canonicalize(&raw)
            .map_err(|e| ConfigError::InvalidUrl(format!("seed '{}': {}", raw, e)))?;
        if let Err(reason) = scope.check(&url) {
            warnings.push(format!("seed {} is out of scope ({:?})", url, reason));
        }
        seeds.push(url.to_string());
    }

    let delay = Duration::from_millis(config.politeness.delay_ms);
    let spaced_starts = config.scope.max_pages.saturating_sub(1);

    Ok(CrawlPlan {
        site_name: config.site.name.clone(),
        base_url: config.site.base_url.clone(),
        seeds,
        seed_from_sitemap: config.site.seed_from_sitemap,
        max_pages: config.scope.max_pages,
        scope: ScopeSummary {
            allowed_prefixes: config.scope.allowed_prefixes.clone(),
            max_depth: config.scope.max_depth,
            follow_external: config.scope.follow_external,
            include: config.scope.include.clone(),
            exclude: config.scope.exclude.clone(),
        },
        politeness: PolitenessSummary {
            max_workers: config.politeness.max_workers,
            per_host_concurrency: config.politeness.per_host_limit(),
            delay,
            respect_robots: config.politeness.respect_robots,
            user_agent: config.user_agent.header_value(),
            min_single_host_duration: delay * spaced_starts,
        },
        warnings,
    })
}
