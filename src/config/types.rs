use serde::{Deserialize, Serialize};

/// Complete description of one indexed site
///
/// Loaded from TOML and persisted with the Site row so a refresh can rerun the same crawl.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteConfig {
    pub site: SiteSection,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Site identity and seeds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteSection {
    /// Unique site name used to address the site after indexing
    pub name: String,

    /// Base URL of the site; the default seed and the origin for scope checks
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Extra seed URLs; when empty the base URL is the only seed
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Also seed the frontier from `<origin>/sitemap.xml`
    #[serde(rename = "seed-from-sitemap", default)]
    pub seed_from_sitemap: bool,
}

impl SiteSection {
    /// Seeds to start from, falling back to the base URL
    pub fn seed_urls(&self) -> Vec<String> {
        if self.seeds.is_empty() {
            vec![self.base_url.clone()]
        } else {
            self.seeds.clone()
        }
    }
}

/// Which URLs a crawl may visit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScopeConfig {
    /// Path prefixes a URL must start with
    #[serde(rename = "allowed-prefixes", default = "default_prefixes")]
    pub allowed_prefixes: Vec<String>,

    /// Deepest level whose outbound links are followed (seeds are depth 0)
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of fetches per job
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Whether links to other hosts may be followed
    #[serde(rename = "follow-external", default)]
    pub follow_external: bool,

    /// Regexes a URL must match one of (ignored when empty)
    #[serde(default)]
    pub include: Vec<String>,

    /// Regexes that exclude any URL they match
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            allowed_prefixes: default_prefixes(),
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            follow_external: false,
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

/// Politeness limits applied while fetching
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolitenessConfig {
    /// Global worker cap for a job
    #[serde(rename = "max-workers", default = "default_max_workers")]
    pub max_workers: u32,

    /// Maximum concurrent requests to one host; unset means 2, or `max-workers` if lower
    #[serde(
        rename = "per-host-concurrency",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub per_host_concurrency: Option<u32>,

    /// Minimum time between request starts to the same host (milliseconds)
    #[serde(rename = "delay-ms", default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Whether robots.txt is fetched and obeyed
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,
}

impl PolitenessConfig {
    /// Concurrent requests allowed per host
    ///
    /// An explicit setting is used as is; the default never exceeds `max-workers`.
    pub fn per_host_limit(&self) -> u32 {
        self.per_host_concurrency
            .unwrap_or_else(|| default_per_host_concurrency().min(self.max_workers))
    }
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            per_host_concurrency: None,
            delay_ms: default_delay_ms(),
            respect_robots: true,
        }
    }
}

/// Fetching, retry and frontier tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts for timeouts and connection errors
    #[serde(rename = "max-attempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Extra attempts for 5xx responses
    #[serde(rename = "server-error-retries", default = "default_server_error_retries")]
    pub server_error_retries: u32,

    /// First backoff delay (milliseconds)
    #[serde(rename = "retry-base-ms", default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Backoff multiplier per attempt
    #[serde(rename = "retry-factor", default = "default_retry_factor")]
    pub retry_factor: u32,

    /// Bounded frontier queue size
    #[serde(rename = "frontier-capacity", default = "default_frontier_capacity")]
    pub frontier_capacity: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            server_error_retries: default_server_error_retries(),
            retry_base_ms: default_retry_base_ms(),
            retry_factor: default_retry_factor(),
            frontier_capacity: default_frontier_capacity(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt product token
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl UserAgentConfig {
    /// Full User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

/// Chunker settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    /// Upper bound on chunk length in characters
    #[serde(rename = "max-chars", default = "default_max_chars")]
    pub max_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

/// Search ranking settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Result count used when the caller does not pass one
    #[serde(rename = "default-limit", default = "default_limit")]
    pub default_limit: usize,

    /// Divide term frequency by the square root of the chunk token count
    #[serde(rename = "length-normalization", default = "default_true")]
    pub length_normalization: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            length_normalization: true,
        }
    }
}

fn default_prefixes() -> Vec<String> {
    vec!["/".to_string()]
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_pages() -> u32 {
    25
}

fn default_max_workers() -> u32 {
    4
}

fn default_per_host_concurrency() -> u32 {
    2
}

fn default_delay_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_server_error_retries() -> u32 {
    1
}

fn default_retry_base_ms() -> u64 {
    500
}

fn default_retry_factor() -> u32 {
    2
}

fn default_frontier_capacity() -> usize {
    1000
}

fn default_crawler_name() -> String {
    "SiteIndexer".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_max_chars() -> usize {
    800
}

fn default_limit() -> usize {
    5
}
