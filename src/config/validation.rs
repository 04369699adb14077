use crate::config::types::{
    ChunkingConfig, FetchConfig, PolitenessConfig, ScopeConfig, SearchConfig, SiteConfig,
    SiteSection, UserAgentConfig,
};
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Upper bound for `max-pages`
const MAX_PAGES_LIMIT: u32 = 100_000;

/// Upper bound for `max-depth`
const MAX_DEPTH_LIMIT: u32 = 64;

/// Validates the entire configuration
pub fn validate(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_site(&config.site)?;
    validate_scope(&config.scope)?;
    validate_politeness(&config.politeness)?;
    validate_fetch(&config.fetch)?;
    validate_user_agent(&config.user_agent)?;
    validate_chunking(&config.chunking)?;
    validate_search(&config.search)?;
    Ok(())
}

/// Validates a site name: 3-33 chars, leading letter, then letters, digits, `_` or `-`
pub fn validate_site_name(name: &str) -> Result<(), ConfigError> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && (3..=33).contains(&name.len());

    if valid {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "site name must match ^[A-Za-z][A-Za-z0-9_-]{{2,32}}$, got '{}'",
            name
        )))
    }
}

fn validate_site(site: &SiteSection) -> Result<(), ConfigError> {
    validate_site_name(&site.name)?;
    validate_http_url("base-url", &site.base_url)?;

    for seed in &site.seeds {
        validate_http_url("seed", seed)?;
    }

    Ok(())
}

fn validate_http_url(what: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' has no host",
            what, value
        )));
    }

    Ok(())
}

fn validate_scope(scope: &ScopeConfig) -> Result<(), ConfigError> {
    if scope.allowed_prefixes.is_empty() {
        return Err(ConfigError::Validation(
            "allowed-prefixes cannot be empty".to_string(),
        ));
    }

    for prefix in &scope.allowed_prefixes {
        if !prefix.starts_with('/') {
            return Err(ConfigError::InvalidPattern(format!(
                "path prefix '{}' must start with '/'",
                prefix
            )));
        }
        if prefix.contains(['?', '#', ' ']) {
            return Err(ConfigError::InvalidPattern(format!(
                "path prefix '{}' may not contain '?', '#' or spaces",
                prefix
            )));
        }
    }

    if scope.max_pages < 1 || scope.max_pages > MAX_PAGES_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max-pages must be between 1 and {}, got {}",
            MAX_PAGES_LIMIT, scope.max_pages
        )));
    }

    if scope.max_depth > MAX_DEPTH_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max-depth must be <= {}, got {}",
            MAX_DEPTH_LIMIT, scope.max_depth
        )));
    }

    for pattern in scope.include.iter().chain(scope.exclude.iter()) {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid regex '{}': {}", pattern, e))
        })?;
    }

    Ok(())
}

fn validate_politeness(config: &PolitenessConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > 64 {
        return Err(ConfigError::Validation(format!(
            "max-workers must be between 1 and 64, got {}",
            config.max_workers
        )));
    }

    let per_host = config.per_host_limit();
    if per_host < 1 || per_host > config.max_workers {
        return Err(ConfigError::Validation(format!(
            "per-host-concurrency must be between 1 and max-workers ({}), got {}",
            config.max_workers, per_host
        )));
    }

    if config.delay_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "delay-ms must be <= 60000, got {}",
            config.delay_ms
        )));
    }

    Ok(())
}

fn validate_fetch(config: &FetchConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 || config.timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be between 1 and 300, got {}",
            config.timeout_secs
        )));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.server_error_retries > 5 {
        return Err(ConfigError::Validation(format!(
            "server-error-retries must be <= 5, got {}",
            config.server_error_retries
        )));
    }

    if config.retry_factor < 1 {
        return Err(ConfigError::Validation(
            "retry-factor must be >= 1".to_string(),
        ));
    }

    if config.frontier_capacity < 1 {
        return Err(ConfigError::Validation(
            "frontier-capacity must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_user_agent(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if let Some(contact) = &config.contact_url {
        Url::parse(contact)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;
    }

    Ok(())
}

fn validate_chunking(config: &ChunkingConfig) -> Result<(), ConfigError> {
    if config.max_chars < 100 || config.max_chars > 20_000 {
        return Err(ConfigError::Validation(format!(
            "max-chars must be between 100 and 20000, got {}",
            config.max_chars
        )));
    }
    Ok(())
}

fn validate_search(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.default_limit < 1 || config.default_limit > 1000 {
        return Err(ConfigError::Validation(format!(
            "default-limit must be between 1 and 1000, got {}",
            config.default_limit
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> SiteConfig {
        SiteConfig {
            site: SiteSection {
                name: "ex-docs".to_string(),
                base_url: "https://ex.com/".to_string(),
                seeds: vec![],
                seed_from_sitemap: false,
            },
            scope: ScopeConfig::default(),
            politeness: PolitenessConfig::default(),
            fetch: FetchConfig::default(),
            user_agent: UserAgentConfig::default(),
            chunking: ChunkingConfig::default(),
            search: SearchConfig::default(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn test_validate_site_name() {
        assert!(validate_site_name("docs").is_ok());
        assert!(validate_site_name("react_docs-2").is_ok());

        assert!(validate_site_name("").is_err());
        assert!(validate_site_name("ab").is_err());
        assert!(validate_site_name("1docs").is_err());
        assert!(validate_site_name("my docs").is_err());
        assert!(validate_site_name(&"a".repeat(34)).is_err());
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut config = base_config();
        config.site.base_url = "ftp://ex.com/".to_string();
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_rejects_relative_prefix() {
        let mut config = base_config();
        config.scope.allowed_prefixes = vec!["docs".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_rejects_bad_regex() {
        let mut config = base_config();
        config.scope.exclude = vec!["(unclosed".to_string()];
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_politeness_bounds() {
        let mut config = base_config();
        config.politeness.per_host_concurrency = Some(config.politeness.max_workers + 1);
        assert!(validate(&config).is_err());

        let mut config = base_config();
        config.politeness.delay_ms = 120_000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_default_per_host_concurrency_follows_max_workers() {
        let mut config = base_config();
        config.politeness.max_workers = 1;
        assert!(validate(&config).is_ok());
        assert_eq!(config.politeness.per_host_limit(), 1);

        config.politeness.per_host_concurrency = Some(2);
        assert!(validate(&config).is_err());

        let config = base_config();
        assert_eq!(config.politeness.per_host_limit(), 2);
    }

    #[test]
    fn test_page_budget_bounds() {
        let mut config = base_config();
        config.scope.max_pages = 0;
        assert!(validate(&config).is_err());
    }
}
