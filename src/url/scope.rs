use crate::config::SiteConfig;
use crate::url::domain::host_key;
use crate::ConfigError;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Why a URL fell outside the scope rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeExclusion {
    /// Host is not the site's host and external links are not followed
    ExternalHost,
    /// Path does not start with any allowed prefix
    OutsidePrefix,
    /// An exclude pattern matched
    ExcludePattern,
    /// Include patterns exist and none matched
    NotIncluded,
}

/// Compiled scope rule for one site
///
/// Checks are evaluated in order: host, path prefix, exclude patterns, include patterns.
/// Prefixes only constrain URLs on the site's own hosts; when external links are followed,
/// foreign hosts are subject to the patterns alone.
#[derive(Debug, Clone)]
pub struct ScopeRule {
    hosts: HashSet<String>,
    prefixes: Vec<String>,
    follow_external: bool,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl ScopeRule {
    /// Builds a scope rule from a validated site configuration
    ///
    /// The site's hosts are the base URL's host plus the host of every configured seed.
    pub fn from_config(config: &SiteConfig) -> Result<Self, ConfigError> {
        let mut hosts = HashSet::new();
        for raw in std::iter::once(&config.site.base_url).chain(config.site.seeds.iter()) {
            let url = Url::parse(raw)
                .map_err(|e| ConfigError::InvalidUrl(format!("'{}': {}", raw, e)))?;
            let key = host_key(&url)
                .ok_or_else(|| ConfigError::InvalidUrl(format!("'{}' has no host", raw)))?;
            hosts.insert(key);
        }

        let compile = |patterns: &[String]| -> Result<Vec<Regex>, ConfigError> {
            patterns
                .iter()
                .map(|p| {
                    Regex::new(p).map_err(|e| {
                        ConfigError::InvalidPattern(format!("Invalid regex '{}': {}", p, e))
                    })
                })
                .collect()
        };

        Ok(Self {
            hosts,
            prefixes: config
                .scope
                .allowed_prefixes
                .iter()
                .map(|p| p.trim_end_matches('/').to_string())
                .collect(),
            follow_external: config.scope.follow_external,
            include: compile(&config.scope.include)?,
            exclude: compile(&config.scope.exclude)?,
        })
    }

    /// Checks a canonical URL against the rule
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The URL is in scope
    /// * `Err(ScopeExclusion)` - The first check the URL failed
    pub fn check(&self, url: &Url) -> Result<(), ScopeExclusion> {
        let own_host = host_key(url)
            .map(|key| self.hosts.contains(&key))
            .unwrap_or(false);

        if !own_host && !self.follow_external {
            return Err(ScopeExclusion::ExternalHost);
        }

        if own_host && !self.prefixes.iter().any(|p| path_has_prefix(url.path(), p)) {
            return Err(ScopeExclusion::OutsidePrefix);
        }

        let text = url.as_str();
        if self.exclude.iter().any(|re| re.is_match(text)) {
            return Err(ScopeExclusion::ExcludePattern);
        }

        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(text)) {
            return Err(ScopeExclusion::NotIncluded);
        }

        Ok(())
    }

    /// Returns true if the URL is in scope
    pub fn allows(&self, url: &Url) -> bool {
        self.check(url).is_ok()
    }
}

/// Segment-aware prefix test: `/docs` matches `/docs` and `/docs/a`, not `/docsearch`
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
