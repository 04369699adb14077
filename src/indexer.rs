//! Site indexer facade
//!
//! [`SiteIndexer`] is the single entry point the CLI (or any other front end) dispatches onto:
//! planning, indexing, refreshing, search and page lookup for every site in one database.

use crate::config::{from_toml_str, to_toml_string, SiteConfig};
use crate::crawler::CrawlOrchestrator;
use crate::pipeline::{ContentExtractor, HtmlExtractor};
use crate::planner::{plan, CrawlPlan};
use crate::state::{CancelToken, JobKind};
use crate::storage::{
    lock_storage, open_storage, ChunkResult, ColumnInfo, CrawlJobSummary, PageDetail,
    SharedStorage, SiteRecord, SiteSummary, Storage, TableSummary,
};
use crate::url::canonicalize;
use crate::{IndexerError, Result};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Indexes sites into one SQLite database and answers queries over it
#[derive(Clone)]
pub struct SiteIndexer {
    storage: SharedStorage,
    extractor: Arc<dyn ContentExtractor>,
}

impl std::fmt::Debug for SiteIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteIndexer")
            .field("storage", &self.storage)
            .finish()
    }
}

impl SiteIndexer {
    /// Opens (or creates) the index database at `path`
    ///
    /// Missing parent directories are created.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use site_indexer::SiteIndexer;
    /// use std::path::Path;
    ///
    /// let indexer = SiteIndexer::open(Path::new(".siteindexer/siteindexer.db")).unwrap();
    /// for site in indexer.list_sites().unwrap() {
    ///     println!("{}: {} pages", site.name, site.active_pages);
    /// }
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let storage = open_storage(path)?;
        debug!("Opened index database at {}", path.display());

        Ok(Self {
            storage: Arc::new(Mutex::new(storage)),
            extractor: Arc::new(HtmlExtractor),
        })
    }

    /// Replaces the main-content extractor used by subsequent jobs
    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Validates a configuration, records it as the site's definition and describes the job
    /// it would run
    ///
    /// The site is created on its first plan; planning again replaces its stored
    /// configuration. Nothing is fetched.
    pub fn plan_index(&self, config: &SiteConfig) -> Result<CrawlPlan> {
        let crawl_plan = plan(config)?;

        let config_toml = to_toml_string(config)?;
        let site = lock_storage(&self.storage)?.upsert_site(
            &config.site.name,
            &config.site.base_url,
            &config_toml,
        )?;
        debug!("Stored plan for site '{}' (id {})", site.name, site.id);

        Ok(crawl_plan)
    }

    /// Indexes a site, blocking until the job is terminal
    ///
    /// A site seen for the first time is created with this configuration so it can later be
    /// refreshed by name. The stored definition of an existing site is left as it is; only
    /// [`SiteIndexer::plan_index`] changes it.
    pub async fn run_index(&self, config: SiteConfig) -> Result<CrawlJobSummary> {
        self.run_index_with_cancel(config, CancelToken::new()).await
    }

    /// Like [`SiteIndexer::run_index`], stopping early once `cancel` fires
    pub async fn run_index_with_cancel(
        &self,
        config: SiteConfig,
        cancel: CancelToken,
    ) -> Result<CrawlJobSummary> {
        plan(&config)?;

        let config_toml = to_toml_string(&config)?;
        let site = lock_storage(&self.storage)?.ensure_site(
            &config.site.name,
            &config.site.base_url,
            &config_toml,
        )?;
        if site.config_toml != config_toml {
            warn!(
                "Configuration for '{}' differs from its stored plan; plan again to replace it",
                site.name
            );
        }

        info!("Indexing site '{}' from {}", site.name, site.base_url);
        self.orchestrator(config, &site)
            .run(JobKind::Index, cancel)
            .await
    }

    /// Re-crawls a stored site, skipping unchanged pages and tombstoning vanished ones
    pub async fn refresh(&self, site_name: &str) -> Result<CrawlJobSummary> {
        self.refresh_with_cancel(site_name, CancelToken::new()).await
    }

    /// Like [`SiteIndexer::refresh`], stopping early once `cancel` fires
    pub async fn refresh_with_cancel(
        &self,
        site_name: &str,
        cancel: CancelToken,
    ) -> Result<CrawlJobSummary> {
        let (site, config) = self.site_with_config(site_name)?;

        info!("Refreshing site '{}'", site.name);
        self.orchestrator(config, &site)
            .run(JobKind::Refresh, cancel)
            .await
    }

    /// Ranked chunks of a site matching `query`
    ///
    /// `limit` defaults to the site's configured `default-limit`.
    pub fn search(
        &self,
        site_name: &str,
        query: &str,
        limit: Option<usize>,
    ) -> Result<Vec<ChunkResult>> {
        let (site, config) = self.site_with_config(site_name)?;
        let limit = limit.unwrap_or(config.search.default_limit);

        let results = lock_storage(&self.storage)?.search(
            site.id,
            query,
            limit,
            config.search.length_normalization,
        )?;

        debug!(
            "Search '{}' on '{}' returned {} chunks",
            query,
            site_name,
            results.len()
        );
        Ok(results)
    }

    /// A stored page with its text and ordered chunks
    ///
    /// The URL is canonicalized before lookup. Tombstoned pages are returned too, with no
    /// chunks; `Ok(None)` means the site never stored the URL.
    pub fn get_page(&self, site_name: &str, url: &str) -> Result<Option<PageDetail>> {
        let site = self.site(site_name)?;
        let url = canonicalize(url)?;
        Ok(lock_storage(&self.storage)?.get_page_detail(site.id, url.as_str())?)
    }

    /// Every stored site with page and chunk counts
    pub fn list_sites(&self) -> Result<Vec<SiteSummary>> {
        Ok(lock_storage(&self.storage)?.list_sites()?)
    }

    /// A crawl job by id
    pub fn get_job(&self, job_id: i64) -> Result<Option<CrawlJobSummary>> {
        Ok(lock_storage(&self.storage)?.get_job(job_id)?)
    }

    /// The most recent jobs of a site, newest first
    pub fn recent_jobs(&self, site_name: &str, limit: usize) -> Result<Vec<CrawlJobSummary>> {
        let site = self.site(site_name)?;
        Ok(lock_storage(&self.storage)?.recent_jobs(site.id, limit)?)
    }

    /// Tables of the index database with row counts
    pub fn list_tables(&self) -> Result<Vec<TableSummary>> {
        Ok(lock_storage(&self.storage)?.list_tables()?)
    }

    /// Column layout of one table; `None` for a name that is not a table of the database
    pub fn describe_table(&self, table: &str) -> Result<Option<Vec<ColumnInfo>>> {
        Ok(lock_storage(&self.storage)?.describe_table(table)?)
    }

    fn site(&self, site_name: &str) -> Result<SiteRecord> {
        lock_storage(&self.storage)?
            .get_site(site_name)?
            .ok_or_else(|| IndexerError::SiteNotFound(site_name.to_string()))
    }

    /// The stored configuration of a site, as last planned
    pub fn site_config(&self, site_name: &str) -> Result<SiteConfig> {
        Ok(self.site_with_config(site_name)?.1)
    }

    fn site_with_config(&self, site_name: &str) -> Result<(SiteRecord, SiteConfig)> {
        let site = self.site(site_name)?;
        let config = from_toml_str(&site.config_toml)?;
        Ok((site, config))
    }

    fn orchestrator(&self, config: SiteConfig, site: &SiteRecord) -> CrawlOrchestrator {
        CrawlOrchestrator::new(config, site.id, self.storage.clone())
            .with_extractor(self.extractor.clone())
    }
}
