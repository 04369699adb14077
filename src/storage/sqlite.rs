//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.
//!
//! Chunk tokens are mirrored into the `chunks_fts` table (rowid = chunk id) inside the same
//! transaction that writes the chunk, so the full-text index never disagrees with `chunks`.
//! FTS5 only selects candidates; ranking is computed with [`crate::pipeline::score`].

use crate::pipeline::{query_terms, score, token_string, TextChunk};
use crate::state::{JobKind, JobState, StopReason};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    ChunkRecord, ChunkResult, ColumnInfo, CrawlJobSummary, JobCounters, Liveness, NewPage,
    PageDetail, PageRecord, SiteRecord, SiteSummary, TableSummary,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::cmp::Ordering;
use std::path::Path;

const PAGE_COLUMNS: &str = "id, site_id, url, title, published, status_code, content_hash, \
     depth, liveness, first_indexed_at, indexed_at, last_crawled_at, tombstoned_at";

const JOB_COLUMNS: &str = "j.id, s.name, j.kind, j.state, j.stop_reason, j.created_at, \
     j.started_at, j.finished_at, j.discovered, j.fetched, j.indexed, j.skipped, j.failed, \
     j.excluded, j.tombstoned, j.error";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn job_state_of(&self, job_id: i64) -> StorageResult<JobState> {
        let state: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM crawl_jobs WHERE id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()?;

        let state = state.ok_or(StorageError::JobNotFound(job_id))?;
        JobState::from_db_string(&state)
            .ok_or_else(|| StorageError::Serialization(format!("unknown job state '{}'", state)))
    }
}

/// Removes every chunk of a page from both `chunks` and the full-text index
fn delete_chunks(conn: &Connection, page_id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "DELETE FROM chunks_fts WHERE rowid IN (SELECT id FROM chunks WHERE page_id = ?1)",
        params![page_id],
    )?;
    conn.execute("DELETE FROM chunks WHERE page_id = ?1", params![page_id])?;
    Ok(())
}

fn chunk_key(page_id: i64, ordinal: u32) -> String {
    format!("{}:{}", page_id, ordinal)
}

/// Raw page row; enum columns are decoded outside the row closure
struct PageRow {
    record: PageRecord,
    liveness: String,
}

fn page_row(row: &Row<'_>) -> rusqlite::Result<PageRow> {
    Ok(PageRow {
        record: PageRecord {
            id: row.get(0)?,
            site_id: row.get(1)?,
            url: row.get(2)?,
            title: row.get(3)?,
            published: row.get(4)?,
            status_code: row.get(5)?,
            content_hash: row.get(6)?,
            depth: row.get(7)?,
            liveness: Liveness::Active,
            first_indexed_at: row.get(9)?,
            indexed_at: row.get(10)?,
            last_crawled_at: row.get(11)?,
            tombstoned_at: row.get(12)?,
        },
        liveness: row.get(8)?,
    })
}

impl PageRow {
    fn decode(self) -> StorageResult<PageRecord> {
        let liveness = Liveness::from_db_string(&self.liveness).ok_or_else(|| {
            StorageError::Serialization(format!("unknown liveness '{}'", self.liveness))
        })?;
        Ok(PageRecord {
            liveness,
            ..self.record
        })
    }
}

/// Raw job row; enum columns are decoded outside the row closure
struct JobRow {
    job_id: i64,
    site: String,
    kind: String,
    state: String,
    stop_reason: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    counters: JobCounters,
    error: Option<String>,
}

fn job_row(row: &Row<'_>) -> rusqlite::Result<JobRow> {
    Ok(JobRow {
        job_id: row.get(0)?,
        site: row.get(1)?,
        kind: row.get(2)?,
        state: row.get(3)?,
        stop_reason: row.get(4)?,
        created_at: row.get(5)?,
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
        counters: JobCounters {
            discovered: row.get(8)?,
            fetched: row.get(9)?,
            indexed: row.get(10)?,
            skipped: row.get(11)?,
            failed: row.get(12)?,
            excluded: row.get(13)?,
            tombstoned: row.get(14)?,
        },
        error: row.get(15)?,
    })
}

impl JobRow {
    fn decode(self) -> StorageResult<CrawlJobSummary> {
        let bad = |what: &str, value: &str| {
            StorageError::Serialization(format!("unknown job {} '{}'", what, value))
        };

        let kind = JobKind::from_db_string(&self.kind).ok_or_else(|| bad("kind", &self.kind))?;
        let state =
            JobState::from_db_string(&self.state).ok_or_else(|| bad("state", &self.state))?;
        let stop_reason = match &self.stop_reason {
            Some(s) => Some(StopReason::from_db_string(s).ok_or_else(|| bad("stop reason", s))?),
            None => None,
        };

        Ok(CrawlJobSummary {
            job_id: self.job_id,
            site: self.site,
            kind,
            state,
            stop_reason,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            counters: self.counters,
            error: self.error,
        })
    }
}

/// Search ordering: score desc, last crawled desc, ordinal asc, then page id for a total order
fn rank_order(a: &ChunkResult, b: &ChunkResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.last_crawled_at.cmp(&a.last_crawled_at))
        .then_with(|| a.ordinal.cmp(&b.ordinal))
        .then_with(|| a.page_id.cmp(&b.page_id))
}

impl Storage for SqliteStorage {
    // ===== Site Operations =====

    fn upsert_site(
        &mut self,
        name: &str,
        base_url: &str,
        config_toml: &str,
    ) -> StorageResult<SiteRecord> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO sites (name, base_url, config_toml, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(name) DO UPDATE SET
                base_url = excluded.base_url,
                config_toml = excluded.config_toml,
                updated_at = excluded.updated_at",
            params![name, base_url, config_toml, now],
        )?;

        self.get_site(name)?
            .ok_or_else(|| StorageError::SiteNotFound(name.to_string()))
    }

    fn ensure_site(
        &mut self,
        name: &str,
        base_url: &str,
        config_toml: &str,
    ) -> StorageResult<SiteRecord> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO sites (name, base_url, config_toml, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(name) DO NOTHING",
            params![name, base_url, config_toml, now],
        )?;

        self.get_site(name)?
            .ok_or_else(|| StorageError::SiteNotFound(name.to_string()))
    }

    fn get_site(&self, name: &str) -> StorageResult<Option<SiteRecord>> {
        let site = self
            .conn
            .query_row(
                "SELECT id, name, base_url, config_toml, created_at, updated_at
                 FROM sites WHERE name = ?1",
                params![name],
                |row| {
                    Ok(SiteRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        base_url: row.get(2)?,
                        config_toml: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(site)
    }

    fn list_sites(&self) -> StorageResult<Vec<SiteSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.name, s.base_url,
                (SELECT COUNT(*) FROM pages p WHERE p.site_id = s.id AND p.liveness = 'active'),
                (SELECT COUNT(*) FROM pages p WHERE p.site_id = s.id AND p.liveness = 'tombstoned'),
                (SELECT COUNT(*) FROM chunks c JOIN pages p ON p.id = c.page_id
                    WHERE p.site_id = s.id),
                (SELECT MAX(p.last_crawled_at) FROM pages p WHERE p.site_id = s.id)
             FROM sites s ORDER BY s.name",
        )?;

        let sites = stmt
            .query_map([], |row| {
                Ok(SiteSummary {
                    name: row.get(0)?,
                    base_url: row.get(1)?,
                    active_pages: row.get(2)?,
                    tombstoned_pages: row.get(3)?,
                    chunks: row.get(4)?,
                    last_crawled_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sites)
    }

    // ===== Page Operations =====

    fn get_page(&self, site_id: i64, url: &str) -> StorageResult<Option<PageRecord>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM pages WHERE site_id = ?1 AND url = ?2",
                    PAGE_COLUMNS
                ),
                params![site_id, url],
                page_row,
            )
            .optional()?;

        row.map(PageRow::decode).transpose()
    }

    fn active_pages(&self, site_id: i64) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM pages WHERE site_id = ?1 AND liveness = 'active' ORDER BY depth, url",
            PAGE_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![site_id], page_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(PageRow::decode).collect()
    }

    fn upsert_page(
        &mut self,
        site_id: i64,
        page: &NewPage<'_>,
        chunks: &[TextChunk],
    ) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM pages WHERE site_id = ?1 AND url = ?2",
                params![site_id, page.url],
                |row| row.get(0),
            )
            .optional()?;

        let page_id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE pages SET title = ?2, published = ?3, status_code = ?4,
                        content_hash = ?5, content_text = ?6, depth = ?7, liveness = 'active',
                        indexed_at = ?8, last_crawled_at = ?8, tombstoned_at = NULL
                     WHERE id = ?1",
                    params![
                        id,
                        page.title,
                        page.published,
                        page.status_code,
                        page.content_hash,
                        page.content_text,
                        page.depth,
                        page.crawled_at,
                    ],
                )?;
                delete_chunks(&tx, id)?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO pages (site_id, url, title, published, status_code, content_hash,
                        content_text, depth, liveness, first_indexed_at, indexed_at, last_crawled_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'active', ?9, ?9, ?9)",
                    params![
                        site_id,
                        page.url,
                        page.title,
                        page.published,
                        page.status_code,
                        page.content_hash,
                        page.content_text,
                        page.depth,
                        page.crawled_at,
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        {
            let mut insert_chunk = tx.prepare(
                "INSERT INTO chunks (page_id, ordinal, text, start_offset, end_offset, tokens)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            let mut insert_fts =
                tx.prepare("INSERT INTO chunks_fts (rowid, tokens) VALUES (?1, ?2)")?;

            for chunk in chunks {
                let tokens = token_string(&chunk.text);
                let chunk_id = insert_chunk.insert(params![
                    page_id,
                    chunk.ordinal,
                    chunk.text,
                    chunk.start,
                    chunk.end,
                    tokens,
                ])?;
                insert_fts.execute(params![chunk_id, tokens])?;
            }
        }

        tx.commit()?;
        Ok(page_id)
    }

    fn touch_page(&mut self, page_id: i64, crawled_at: DateTime<Utc>) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE pages SET last_crawled_at = ?2 WHERE id = ?1",
            params![page_id, crawled_at],
        )?;
        Ok(())
    }

    fn tombstone_page(
        &mut self,
        site_id: i64,
        url: &str,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let tx = self.conn.transaction()?;

        let page_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM pages WHERE site_id = ?1 AND url = ?2 AND liveness = 'active'",
                params![site_id, url],
                |row| row.get(0),
            )
            .optional()?;

        let Some(page_id) = page_id else {
            return Ok(false);
        };

        tx.execute(
            "UPDATE pages SET liveness = 'tombstoned', tombstoned_at = ?2, last_crawled_at = ?2
             WHERE id = ?1",
            params![page_id, at],
        )?;
        delete_chunks(&tx, page_id)?;

        tx.commit()?;
        Ok(true)
    }

    fn get_chunks(&self, page_id: i64) -> StorageResult<Vec<ChunkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT page_id, ordinal, text, start_offset, end_offset
             FROM chunks WHERE page_id = ?1 ORDER BY ordinal",
        )?;

        let chunks = stmt
            .query_map(params![page_id], |row| {
                let page_id: i64 = row.get(0)?;
                let ordinal: u32 = row.get(1)?;
                Ok(ChunkRecord {
                    id: chunk_key(page_id, ordinal),
                    page_id,
                    ordinal,
                    text: row.get(2)?,
                    start: row.get(3)?,
                    end: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(chunks)
    }

    fn get_page_detail(&self, site_id: i64, url: &str) -> StorageResult<Option<PageDetail>> {
        let Some(page) = self.get_page(site_id, url)? else {
            return Ok(None);
        };

        let content_text: String = self.conn.query_row(
            "SELECT content_text FROM pages WHERE id = ?1",
            params![page.id],
            |row| row.get(0),
        )?;
        let chunks = self.get_chunks(page.id)?;

        Ok(Some(PageDetail {
            page,
            content_text,
            chunks,
        }))
    }

    // ===== Search =====

    fn search(
        &self,
        site_id: i64,
        query: &str,
        limit: usize,
        length_normalization: bool,
    ) -> StorageResult<Vec<ChunkResult>> {
        let terms = query_terms(query);
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let fts_query = terms
            .iter()
            .map(|t| format!("\"{}\"", t))
            .collect::<Vec<_>>()
            .join(" OR ");

        let mut stmt = self.conn.prepare(
            "SELECT c.page_id, c.ordinal, c.text, c.start_offset, c.end_offset, c.tokens,
                    p.url, p.title, p.last_crawled_at
             FROM chunks_fts f
             JOIN chunks c ON c.id = f.rowid
             JOIN pages p ON p.id = c.page_id
             WHERE chunks_fts MATCH ?1 AND p.site_id = ?2 AND p.liveness = 'active'",
        )?;

        let mut results = Vec::new();
        let rows = stmt.query_map(params![fts_query, site_id], |row| {
            let page_id: i64 = row.get(0)?;
            let ordinal: u32 = row.get(1)?;
            let tokens: String = row.get(5)?;
            Ok((
                tokens,
                ChunkResult {
                    chunk_id: chunk_key(page_id, ordinal),
                    page_id,
                    page_url: row.get(6)?,
                    page_title: row.get(7)?,
                    ordinal,
                    text: row.get(2)?,
                    start: row.get(3)?,
                    end: row.get(4)?,
                    score: 0.0,
                    last_crawled_at: row.get(8)?,
                },
            ))
        })?;

        for row in rows {
            let (tokens, mut result) = row?;
            result.score = score(&tokens, &terms, length_normalization);
            // FTS folding can admit candidates with no exact token match
            if result.score > 0.0 {
                results.push(result);
            }
        }

        results.sort_by(rank_order);
        results.truncate(limit);
        Ok(results)
    }

    // ===== Job Operations =====

    fn create_job(&mut self, site_id: i64, kind: JobKind) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO crawl_jobs (site_id, kind, state, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                site_id,
                kind.to_db_string(),
                JobState::Planned.to_db_string(),
                Utc::now()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn mark_job_running(&mut self, job_id: i64) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE crawl_jobs SET state = ?2, started_at = ?3 WHERE id = ?1 AND state = ?4",
            params![
                job_id,
                JobState::Running.to_db_string(),
                Utc::now(),
                JobState::Planned.to_db_string()
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::InvalidTransition {
                from: self.job_state_of(job_id)?,
                to: JobState::Running,
            });
        }
        Ok(())
    }

    fn finish_job(
        &mut self,
        job_id: i64,
        state: JobState,
        stop_reason: Option<StopReason>,
        counters: &JobCounters,
        error: Option<&str>,
    ) -> StorageResult<()> {
        if !state.is_terminal() {
            return Err(StorageError::InvalidTransition {
                from: self.job_state_of(job_id)?,
                to: state,
            });
        }

        let changed = self.conn.execute(
            "UPDATE crawl_jobs SET state = ?2, stop_reason = ?3, finished_at = ?4,
                discovered = ?5, fetched = ?6, indexed = ?7, skipped = ?8, failed = ?9,
                excluded = ?10, tombstoned = ?11, error = ?12
             WHERE id = ?1 AND state IN ('planned', 'running')",
            params![
                job_id,
                state.to_db_string(),
                stop_reason.map(|r| r.to_db_string()),
                Utc::now(),
                counters.discovered,
                counters.fetched,
                counters.indexed,
                counters.skipped,
                counters.failed,
                counters.excluded,
                counters.tombstoned,
                error,
            ],
        )?;

        if changed == 0 {
            return Err(StorageError::InvalidTransition {
                from: self.job_state_of(job_id)?,
                to: state,
            });
        }
        Ok(())
    }

    fn get_job(&self, job_id: i64) -> StorageResult<Option<CrawlJobSummary>> {
        let row = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM crawl_jobs j JOIN sites s ON s.id = j.site_id WHERE j.id = ?1",
                    JOB_COLUMNS
                ),
                params![job_id],
                job_row,
            )
            .optional()?;

        row.map(JobRow::decode).transpose()
    }

    fn recent_jobs(&self, site_id: i64, limit: usize) -> StorageResult<Vec<CrawlJobSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM crawl_jobs j JOIN sites s ON s.id = j.site_id
             WHERE j.site_id = ?1 ORDER BY j.id DESC LIMIT ?2",
            JOB_COLUMNS
        ))?;

        let rows = stmt
            .query_map(params![site_id, limit], job_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(JobRow::decode).collect()
    }

    // ===== Inspection =====

    fn list_tables(&self) -> StorageResult<Vec<TableSummary>> {
        let names = self.table_names()?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let rows: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_identifier(&name)),
                [],
                |row| row.get(0),
            )?;
            tables.push(TableSummary {
                name,
                rows: u64::try_from(rows).unwrap_or_default(),
            });
        }

        Ok(tables)
    }

    fn describe_table(&self, table: &str) -> StorageResult<Option<Vec<ColumnInfo>>> {
        // Only names read back from sqlite_master reach the pragma
        let Some(name) = self.table_names()?.into_iter().find(|name| name == table) else {
            return Ok(None);
        };

        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_identifier(&name)))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    decl_type: row.get(2)?,
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    primary_key: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(columns))
    }
}

impl SqliteStorage {
    /// User tables, including the FTS table and its shadow tables
    fn table_names(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::chunk_text;
    use chrono::Duration;

    fn storage_with_site() -> (SqliteStorage, i64) {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let site = storage
            .upsert_site("docs", "https://ex.com/", "[site]\nname = \"docs\"\n")
            .unwrap();
        (storage, site.id)
    }

    fn new_page<'a>(url: &'a str, text: &'a str, hash: &'a str, at: DateTime<Utc>) -> NewPage<'a> {
        NewPage {
            url,
            title: Some("Title"),
            published: None,
            status_code: 200,
            content_hash: hash,
            content_text: text,
            depth: 0,
            crawled_at: at,
        }
    }

    fn index(storage: &mut SqliteStorage, site_id: i64, url: &str, text: &str) -> i64 {
        storage
            .upsert_page(
                site_id,
                &new_page(url, text, "h", Utc::now()),
                &chunk_text(text, 800),
            )
            .unwrap()
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteStorage::new_in_memory().is_ok());
    }

    #[test]
    fn test_upsert_site_updates_config() {
        let (mut storage, site_id) = storage_with_site();
        let updated = storage
            .upsert_site("docs", "https://ex.com/docs/", "changed")
            .unwrap();

        assert_eq!(updated.id, site_id);
        assert_eq!(updated.base_url, "https://ex.com/docs/");
        assert_eq!(updated.config_toml, "changed");
        assert!(storage.get_site("missing").unwrap().is_none());
    }

    #[test]
    fn test_ensure_site_keeps_existing_config() {
        let (mut storage, site_id) = storage_with_site();
        let before = storage.get_site("docs").unwrap().unwrap();

        let site = storage
            .ensure_site("docs", "https://other.example/", "ignored")
            .unwrap();
        assert_eq!(site.id, site_id);
        assert_eq!(site.base_url, before.base_url);
        assert_eq!(site.config_toml, before.config_toml);

        let created = storage
            .ensure_site("blog", "https://blog.ex.com/", "fresh")
            .unwrap();
        assert_ne!(created.id, site_id);
        assert_eq!(created.config_toml, "fresh");
    }

    #[test]
    fn test_upsert_page_replaces_chunks() {
        let (mut storage, site_id) = storage_with_site();
        let first = index(&mut storage, site_id, "https://ex.com/a", "one\n\ntwo\n\nthree");
        let again = index(&mut storage, site_id, "https://ex.com/a", "just one");
        assert_eq!(first, again);

        let detail = storage
            .get_page_detail(site_id, "https://ex.com/a")
            .unwrap()
            .unwrap();
        assert_eq!(detail.content_text, "just one");
        assert_eq!(detail.chunks.len(), 1);
        assert_eq!(detail.chunks[0].id, format!("{}:0", first));
        assert!(storage.search(site_id, "three", 5, true).unwrap().is_empty());
    }

    #[test]
    fn test_failed_upsert_leaves_previous_version() {
        let (mut storage, site_id) = storage_with_site();
        let url = "https://ex.com/a";
        index(&mut storage, site_id, url, "original words");

        let duplicate = vec![
            TextChunk {
                ordinal: 0,
                text: "new".to_string(),
                start: 0,
                end: 3,
            },
            TextChunk {
                ordinal: 0,
                text: "words".to_string(),
                start: 4,
                end: 9,
            },
        ];
        let result = storage.upsert_page(
            site_id,
            &new_page(url, "new words", "h2", Utc::now()),
            &duplicate,
        );
        assert!(result.is_err());

        let detail = storage.get_page_detail(site_id, url).unwrap().unwrap();
        assert_eq!(detail.page.content_hash, "h");
        assert_eq!(detail.content_text, "original words");
        assert_eq!(detail.chunks.len(), 1);
        assert_eq!(storage.search(site_id, "original", 5, true).unwrap().len(), 1);
    }

    #[test]
    fn test_tombstone_removes_chunks_and_is_idempotent() {
        let (mut storage, site_id) = storage_with_site();
        let url = "https://ex.com/gone";
        index(&mut storage, site_id, url, "vanishing content");

        assert!(storage.tombstone_page(site_id, url, Utc::now()).unwrap());
        assert!(!storage.tombstone_page(site_id, url, Utc::now()).unwrap());

        let detail = storage.get_page_detail(site_id, url).unwrap().unwrap();
        assert_eq!(detail.page.liveness, Liveness::Tombstoned);
        assert!(detail.page.tombstoned_at.is_some());
        assert!(detail.chunks.is_empty());
        assert!(storage.search(site_id, "vanishing", 5, true).unwrap().is_empty());
        assert!(storage.active_pages(site_id).unwrap().is_empty());
        assert!(!storage.tombstone_page(site_id, "https://ex.com/never", Utc::now()).unwrap());
    }

    #[test]
    fn test_upsert_revives_tombstoned_page() {
        let (mut storage, site_id) = storage_with_site();
        let url = "https://ex.com/back";
        index(&mut storage, site_id, url, "first life");
        storage.tombstone_page(site_id, url, Utc::now()).unwrap();
        index(&mut storage, site_id, url, "second life");

        let page = storage.get_page(site_id, url).unwrap().unwrap();
        assert_eq!(page.liveness, Liveness::Active);
        assert!(page.tombstoned_at.is_none());
        assert_eq!(storage.search(site_id, "second", 5, true).unwrap().len(), 1);
    }

    #[test]
    fn test_touch_page_keeps_indexed_at() {
        let (mut storage, site_id) = storage_with_site();
        let url = "https://ex.com/a";
        let page_id = index(&mut storage, site_id, url, "stable");
        let before = storage.get_page(site_id, url).unwrap().unwrap();

        let later = before.last_crawled_at + Duration::hours(1);
        storage.touch_page(page_id, later).unwrap();

        let after = storage.get_page(site_id, url).unwrap().unwrap();
        assert_eq!(after.indexed_at, before.indexed_at);
        assert_eq!(after.last_crawled_at, later);
        assert_eq!(after.depth, before.depth);
        assert_eq!(after.content_hash, before.content_hash);
        assert_eq!(after.title, before.title);
    }

    #[test]
    fn test_search_ranking_and_ties() {
        let (mut storage, site_id) = storage_with_site();
        let t0 = Utc::now();
        let older = "https://ex.com/older";
        let newer = "https://ex.com/newer";
        let other = "https://ex.com/other";

        let text = "rust guide";
        storage
            .upsert_page(site_id, &new_page(older, text, "a", t0), &chunk_text(text, 800))
            .unwrap();
        storage
            .upsert_page(
                site_id,
                &new_page(newer, text, "b", t0 + Duration::minutes(5)),
                &chunk_text(text, 800),
            )
            .unwrap();
        let dense = "rust rust";
        storage
            .upsert_page(site_id, &new_page(other, dense, "c", t0), &chunk_text(dense, 800))
            .unwrap();

        let results = storage.search(site_id, "Rust", 10, false).unwrap();
        let urls: Vec<&str> = results.iter().map(|r| r.page_url.as_str()).collect();
        assert_eq!(urls, vec![other, newer, older]);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));

        let limited = storage.search(site_id, "rust", 1, false).unwrap();
        assert_eq!(limited.len(), 1);
        assert!(storage.search(site_id, "   ", 5, false).unwrap().is_empty());
        assert!(storage.search(site_id, "python", 5, false).unwrap().is_empty());
    }

    #[test]
    fn test_search_is_scoped_to_site() {
        let (mut storage, site_id) = storage_with_site();
        let other = storage.upsert_site("blog", "https://blog.ex.com/", "").unwrap();
        index(&mut storage, site_id, "https://ex.com/a", "shared words");
        index(&mut storage, other.id, "https://blog.ex.com/a", "shared words");

        let results = storage.search(site_id, "shared", 10, true).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].page_url, "https://ex.com/a");
    }

    #[test]
    fn test_job_lifecycle() {
        let (mut storage, site_id) = storage_with_site();
        let job_id = storage.create_job(site_id, JobKind::Index).unwrap();

        let job = storage.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.state, JobState::Planned);
        assert_eq!(job.site, "docs");

        storage.mark_job_running(job_id).unwrap();
        let counters = JobCounters {
            discovered: 4,
            fetched: 4,
            indexed: 4,
            ..Default::default()
        };
        storage
            .finish_job(
                job_id,
                JobState::Completed,
                Some(StopReason::FrontierExhausted),
                &counters,
                None,
            )
            .unwrap();

        let job = storage.get_job(job_id).unwrap().unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.stop_reason, Some(StopReason::FrontierExhausted));
        assert_eq!(job.counters, counters);
        assert!(job.duration().is_some());

        let again = storage.finish_job(job_id, JobState::Failed, None, &counters, None);
        assert!(matches!(
            again,
            Err(StorageError::InvalidTransition {
                from: JobState::Completed,
                to: JobState::Failed
            })
        ));
        assert!(matches!(
            storage.mark_job_running(999),
            Err(StorageError::JobNotFound(999))
        ));
        assert_eq!(storage.recent_jobs(site_id, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_list_sites_counts() {
        let (mut storage, site_id) = storage_with_site();
        index(&mut storage, site_id, "https://ex.com/a", "alpha");
        index(&mut storage, site_id, "https://ex.com/b", "beta");
        storage
            .tombstone_page(site_id, "https://ex.com/b", Utc::now())
            .unwrap();

        let sites = storage.list_sites().unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].active_pages, 1);
        assert_eq!(sites[0].tombstoned_pages, 1);
        assert_eq!(sites[0].chunks, 1);
        assert!(sites[0].last_crawled_at.is_some());
    }

    #[test]
    fn test_list_tables_counts_rows() {
        let (mut storage, site_id) = storage_with_site();
        index(&mut storage, site_id, "https://ex.com/a", "alpha");

        let tables = storage.list_tables().unwrap();
        let rows_of = |name: &str| tables.iter().find(|t| t.name == name).map(|t| t.rows);
        assert_eq!(rows_of("sites"), Some(1));
        assert_eq!(rows_of("pages"), Some(1));
        assert_eq!(rows_of("chunks"), Some(1));
        assert_eq!(rows_of("crawl_jobs"), Some(0));
        assert!(rows_of("chunks_fts").is_some());
        assert!(tables.iter().all(|t| !t.name.starts_with("sqlite_")));
        assert!(tables.windows(2).all(|w| w[0].name <= w[1].name));
    }

    #[test]
    fn test_describe_table() {
        let (storage, _) = storage_with_site();

        let columns = storage.describe_table("sites").unwrap().unwrap();
        let id = columns.iter().find(|c| c.name == "id").unwrap();
        assert!(id.primary_key);
        let name = columns.iter().find(|c| c.name == "name").unwrap();
        assert!(name.not_null);
        assert_eq!(name.decl_type, "TEXT");

        assert!(storage.describe_table("nope").unwrap().is_none());
        assert!(storage
            .describe_table("sites; DROP TABLE sites")
            .unwrap()
            .is_none());
        assert!(storage.describe_table("sites").unwrap().is_some());
    }
}
