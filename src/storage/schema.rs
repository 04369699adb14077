//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the index database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Indexed sites and the configuration they were last planned with
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    base_url TEXT NOT NULL,
    config_toml TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- One row per canonical URL per site; never deleted, only tombstoned
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id),
    url TEXT NOT NULL,
    title TEXT,
    published TEXT,
    status_code INTEGER,
    content_hash TEXT NOT NULL,
    content_text TEXT NOT NULL,
    depth INTEGER NOT NULL DEFAULT 0,
    liveness TEXT NOT NULL,
    first_indexed_at TEXT NOT NULL,
    indexed_at TEXT NOT NULL,
    last_crawled_at TEXT NOT NULL,
    tombstoned_at TEXT,
    UNIQUE(site_id, url)
);

CREATE INDEX IF NOT EXISTS idx_pages_site_liveness ON pages(site_id, liveness);

-- Chunks of the current content version of each page
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id),
    ordinal INTEGER NOT NULL,
    text TEXT NOT NULL,
    start_offset INTEGER NOT NULL,
    end_offset INTEGER NOT NULL,
    tokens TEXT NOT NULL,
    UNIQUE(page_id, ordinal)
);

CREATE INDEX IF NOT EXISTS idx_chunks_page ON chunks(page_id);

-- Full-text index over chunk tokens; rowid mirrors chunks.id
CREATE VIRTUAL TABLE IF NOT EXISTS chunks_fts USING fts5(tokens, tokenize = 'unicode61 remove_diacritics 0');

-- Crawl job history
CREATE TABLE IF NOT EXISTS crawl_jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id),
    kind TEXT NOT NULL,
    state TEXT NOT NULL,
    stop_reason TEXT,
    created_at TEXT NOT NULL,
    started_at TEXT,
    finished_at TEXT,
    discovered INTEGER NOT NULL DEFAULT 0,
    fetched INTEGER NOT NULL DEFAULT 0,
    indexed INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0,
    excluded INTEGER NOT NULL DEFAULT 0,
    tombstoned INTEGER NOT NULL DEFAULT 0,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_crawl_jobs_site ON crawl_jobs(site_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", get_schema_version())?;
    Ok(())
}

/// Gets the current schema version
pub fn get_schema_version() -> u32 {
    1
}
