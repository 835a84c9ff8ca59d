//! Database schema definitions
//!
//! Batches and their pages are append-only: a trigger rejects any UPDATE of a
//! stored page, so the only mutations are inserting a batch or deleting one.

/// SQL schema for the page store
pub const SCHEMA_SQL: &str = r#"
-- Track crawl sessions
CREATE TABLE IF NOT EXISTS crawl_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    pages_crawled INTEGER NOT NULL DEFAULT 0
);

-- One row per flushed batch
CREATE TABLE IF NOT EXISTS batches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES crawl_sessions(id),
    created_at TEXT NOT NULL,
    page_count INTEGER NOT NULL
);

-- Pages of a batch, in crawl order
CREATE TABLE IF NOT EXISTS batch_pages (
    batch_id INTEGER NOT NULL REFERENCES batches(id) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    url TEXT NOT NULL,
    domain TEXT NOT NULL,
    title TEXT,
    description TEXT,
    body_text TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    fetched_at TEXT NOT NULL,
    depth INTEGER NOT NULL,
    outbound_links TEXT NOT NULL,
    PRIMARY KEY (batch_id, seq)
);

CREATE INDEX IF NOT EXISTS idx_batch_pages_url ON batch_pages(url);
CREATE INDEX IF NOT EXISTS idx_batch_pages_domain ON batch_pages(domain);

CREATE TRIGGER IF NOT EXISTS batch_pages_immutable
BEFORE UPDATE ON batch_pages
BEGIN
    SELECT RAISE(ABORT, 'stored pages are immutable');
END;
"#;

/// Current schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;

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
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}
