//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the BatchStore trait.

use crate::state::SessionState;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{BatchStore, StorageError, StorageResult};
use crate::storage::{BatchId, CrawledPage, PageBatch, SessionRecord, StoreStats};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Separator for the outbound link list column; never valid inside a URL
const LINK_SEPARATOR: char = '\n';

/// SQLite batch store
pub struct SqliteBatchStore {
    conn: Connection,
}

impl SqliteBatchStore {
    /// Opens or creates a store at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteBatchStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

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

    /// Creates an in-memory store
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
        Ok(RawSession {
            id: row.get(0)?,
            started_at: row.get(1)?,
            finished_at: row.get(2)?,
            config_hash: row.get(3)?,
            status: row.get(4)?,
            pages_crawled: row.get(5)?,
        })
    }
}

struct RawSession {
    id: i64,
    started_at: String,
    finished_at: Option<String>,
    config_hash: String,
    status: String,
    pages_crawled: i64,
}

impl RawSession {
    fn into_record(self) -> StorageResult<SessionRecord> {
        Ok(SessionRecord {
            id: self.id,
            started_at: parse_timestamp(&self.started_at)?,
            finished_at: self.finished_at.as_deref().map(parse_timestamp).transpose()?,
            config_hash: self.config_hash,
            status: SessionState::from_db_string(&self.status).unwrap_or(SessionState::Running),
            pages_crawled: self.pages_crawled.max(0) as u64,
        })
    }
}

struct RawPage {
    url: String,
    domain: String,
    title: Option<String>,
    description: Option<String>,
    text: String,
    content_hash: String,
    status_code: u16,
    fetched_at: String,
    depth: u32,
    outbound_links: String,
}

impl RawPage {
    fn into_page(self) -> StorageResult<CrawledPage> {
        Ok(CrawledPage {
            fetched_at: parse_timestamp(&self.fetched_at)?,
            outbound_links: split_links(&self.outbound_links),
            url: self.url,
            domain: self.domain,
            title: self.title,
            description: self.description,
            text: self.text,
            content_hash: self.content_hash,
            status_code: self.status_code,
            depth: self.depth,
        })
    }
}

fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("bad timestamp '{}': {}", value, e)))
}

fn join_links(links: &[String]) -> String {
    links.join(&LINK_SEPARATOR.to_string())
}

fn split_links(joined: &str) -> Vec<String> {
    joined
        .split(LINK_SEPARATOR)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

impl BatchStore for SqliteBatchStore {
    // ===== Session Management =====

    fn create_session(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_sessions (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, SessionState::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_session(
        &mut self,
        session_id: i64,
        status: SessionState,
        pages_crawled: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawl_sessions SET status = ?1, finished_at = ?2, pages_crawled = ?3 WHERE id = ?4",
            params![status.to_db_string(), now, pages_crawled as i64, session_id],
        )?;
        if updated == 0 {
            return Err(StorageError::SessionNotFound(session_id));
        }
        Ok(())
    }

    fn latest_session(&self) -> StorageResult<Option<SessionRecord>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status, pages_crawled
                 FROM crawl_sessions ORDER BY id DESC LIMIT 1",
                [],
                Self::session_from_row,
            )
            .optional()?;

        raw.map(RawSession::into_record).transpose()
    }

    // ===== Batches =====

    fn append_batch(&mut self, session_id: i64, pages: &[CrawledPage]) -> StorageResult<BatchId> {
        if pages.is_empty() {
            return Err(StorageError::EmptyBatch);
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO batches (session_id, created_at, page_count) VALUES (?1, ?2, ?3)",
            params![session_id, Utc::now().to_rfc3339(), pages.len() as i64],
        )?;
        let batch_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO batch_pages
                 (batch_id, seq, url, domain, title, description, body_text, content_hash,
                  status_code, fetched_at, depth, outbound_links)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for (seq, page) in pages.iter().enumerate() {
                stmt.execute(params![
                    batch_id,
                    seq as i64,
                    page.url,
                    page.domain,
                    page.title,
                    page.description,
                    page.text,
                    page.content_hash,
                    page.status_code,
                    page.fetched_at.to_rfc3339(),
                    page.depth,
                    join_links(&page.outbound_links),
                ])?;
            }
        }

        tx.commit()?;
        Ok(batch_id)
    }

    fn batch_ids(&self) -> StorageResult<Vec<BatchId>> {
        let mut stmt = self.conn.prepare("SELECT id FROM batches ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<BatchId>, _>>()?;
        Ok(ids)
    }

    fn read_batch(&self, batch_id: BatchId) -> StorageResult<PageBatch> {
        let header: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT session_id, created_at FROM batches WHERE id = ?1",
                params![batch_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (session_id, created_at) = header.ok_or(StorageError::BatchNotFound(batch_id))?;

        let mut stmt = self.conn.prepare(
            "SELECT url, domain, title, description, body_text, content_hash,
                    status_code, fetched_at, depth, outbound_links
             FROM batch_pages WHERE batch_id = ?1 ORDER BY seq",
        )?;

        let pages = stmt
            .query_map(params![batch_id], |row| {
                Ok(RawPage {
                    url: row.get(0)?,
                    domain: row.get(1)?,
                    title: row.get(2)?,
                    description: row.get(3)?,
                    text: row.get(4)?,
                    content_hash: row.get(5)?,
                    status_code: row.get(6)?,
                    fetched_at: row.get(7)?,
                    depth: row.get(8)?,
                    outbound_links: row.get(9)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(RawPage::into_page)
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(PageBatch {
            id: batch_id,
            session_id,
            created_at: parse_timestamp(&created_at)?,
            pages,
        })
    }

    fn delete_batch(&mut self, batch_id: BatchId) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM batch_pages WHERE batch_id = ?1", params![batch_id])?;
        let deleted = tx.execute("DELETE FROM batches WHERE id = ?1", params![batch_id])?;
        if deleted == 0 {
            return Err(StorageError::BatchNotFound(batch_id));
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Statistics =====

    fn stats(&self) -> StorageResult<StoreStats> {
        let count = |sql: &str| -> StorageResult<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n.max(0) as u64)
        };

        Ok(StoreStats {
            sessions: count("SELECT COUNT(*) FROM crawl_sessions")?,
            batches: count("SELECT COUNT(*) FROM batches")?,
            pages: count("SELECT COUNT(*) FROM batch_pages")?,
        })
    }
}
