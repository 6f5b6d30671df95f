//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Repository trait.

use crate::feed::Record;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Repository, StorageError, StorageResult, DEFAULT_PAGE_SIZE};
use chrono::DateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const RECORD_COLUMNS: &str =
    "feed, key, title, link, guid, category, published_at, body, thumbnail";

/// SQLite record store
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Statements are atomic; a poisoned lock still guards a usable connection
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Raw column values of one row, converted outside the rusqlite closure
struct RecordRow {
    feed: String,
    key: String,
    title: String,
    link: String,
    guid: String,
    category: Option<String>,
    published_at: String,
    body: String,
    thumbnail: Option<String>,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            feed: row.get(0)?,
            key: row.get(1)?,
            title: row.get(2)?,
            link: row.get(3)?,
            guid: row.get(4)?,
            category: row.get(5)?,
            published_at: row.get(6)?,
            body: row.get(7)?,
            thumbnail: row.get(8)?,
        })
    }

    fn into_record(self) -> StorageResult<Record> {
        let published_at = DateTime::parse_from_rfc3339(&self.published_at)
            .map_err(|_| StorageError::Timestamp(self.published_at.clone()))?;
        Ok(Record {
            key: self.key,
            title: self.title,
            link: self.link,
            guid: self.guid,
            category: self.category,
            published_at,
            body: self.body,
            thumbnail: self.thumbnail,
            feed: self.feed,
        })
    }
}

impl Repository for SqliteRepository {
    fn exists(&self, feed: &str, key: &str) -> StorageResult<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM items WHERE feed = ?1 AND key = ?2",
                params![feed, key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn save(&self, records: &[Record]) -> StorageResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO items
                    (feed, key, title, link, guid, category, published_at, published_ts, body, thumbnail)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(feed, key) DO UPDATE SET
                    published_at = excluded.published_at,
                    published_ts = excluded.published_ts",
            )?;

            for record in records {
                stmt.execute(params![
                    record.feed,
                    record.key,
                    record.title,
                    record.link,
                    record.guid,
                    record.category,
                    record.published_at.to_rfc3339(),
                    record.published_at.timestamp(),
                    record.body,
                    record.thumbnail,
                ])?;
            }
        }
        tx.commit()?;

        Ok(records.len())
    }

    fn find_page(
        &self,
        feed: &str,
        search: &str,
        page_size: usize,
        page_index: usize,
    ) -> StorageResult<Vec<Record>> {
        let limit = if page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size
        };
        // A page past what SQLite can address is simply empty
        let offset = match page_index
            .saturating_sub(1)
            .checked_mul(limit)
            .and_then(|o| i64::try_from(o).ok())
        {
            Some(offset) => offset,
            None => return Ok(Vec::new()),
        };
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM items
             WHERE feed = ?1 AND (instr(title, ?2) > 0 OR instr(body, ?2) > 0)
             ORDER BY published_ts DESC, key ASC
             LIMIT ?3 OFFSET ?4"
        ))?;

        let rows = stmt
            .query_map(
                params![feed, search, limit, offset],
                RecordRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RecordRow::into_record).collect()
    }

    fn find_by_key(&self, feed: &str, key: &str) -> StorageResult<Option<Record>> {
        let row = self
            .conn()
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM items WHERE feed = ?1 AND key = ?2"),
                params![feed, key],
                RecordRow::from_row,
            )
            .optional()?;

        row.map(RecordRow::into_record).transpose()
    }
}
