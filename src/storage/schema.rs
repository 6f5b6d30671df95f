//! Database schema definitions
//!
//! This module contains the SQL schema for the web2feed record store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Extracted records, one row per (feed, key)
CREATE TABLE IF NOT EXISTS items (
    feed TEXT NOT NULL,
    key TEXT NOT NULL,
    title TEXT NOT NULL,
    link TEXT NOT NULL,
    guid TEXT NOT NULL,
    category TEXT,
    published_at TEXT NOT NULL,
    published_ts INTEGER NOT NULL,
    body TEXT NOT NULL,
    thumbnail TEXT,
    PRIMARY KEY (feed, key)
);

CREATE INDEX IF NOT EXISTS idx_items_feed_published ON items(feed, published_ts DESC);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
