//! Storage module for persisting feed records
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Idempotent record upserts keyed by `(feed, key)`
//! - Paged, searchable record listing
//! - The existence cache consulted before each candidate is processed

mod cache;
mod schema;
mod sqlite;
mod traits;

pub use cache::{CachedRepository, DEFAULT_TTL};
pub use sqlite::SqliteRepository;
pub use traits::{Repository, StorageError, StorageResult, DEFAULT_PAGE_SIZE};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Opens the record store with an existence cache in front of it
pub fn open_repository(path: &Path, ttl: Duration) -> StorageResult<Arc<dyn Repository>> {
    let store = SqliteRepository::new(path)?;
    Ok(Arc::new(CachedRepository::with_ttl(store, ttl)))
}
