//! Storage traits and error types
//!
//! This module defines the trait interface for record stores and
//! associated error types.

use crate::feed::Record;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid stored timestamp '{0}'")]
    Timestamp(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Default page size when a caller asks for zero records
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Trait for record store implementations
///
/// Implementations are shared between concurrent candidate tasks, so every
/// method takes `&self`.
pub trait Repository: Send + Sync {
    /// Whether a record with this key is already stored for the feed
    fn exists(&self, feed: &str, key: &str) -> StorageResult<bool>;

    /// Stores records, keyed by `(feed, key)`
    ///
    /// Saving a record whose key is already stored only refreshes its
    /// `published_at`. Returns the number of records written.
    fn save(&self, records: &[Record]) -> StorageResult<usize>;

    /// One page of a feed's records, newest first
    ///
    /// `search` filters on a substring of the title or body; empty matches
    /// everything. `page_index` starts at 1 and a `page_size` of 0 means
    /// [`DEFAULT_PAGE_SIZE`].
    fn find_page(
        &self,
        feed: &str,
        search: &str,
        page_size: usize,
        page_index: usize,
    ) -> StorageResult<Vec<Record>>;

    fn find_by_key(&self, feed: &str, key: &str) -> StorageResult<Option<Record>>;

    /// Drops any cached existence answers for a feed
    fn clear_cache(&self, _feed: &str) {}
}
