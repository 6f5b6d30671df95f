//! web2feed: rule-driven HTML to feed extraction
//!
//! This crate turns arbitrary HTML listing pages into structured, deduplicated
//! feed records according to a declarative per-feed rule. The extraction
//! pipeline fetches listing pages, locates candidate nodes, extracts fields,
//! consults the existence cache, optionally enriches each candidate from a
//! secondary source and renders the result into a [`feed::Record`].

pub mod config;
pub mod crawler;
pub mod extract;
pub mod feed;
pub mod hook;
pub mod logging;
pub mod service;
pub mod storage;
pub mod template;

use thiserror::Error;

/// Main error type for web2feed operations
#[derive(Debug, Error)]
pub enum Web2FeedError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Run failed: {0}")]
    Run(#[from] crawler::RunError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Unknown feed: {0}")]
    UnknownFeed(String),
}

/// Configuration-specific errors
///
/// Every variant is raised while loading a feed, before any run starts. A feed
/// whose configuration fails is never scheduled.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML in {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Invalid regex '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },

    #[error("Invalid template for {field}: {source}")]
    InvalidTemplate {
        field: String,
        source: template::TemplateError,
    },
}

/// Result type alias for web2feed operations
pub type Result<T> = std::result::Result<T, Web2FeedError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Feed, FeedConfig, Rule};
pub use crawler::{Crawler, RunState};
pub use extract::{ExtractionContext, FieldValue};
pub use feed::{FeedDesc, Record};
pub use storage::{CachedRepository, Repository, SqliteRepository};
