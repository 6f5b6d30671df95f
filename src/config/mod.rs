//! Configuration module for web2feed
//!
//! Loads the base configuration and the per-feed TOML files, validates them
//! and compiles each feed's rule into selectors and templates.
//!
//! # Example
//!
//! ```no_run
//! use web2feed::config::load_feed;
//! use std::path::Path;
//!
//! let feed = load_feed(Path::new("feeds/news.toml")).unwrap();
//! println!("{} reads {} listing pages", feed.name, feed.rule.listing_urls.len());
//! ```

mod parser;
mod registry;
mod rule;
mod types;
mod validation;

// Re-export types
pub use types::{
    AppConfig, ExtraPageConfig, FeedConfig, RuleConfig, ScriptConfig, SelectorConfig,
    TemplateConfig,
};

pub use registry::{FeedRegistry, Reload};
pub use rule::{Feed, FieldMap, Rule, SecondarySource};

// Re-export parser functions
pub use parser::{
    compute_config_hash, feed_files, load_app_config, load_feed, load_feed_config, load_feed_dir,
};
