//! Feed records and their rendering
//!
//! - [`Record`]: the canonical extracted unit
//! - [`ItemTemplate`]: per-field templates turning a context into a record
//! - [`render_rss`]: RSS 2.0 output for a feed's records

mod item;
mod rss;

pub use item::{dedup_records, ItemTemplate, RenderError};
pub use rss::{render_rss, RssError};

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One extracted feed entry
///
/// `(feed, key)` identifies a record. The key is taken from the rule's key
/// field when the record is rendered and is never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub key: String,
    pub title: String,
    pub link: String,
    pub guid: String,
    pub category: Option<String>,
    pub published_at: DateTime<FixedOffset>,
    /// Rich text; may embed markup
    pub body: String,
    pub thumbnail: Option<String>,
    pub feed: String,
}

/// Display metadata of a feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeedDesc {
    /// Feed name; also identifies the feed in storage and on the command line
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub generator: String,
}
