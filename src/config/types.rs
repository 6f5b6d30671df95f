use crate::feed::FeedDesc;
use serde::Deserialize;
use std::collections::HashMap;

/// Base configuration of the web2feed service
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Path of the SQLite database holding stored records
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Directory scanned for `*.toml` feed files
    #[serde(default = "default_config_dir")]
    pub config_dir: String,

    /// Default refresh period in seconds
    #[serde(default = "default_period")]
    pub period: u64,

    /// Proxy used for every request of feeds that do not opt out
    #[serde(default)]
    pub http_proxy: Option<String>,

    /// Tracing filter directive, overridden by `-v`/`-q`
    #[serde(default)]
    pub log_level: Option<String>,

    /// Lifetime in seconds of a positive existence-cache entry
    #[serde(default = "default_existence_ttl")]
    pub existence_ttl: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            config_dir: default_config_dir(),
            period: default_period(),
            http_proxy: None,
            log_level: None,
            existence_ttl: default_existence_ttl(),
        }
    }
}

/// One feed file
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Number of records shown when listing the feed
    #[serde(default = "default_item_count")]
    pub item_count: usize,

    /// Refresh period in seconds; the base period applies when unset
    #[serde(default)]
    pub period: Option<u64>,

    #[serde(default)]
    pub disabled: bool,

    pub desc: FeedDesc,

    pub rule: RuleConfig,
}

/// Declarative extraction rule
#[derive(Debug, Clone, Deserialize)]
pub struct RuleConfig {
    /// Primary listing URL
    #[serde(default)]
    pub toc_url: String,

    /// Additional listing URLs, fetched after `toc_url`
    #[serde(default)]
    pub toc_urls: Vec<String>,

    /// CSS selector locating candidate nodes on a listing page
    pub item_selector: String,

    /// Primary fields, extracted relative to each candidate node
    #[serde(default)]
    pub selectors: HashMap<String, SelectorConfig>,

    /// Static values inserted into every extraction context
    #[serde(default)]
    pub constants: HashMap<String, String>,

    /// Name of the field whose value identifies a record
    pub key: String,

    /// Headers sent with listing requests
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default)]
    pub extra_page: Option<ExtraPageConfig>,

    #[serde(default)]
    pub script: Option<ScriptConfig>,

    pub template: TemplateConfig,

    /// Maximum number of listing pages processed at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Character encoding override for fetched pages
    #[serde(default)]
    pub encoding: Option<String>,

    /// Bypass the configured proxy for this feed
    #[serde(default)]
    pub no_proxy: bool,
}

impl RuleConfig {
    /// Listing URLs in configured order, empty entries and repeats removed
    pub fn listing_urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for url in std::iter::once(&self.toc_url).chain(self.toc_urls.iter()) {
            let url = url.trim();
            if !url.is_empty() && !urls.iter().any(|u| u == url) {
                urls.push(url.to_string());
            }
        }
        urls
    }
}

/// How to extract one field
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SelectorConfig {
    /// CSS sub-selector; empty selects the node itself
    #[serde(default)]
    pub selector: String,

    /// `text` (default), `html`, `outer_html` or an attribute name
    #[serde(default)]
    pub attr: String,

    /// Refinement regex; the first capture group is kept
    #[serde(default)]
    pub regex: String,
}

/// Secondary page fetched per candidate
#[derive(Debug, Clone, Deserialize)]
pub struct ExtraPageConfig {
    /// URL template rendered against the extraction context
    pub url: String,

    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// Fields extracted from the whole secondary document
    #[serde(default)]
    pub selectors: HashMap<String, SelectorConfig>,
}

/// External program consulted per candidate
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptConfig {
    /// Program and leading arguments
    pub command: Vec<String>,

    /// Argument template; the context as JSON is passed when unset
    #[serde(default)]
    pub argument: Option<String>,
}

/// Output templates
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub guid: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    pub body: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

fn default_database_path() -> String {
    "web2feed.db".to_string()
}

fn default_config_dir() -> String {
    "feeds".to_string()
}

fn default_period() -> u64 {
    3600
}

fn default_existence_ttl() -> u64 {
    3600
}

fn default_item_count() -> usize {
    20
}

fn default_concurrency() -> usize {
    16
}
