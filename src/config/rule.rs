//! Compiled feeds
//!
//! A [`FeedConfig`] is validated and compiled once at load time into a
//! [`Feed`]: CSS selectors, regexes and templates are parsed here so that a
//! run never meets a configuration error.

use crate::config::types::{FeedConfig, RuleConfig, SelectorConfig};
use crate::config::validation::validate_feed;
use crate::extract::{parse_css, FieldSelector};
use crate::feed::{FeedDesc, ItemTemplate};
use crate::template::Template;
use crate::ConfigError;
use scraper::Selector;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Named field selectors, sorted by name
pub type FieldMap = Vec<(String, FieldSelector)>;

/// Where additional fields come from, if anywhere
#[derive(Debug, Clone)]
pub enum SecondarySource {
    /// Fetch a second page and select fields from the whole document
    Page {
        url: Template,
        headers: HashMap<String, String>,
        selectors: FieldMap,
    },
    /// Hand the candidate to an external program
    Script {
        command: Vec<String>,
        argument: Option<Template>,
    },
}

/// Immutable extraction rule
#[derive(Debug, Clone)]
pub struct Rule {
    pub listing_urls: Vec<String>,
    pub item_selector: Selector,
    pub selectors: FieldMap,
    pub constants: HashMap<String, String>,
    pub key: String,
    pub headers: HashMap<String, String>,
    pub secondary: Option<SecondarySource>,
    pub template: ItemTemplate,
    pub concurrency: usize,
    pub encoding: Option<String>,
    pub use_proxy: bool,
}

/// A loaded feed ready to run
#[derive(Debug, Clone)]
pub struct Feed {
    /// Feed name, taken from `desc.title`
    pub name: String,
    pub desc: FeedDesc,
    pub rule: Arc<Rule>,
    pub item_count: usize,
    pub period: Option<Duration>,
    pub disabled: bool,
}

impl Feed {
    /// Validates and compiles a feed configuration
    pub fn compile(config: FeedConfig) -> Result<Self, ConfigError> {
        validate_feed(&config)?;

        let rule_config = &config.rule;
        let secondary = match (&rule_config.extra_page, &rule_config.script) {
            (Some(page), None) => Some(SecondarySource::Page {
                url: Template::parse(&page.url).map_err(|source| {
                    ConfigError::InvalidTemplate {
                        field: "extra_page.url".to_string(),
                        source,
                    }
                })?,
                headers: page.headers.clone(),
                selectors: compile_fields(&page.selectors)?,
            }),
            (None, Some(script)) => Some(SecondarySource::Script {
                command: script.command.clone(),
                argument: match script.argument.as_deref() {
                    Some(arg) if !arg.is_empty() => {
                        Some(Template::parse(arg).map_err(|source| {
                            ConfigError::InvalidTemplate {
                                field: "script.argument".to_string(),
                                source,
                            }
                        })?)
                    }
                    _ => None,
                },
            }),
            _ => None,
        };

        let template = ItemTemplate::compile(&rule_config.template)?;
        warn_unknown_fields(&config.desc.title, rule_config, &template);

        let rule = Rule {
            listing_urls: rule_config.listing_urls(),
            item_selector: parse_css(&rule_config.item_selector)?,
            selectors: compile_fields(&rule_config.selectors)?,
            constants: rule_config.constants.clone(),
            key: rule_config.key.clone(),
            headers: rule_config.headers.clone(),
            secondary,
            template,
            concurrency: rule_config.concurrency,
            encoding: rule_config.encoding.clone().filter(|e| !e.is_empty()),
            use_proxy: !rule_config.no_proxy,
        };

        Ok(Self {
            name: config.desc.title.clone(),
            desc: config.desc,
            rule: Arc::new(rule),
            item_count: config.item_count,
            period: config.period.map(Duration::from_secs),
            disabled: config.disabled,
        })
    }
}

/// Logs template references to fields no selector or constant produces
///
/// Such fields render as empty text. Script hooks may return any field, so
/// nothing is checked for them.
fn warn_unknown_fields(feed: &str, rule: &RuleConfig, template: &ItemTemplate) {
    if rule.script.is_some() {
        return;
    }

    let mut known: HashSet<&str> = rule
        .selectors
        .keys()
        .chain(rule.constants.keys())
        .map(String::as_str)
        .collect();
    if let Some(page) = &rule.extra_page {
        known.extend(page.selectors.keys().map(String::as_str));
    }

    let mut unknown: Vec<&str> = template
        .referenced_fields()
        .into_iter()
        .filter(|field| !known.contains(field))
        .collect();
    unknown.sort_unstable();
    for field in unknown {
        tracing::warn!("[{}] template uses unknown field '{}'", feed, field);
    }
}

fn compile_fields(fields: &HashMap<String, SelectorConfig>) -> Result<FieldMap, ConfigError> {
    let mut compiled = fields
        .iter()
        .map(|(name, config)| Ok((name.clone(), FieldSelector::compile(config)?)))
        .collect::<Result<FieldMap, ConfigError>>()?;
    compiled.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(compiled)
}
