//! Item rendering
//!
//! Each output field is a [`Template`] evaluated against the extraction
//! context. Non-body fields are decoded like XML character data, so values
//! escaped by the selectors come back as the original characters and raw
//! markup in such a field is rejected. The body is treated as CDATA and kept
//! verbatim.

use crate::config::TemplateConfig;
use crate::extract::{unescape_markup, ExtractionContext, UnescapeError};
use crate::feed::Record;
use crate::template::{parse_timestamp, EvalError, Template, Value};
use crate::ConfigError;
use chrono::{DateTime, FixedOffset, Local};
use std::collections::HashSet;
use thiserror::Error;

/// Candidate-level rendering failures
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template for {field} failed: {source}")]
    Eval {
        field: &'static str,
        source: EvalError,
    },

    #[error("malformed {field}: {source}")]
    Malformed {
        field: &'static str,
        source: UnescapeError,
    },

    #[error("body contains a CDATA terminator")]
    BodyTerminator,

    #[error("unparseable published_at '{0}'")]
    Timestamp(String),
}

/// Compiled output templates for one rule
#[derive(Debug, Clone)]
pub struct ItemTemplate {
    title: Template,
    link: Template,
    guid: Template,
    category: Option<Template>,
    published_at: Option<Template>,
    body: Template,
    thumbnail: Option<Template>,
}

fn compile_field(field: &str, source: &str) -> Result<Template, ConfigError> {
    Template::parse(source).map_err(|source| ConfigError::InvalidTemplate {
        field: field.to_string(),
        source,
    })
}

fn compile_optional(field: &str, source: &Option<String>) -> Result<Option<Template>, ConfigError> {
    match source.as_deref() {
        Some(s) if !s.is_empty() => compile_field(field, s).map(Some),
        _ => Ok(None),
    }
}

impl ItemTemplate {
    /// Compiles the configured templates
    ///
    /// `guid` falls back to the `link` template when not configured.
    pub fn compile(config: &TemplateConfig) -> Result<Self, ConfigError> {
        let link = compile_field("link", &config.link)?;
        let guid = match config.guid.as_deref() {
            Some(g) if !g.is_empty() => compile_field("guid", g)?,
            _ => link.clone(),
        };

        Ok(Self {
            title: compile_field("title", &config.title)?,
            link,
            guid,
            category: compile_optional("category", &config.category)?,
            published_at: compile_optional("published_at", &config.published_at)?,
            body: compile_field("body", &config.body)?,
            thumbnail: compile_optional("thumbnail", &config.thumbnail)?,
        })
    }

    /// Every context field referenced by any template
    pub fn referenced_fields(&self) -> HashSet<&str> {
        [
            Some(&self.title),
            Some(&self.link),
            Some(&self.guid),
            self.category.as_ref(),
            self.published_at.as_ref(),
            Some(&self.body),
            self.thumbnail.as_ref(),
        ]
        .into_iter()
        .flatten()
        .flat_map(|t| t.referenced_fields())
        .collect()
    }

    /// Renders one record from a finished extraction context
    ///
    /// `key` is the key field's value as read after primary extraction.
    pub fn render(
        &self,
        ctx: &ExtractionContext,
        feed: &str,
        key: String,
    ) -> Result<Record, RenderError> {
        let body = self
            .body
            .render(ctx)
            .map_err(|source| RenderError::Eval {
                field: "body",
                source,
            })?;
        if body.contains("]]>") {
            return Err(RenderError::BodyTerminator);
        }

        Ok(Record {
            key,
            title: char_data("title", &self.title, ctx)?,
            link: char_data("link", &self.link, ctx)?,
            guid: char_data("guid", &self.guid, ctx)?,
            category: optional_char_data("category", self.category.as_ref(), ctx)?,
            published_at: self.published_at(ctx)?,
            body,
            thumbnail: optional_char_data("thumbnail", self.thumbnail.as_ref(), ctx)?,
            feed: feed.to_string(),
        })
    }

    fn published_at(&self, ctx: &ExtractionContext) -> Result<DateTime<FixedOffset>, RenderError> {
        let template = match &self.published_at {
            Some(t) => t,
            None => return Ok(Local::now().fixed_offset()),
        };

        let value = template.evaluate(ctx).map_err(|source| RenderError::Eval {
            field: "published_at",
            source,
        })?;
        match value {
            Value::Time(t) => Ok(t),
            other => {
                let raw = other.to_string();
                let text = unescape_markup(&raw).map_err(|source| RenderError::Malformed {
                    field: "published_at",
                    source,
                })?;
                parse_timestamp(text.trim()).ok_or(RenderError::Timestamp(text))
            }
        }
    }
}

fn char_data(
    field: &'static str,
    template: &Template,
    ctx: &ExtractionContext,
) -> Result<String, RenderError> {
    let raw = template
        .render(ctx)
        .map_err(|source| RenderError::Eval { field, source })?;
    unescape_markup(&raw).map_err(|source| RenderError::Malformed { field, source })
}

fn optional_char_data(
    field: &'static str,
    template: Option<&Template>,
    ctx: &ExtractionContext,
) -> Result<Option<String>, RenderError> {
    match template {
        Some(t) => {
            let value = char_data(field, t, ctx)?;
            Ok(if value.is_empty() { None } else { Some(value) })
        }
        None => Ok(None),
    }
}

/// Collapses records sharing `(feed, key)`, keeping the first occurrence
pub fn dedup_records(records: Vec<Record>) -> Vec<Record> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert((r.feed.clone(), r.key.clone())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::escape_markup;
    use chrono::{Datelike, Timelike};

    fn config() -> TemplateConfig {
        TemplateConfig {
            title: "{{ .title | trim }}".to_string(),
            link: "https://example.com{{ .href }}".to_string(),
            guid: None,
            category: Some("{{ .cat }}".to_string()),
            published_at: Some(r#"{{ .date | timeFromStr "Y-m-d H:M" }}"#.to_string()),
            body: "{{ .body }}".to_string(),
            thumbnail: Some("{{ .thumb }}".to_string()),
        }
    }

    fn ctx() -> ExtractionContext {
        let mut ctx = ExtractionContext::new();
        ctx.insert("title", " A title ");
        ctx.insert("href", "/a");
        ctx.insert("date", "2021-11-01 04:20");
        ctx.insert("body", "<p>Hello</p>");
        ctx.insert("cat", "news");
        ctx
    }

    #[test]
    fn test_render_full_record() {
        let item = ItemTemplate::compile(&config()).unwrap();
        let record = item.render(&ctx(), "demo", "/a".to_string()).unwrap();

        assert_eq!(record.key, "/a");
        assert_eq!(record.title, "A title");
        assert_eq!(record.link, "https://example.com/a");
        assert_eq!(record.guid, record.link);
        assert_eq!(record.category.as_deref(), Some("news"));
        assert_eq!(record.body, "<p>Hello</p>");
        assert_eq!(record.thumbnail, None);
        assert_eq!(record.feed, "demo");
        assert_eq!(
            (record.published_at.year(), record.published_at.hour()),
            (2021, 4)
        );
    }

    #[test]
    fn test_escaped_values_are_recovered() {
        let item = ItemTemplate::compile(&config()).unwrap();
        let mut ctx = ctx();
        let original = r#"Q&A: "<tags>" & more"#;
        ctx.insert("title", escape_markup(original));

        let record = item.render(&ctx, "demo", "/a".to_string()).unwrap();
        assert_eq!(record.title, original);
    }

    #[test]
    fn test_raw_markup_in_title_is_malformed() {
        let item = ItemTemplate::compile(&config()).unwrap();
        let mut ctx = ctx();
        ctx.insert("title", "<b>bold</b>");

        let err = item.render(&ctx, "demo", "/a".to_string()).unwrap_err();
        assert!(matches!(err, RenderError::Malformed { field: "title", .. }));
    }

    #[test]
    fn test_body_with_cdata_terminator_is_rejected() {
        let item = ItemTemplate::compile(&config()).unwrap();
        let mut ctx = ctx();
        ctx.insert("body", "oops ]]> here");
        assert!(matches!(
            item.render(&ctx, "demo", "/a".to_string()),
            Err(RenderError::BodyTerminator)
        ));
    }

    #[test]
    fn test_published_at_defaults_to_now() {
        let mut cfg = config();
        cfg.published_at = None;
        let item = ItemTemplate::compile(&cfg).unwrap();
        let record = item.render(&ctx(), "demo", "/a".to_string()).unwrap();
        let age = Local::now().fixed_offset() - record.published_at;
        assert!(age.num_seconds().abs() < 5);
    }

    #[test]
    fn test_published_at_text_is_parsed() {
        let mut cfg = config();
        cfg.published_at = Some("{{ .date }}:00".to_string());
        let item = ItemTemplate::compile(&cfg).unwrap();
        let record = item.render(&ctx(), "demo", "/a".to_string()).unwrap();
        assert_eq!(record.published_at.minute(), 20);
    }

    #[test]
    fn test_unparseable_published_at() {
        let mut cfg = config();
        cfg.published_at = Some("{{ .title }}".to_string());
        let item = ItemTemplate::compile(&cfg).unwrap();
        assert!(matches!(
            item.render(&ctx(), "demo", "/a".to_string()),
            Err(RenderError::Timestamp(_))
        ));
    }

    #[test]
    fn test_explicit_guid() {
        let mut cfg = config();
        cfg.guid = Some("id-{{ .href }}".to_string());
        let item = ItemTemplate::compile(&cfg).unwrap();
        let record = item.render(&ctx(), "demo", "/a".to_string()).unwrap();
        assert_eq!(record.guid, "id-/a");
    }

    #[test]
    fn test_invalid_template_is_config_error() {
        let mut cfg = config();
        cfg.title = "{{ .title | nope }}".to_string();
        assert!(matches!(
            ItemTemplate::compile(&cfg),
            Err(ConfigError::InvalidTemplate { .. })
        ));
    }

    #[test]
    fn test_referenced_fields() {
        let item = ItemTemplate::compile(&config()).unwrap();
        let fields = item.referenced_fields();
        assert!(fields.contains("href"));
        assert!(fields.contains("date"));
    }

    fn record(key: &str, title: &str) -> Record {
        Record {
            key: key.to_string(),
            title: title.to_string(),
            link: String::new(),
            guid: String::new(),
            category: None,
            published_at: Local::now().fixed_offset(),
            body: String::new(),
            thumbnail: None,
            feed: "demo".to_string(),
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let records = vec![record("a", "first"), record("b", "b"), record("a", "second")];
        let deduped = dedup_records(records);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].title, "first");
    }
}
