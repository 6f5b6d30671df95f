//! Secondary-source resolution
//!
//! An [`Enricher`] adds fields to a candidate's context after the existence
//! check and before rendering. Keys it produces overwrite existing ones.

use crate::config::{FieldMap, Rule, SecondarySource};
use crate::crawler::decode::decode_body;
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::extract::{escape_markup, unescape_markup, ExtractionContext, FieldValue, UnescapeError};
use crate::hook::{CommandHook, HookError, ScriptHook};
use crate::template::{EvalError, Template};
use async_trait::async_trait;
use scraper::Html;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while enriching one candidate
#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("failed to render secondary URL: {0}")]
    Url(EvalError),

    #[error("secondary URL is malformed: {0}")]
    MalformedUrl(UnescapeError),

    #[error("failed to render hook argument: {0}")]
    Argument(EvalError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Hook(#[from] HookError),
}

#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, ctx: &mut ExtractionContext) -> Result<(), EnrichError>;
}

/// Fetches a second page per candidate and selects fields from it
pub struct PageEnricher {
    fetcher: Arc<dyn Fetcher>,
    url: Template,
    headers: HashMap<String, String>,
    selectors: FieldMap,
    encoding: Option<String>,
    use_proxy: bool,
}

impl PageEnricher {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        url: Template,
        headers: HashMap<String, String>,
        selectors: FieldMap,
        encoding: Option<String>,
        use_proxy: bool,
    ) -> Self {
        Self {
            fetcher,
            url,
            headers,
            selectors,
            encoding,
            use_proxy,
        }
    }
}

/// Applies document-scoped selectors to a page body
fn select_document(body: &str, selectors: &FieldMap) -> Vec<(String, FieldValue)> {
    let document = Html::parse_document(body);
    selectors
        .iter()
        .map(|(name, selector)| (name.clone(), selector.extract_from_document(&document)))
        .collect()
}

#[async_trait]
impl Enricher for PageEnricher {
    async fn enrich(&self, ctx: &mut ExtractionContext) -> Result<(), EnrichError> {
        // Context values are markup-escaped; the URL itself is not.
        let rendered = self.url.render(ctx).map_err(EnrichError::Url)?;
        let url = unescape_markup(&rendered).map_err(EnrichError::MalformedUrl)?;
        tracing::debug!("Fetching secondary page {}", url);

        let bytes = self.fetcher.get(&url, &self.headers, self.use_proxy).await?;
        let body = decode_body(&bytes, self.encoding.as_deref());
        ctx.merge(select_document(&body, &self.selectors));
        Ok(())
    }
}

/// Delegates a candidate to a [`ScriptHook`]
pub struct ScriptEnricher {
    hook: Arc<dyn ScriptHook>,
    argument: Option<Template>,
}

impl ScriptEnricher {
    pub fn new(hook: Arc<dyn ScriptHook>, argument: Option<Template>) -> Self {
        Self { hook, argument }
    }
}

#[async_trait]
impl Enricher for ScriptEnricher {
    async fn enrich(&self, ctx: &mut ExtractionContext) -> Result<(), EnrichError> {
        let argument = match &self.argument {
            Some(template) => template.render(ctx).map_err(EnrichError::Argument)?,
            None => ctx.to_json(),
        };
        let fields = self.hook.call(&argument).await?;
        // Hook output is plain text; escape it like selector text
        ctx.merge(
            fields
                .into_iter()
                .map(|(name, value)| (name, escape_field(value))),
        );
        Ok(())
    }
}

fn escape_field(value: FieldValue) -> FieldValue {
    match value {
        FieldValue::Text(text) => FieldValue::Text(escape_markup(&text)),
        FieldValue::List(items) => {
            FieldValue::List(items.iter().map(|item| escape_markup(item)).collect())
        }
    }
}

/// Builds the enricher for a rule's secondary source, if it has one
///
/// `hook` replaces the configured command for script sources.
pub fn build_enricher(
    rule: &Rule,
    fetcher: Arc<dyn Fetcher>,
    hook: Option<Arc<dyn ScriptHook>>,
) -> Result<Option<Arc<dyn Enricher>>, HookError> {
    let enricher: Arc<dyn Enricher> = match &rule.secondary {
        None => return Ok(None),
        Some(SecondarySource::Page {
            url,
            headers,
            selectors,
        }) => Arc::new(PageEnricher::new(
            fetcher,
            url.clone(),
            headers.clone(),
            selectors.clone(),
            rule.encoding.clone(),
            rule.use_proxy,
        )),
        Some(SecondarySource::Script { command, argument }) => {
            let hook = match hook {
                Some(hook) => hook,
                None => Arc::new(CommandHook::new(command)?),
            };
            Arc::new(ScriptEnricher::new(hook, argument.clone()))
        }
    };
    Ok(Some(enricher))
}
