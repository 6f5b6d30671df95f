//! Crawl orchestration
//!
//! A run fetches every listing URL of a feed through a bounded pool, fans
//! out one task per candidate node and aggregates the rendered records:
//! - Listing pages are retried with a fixed delay; a page that never loads
//!   fails the whole run
//! - Candidates are processed without a concurrency bound; a failing
//!   candidate is logged and dropped
//! - Surviving records are ordered by listing position then document
//!   position and collapsed by key

use crate::config::{Feed, Rule};
use crate::crawler::decode::decode_body;
use crate::crawler::enrich::{build_enricher, EnrichError, Enricher};
use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::crawler::retry::RetryPolicy;
use crate::crawler::state::{InvalidTransition, RunState};
use crate::extract::ExtractionContext;
use crate::feed::{dedup_records, Record, RenderError};
use crate::hook::{HookError, ScriptHook};
use crate::storage::{Repository, StorageError};
use scraper::Html;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Why a single candidate was dropped
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("key field '{0}' is missing")]
    MissingKey(String),

    #[error("existence check failed: {0}")]
    Exists(#[from] StorageError),

    #[error("enrichment failed: {0}")]
    Enrich(#[from] EnrichError),

    #[error("render failed: {0}")]
    Render(#[from] RenderError),
}

/// Why a listing page could not be processed
#[derive(Debug, Error)]
pub enum ListingError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("listing task aborted: {0}")]
    Aborted(String),
}

/// A listing URL that failed every attempt
#[derive(Debug)]
pub struct ListingFailure {
    pub url: String,
    pub error: ListingError,
}

impl fmt::Display for ListingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.error)
    }
}

/// A run that produced no records
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{} listing page(s) failed: {}", .0.len(), join_failures(.0))]
    Listing(Vec<ListingFailure>),

    #[error("failed to prepare secondary source: {0}")]
    Setup(#[from] HookError),

    #[error(transparent)]
    State(#[from] InvalidTransition),
}

impl RunError {
    /// URLs of the listing pages that failed
    pub fn failed_urls(&self) -> Vec<&str> {
        match self {
            Self::Listing(failures) => failures.iter().map(|f| f.url.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

fn join_failures(failures: &[ListingFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A rendered record with its position in the run
type Positioned = (usize, usize, Record);

#[derive(Debug, Default)]
struct Tally {
    candidates: AtomicUsize,
    known: AtomicUsize,
    dropped: AtomicUsize,
}

/// Shared by every task of one run
struct RunContext {
    feed: String,
    rule: Arc<Rule>,
    fetcher: Arc<dyn Fetcher>,
    repository: Option<Arc<dyn Repository>>,
    enricher: Option<Arc<dyn Enricher>>,
    retry: RetryPolicy,
    results: Mutex<Vec<Positioned>>,
    tally: Tally,
}

/// Runs feeds
///
/// Without a repository the existence check is skipped, which is what the
/// `test` command wants.
#[derive(Clone)]
pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    repository: Option<Arc<dyn Repository>>,
    hook: Option<Arc<dyn ScriptHook>>,
    retry: RetryPolicy,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            repository: None,
            hook: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Consults `repository` before spending work on a candidate
    pub fn with_repository(mut self, repository: Arc<dyn Repository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Uses `hook` instead of spawning the configured script command
    pub fn with_hook(mut self, hook: Arc<dyn ScriptHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs one feed and returns its new records
    ///
    /// Records are not saved here. On a listing failure every record of the
    /// run is discarded and the error names each failed URL.
    pub async fn run(&self, feed: &Feed) -> Result<Vec<Record>, RunError> {
        let mut state = RunState::Idle;
        let rule = Arc::clone(&feed.rule);
        let enricher = build_enricher(&rule, Arc::clone(&self.fetcher), self.hook.clone())?;

        let ctx = Arc::new(RunContext {
            feed: feed.name.clone(),
            rule: Arc::clone(&rule),
            fetcher: Arc::clone(&self.fetcher),
            repository: self.repository.clone(),
            enricher,
            retry: self.retry,
            results: Mutex::new(Vec::new()),
            tally: Tally::default(),
        });

        state.advance(RunState::Dispatching)?;
        let semaphore = Arc::new(Semaphore::new(rule.concurrency.max(1)));
        let mut listings = Vec::with_capacity(rule.listing_urls.len());
        for (index, url) in rule.listing_urls.iter().enumerate() {
            let ctx = Arc::clone(&ctx);
            let semaphore = Arc::clone(&semaphore);
            let task_url = url.clone();
            let handle = tokio::spawn(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                process_listing(ctx, index, task_url).await
            });
            listings.push((url.clone(), handle));
        }

        state.advance(RunState::Awaiting)?;
        let mut failures = Vec::new();
        for (url, handle) in listings {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(error)) => failures.push(ListingFailure { url, error }),
                Err(e) => failures.push(ListingFailure {
                    url,
                    error: ListingError::Aborted(e.to_string()),
                }),
            }
        }

        state.advance(RunState::Aggregated)?;
        let mut results = std::mem::take(&mut *ctx.results.lock().unwrap_or_else(|e| e.into_inner()));

        if !failures.is_empty() {
            state.advance(RunState::Failed)?;
            for failure in &failures {
                tracing::error!("[{}] listing {} failed: {}", feed.name, failure.url, failure.error);
            }
            tracing::error!(
                "[{}] run failed, discarding {} records",
                feed.name,
                results.len()
            );
            return Err(RunError::Listing(failures));
        }

        results.sort_by_key(|(listing, candidate, _)| (*listing, *candidate));
        let records = dedup_records(results.into_iter().map(|(_, _, record)| record).collect());

        state.advance(RunState::Succeeded)?;
        tracing::info!(
            "[{}] {} records from {} candidates ({} known, {} dropped)",
            feed.name,
            records.len(),
            ctx.tally.candidates.load(Ordering::Relaxed),
            ctx.tally.known.load(Ordering::Relaxed),
            ctx.tally.dropped.load(Ordering::Relaxed),
        );
        Ok(records)
    }
}

/// Fetches one listing page, then processes its candidates to completion
async fn process_listing(ctx: Arc<RunContext>, index: usize, url: String) -> Result<(), ListingError> {
    let rule = &ctx.rule;
    let feed = ctx.feed.as_str();
    let fetcher = &ctx.fetcher;
    let body = ctx
        .retry
        .run(|attempt| {
            let url = url.as_str();
            async move {
                tracing::debug!("[{}] fetching {} (attempt {})", feed, url, attempt);
                fetcher.get(url, &rule.headers, rule.use_proxy).await
            }
        })
        .await?;

    let text = decode_body(&body, rule.encoding.as_deref());
    let candidates = extract_candidates(&text, rule);
    tracing::debug!("[{}] {} candidates on {}", ctx.feed, candidates.len(), url);
    ctx.tally
        .candidates
        .fetch_add(candidates.len(), Ordering::Relaxed);

    let mut tasks = JoinSet::new();
    for (position, candidate) in candidates.into_iter().enumerate() {
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move {
            match process_candidate(&ctx, candidate).await {
                Ok(Some(record)) => ctx
                    .results
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .push((index, position, record)),
                Ok(None) => {}
                Err(e) => {
                    ctx.tally.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!("[{}] dropping candidate: {}", ctx.feed, e);
                }
            }
        });
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            ctx.tally.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::error!("[{}] candidate task aborted: {}", ctx.feed, e);
        }
    }
    Ok(())
}

/// Parses a listing page and runs primary extraction on every candidate
///
/// The parsed document never leaves this function; only the owned contexts
/// are handed to the candidate tasks.
fn extract_candidates(body: &str, rule: &Rule) -> Vec<ExtractionContext> {
    let document = Html::parse_document(body);
    document
        .select(&rule.item_selector)
        .map(|node| {
            let mut ctx = ExtractionContext::with_constants(&rule.constants);
            for (name, selector) in &rule.selectors {
                ctx.insert(name.clone(), selector.extract_from(node));
            }
            ctx
        })
        .collect()
}

/// Turns one candidate into a record, or `None` when it is already stored
async fn process_candidate(
    run: &RunContext,
    mut candidate: ExtractionContext,
) -> Result<Option<Record>, CandidateError> {
    let rule = &run.rule;
    let key = candidate
        .get(&rule.key)
        .map(|v| v.as_text())
        .ok_or_else(|| CandidateError::MissingKey(rule.key.clone()))?;

    if let Some(repository) = &run.repository {
        if repository.exists(&run.feed, &key)? {
            run.tally.known.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("[{}] {} already stored", run.feed, key);
            return Ok(None);
        }
    }

    if let Some(enricher) = &run.enricher {
        enricher.enrich(&mut candidate).await?;
    }

    let record = rule.template.render(&candidate, &run.feed, key)?;
    Ok(Some(record))
}
