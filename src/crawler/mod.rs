//! Crawler module: the extraction pipeline
//!
//! This module contains the run logic for a feed, including:
//! - HTTP fetching behind the [`Fetcher`] trait, with body decoding
//! - Fixed-delay retries of listing pages
//! - Secondary-source enrichment of candidates
//! - Overall run coordination and aggregation

mod coordinator;
mod decode;
mod enrich;
mod fetcher;
mod retry;
mod state;

pub use coordinator::{CandidateError, Crawler, ListingError, ListingFailure, RunError};
pub use decode::{decode_body, resolve_encoding};
pub use enrich::{build_enricher, EnrichError, Enricher, PageEnricher, ScriptEnricher};
pub use fetcher::{header_map, FetchError, FetchSettings, Fetcher, HttpFetcher};
pub use retry::RetryPolicy;
pub use state::{InvalidTransition, RunState};
