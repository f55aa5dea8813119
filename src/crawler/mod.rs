//! Crawler module for fetching and validating a site
//!
//! This module contains the core validation logic, including:
//! - The breadth-first URL frontier
//! - HTTP fetching with redirect handling, retries and TLS classification
//! - HTML parsing and link extraction
//! - Overall run coordination under concurrency limits and a deadline

mod coordinator;
mod fetcher;
mod frontier;
mod parser;

pub use coordinator::{ValidationRun, Validator};
pub use fetcher::{build_http_client, fetch_url, FetchOutcome, FetchPolicy, FetchResult};
pub use frontier::{EnqueueOutcome, Frontier, QueuedUrl};
pub use parser::{extract_links, parse_html, ExtractedLinks, ParsedPage};

use crate::config::Config;
use crate::SentinelError;

/// Runs a complete validation
///
/// This is the main entry point. It will:
/// 1. Build the HTTP client from the configuration
/// 2. Crawl the site breadth-first from the seed within scope and bounds
/// 3. Classify every fetch outcome
/// 4. Aggregate the severity-ordered issue list
///
/// Persisting the run is left to the caller (see [`crate::output`] and
/// [`crate::storage`]).
pub async fn validate(config: Config) -> Result<ValidationRun, SentinelError> {
    Validator::new(config)?.run().await
}
