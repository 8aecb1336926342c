//! Crawler module for fetching and processing directory pages
//!
//! This module contains the core scraping logic, including:
//! - Request disguise (identity rotation and randomized pacing)
//! - HTTP fetching with retries and a headless browser fallback
//! - Listing extraction from page markup
//! - Overall run coordination across a page range

mod browser;
mod coordinator;
mod disguise;
mod events;
mod extractor;
mod fetcher;
mod pacing;

pub use browser::HeadlessChromeRenderer;
pub use coordinator::{Components, Orchestrator, RunMode, ScrapeRequest};
pub use disguise::{
    BrowserSignature, DisguisePolicy, Identity, Pace, RequestProfile, REFERERS, SIGNATURES,
};
pub use events::{ScrapeEvent, ScrapeObserver, TracingObserver};
pub use extractor::{ExtractionContext, Extractor, FieldOutcome, PageExtraction};
pub use fetcher::{
    FailureKind, FetchError, FetchFailure, FetchPath, FetchStrategy, FetchedPage, Renderer,
    ReqwestTransport, Transport,
};
pub use pacing::{NoopPacer, Pacer, TokioPacer};

use crate::config::Config;
use crate::output::ScrapeResult;

/// Runs a single scrape with production wiring
///
/// This is the main entry point for a one-shot scrape. It will:
/// 1. Build the transport, browser fallback and dataset store from `config`
/// 2. Scrape the requested page range
/// 3. Merge new records into the dataset
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `request` - Page range and mode
///
/// # Returns
///
/// * `Ok(ScrapeResult)` - Scrape completed
/// * `Err(HarvestError)` - Validation, empty result or persistence failure
pub async fn scrape(config: &Config, request: &ScrapeRequest) -> crate::Result<ScrapeResult> {
    Orchestrator::from_config(config)?.run(request).await
}
