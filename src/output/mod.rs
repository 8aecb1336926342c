//! Output module for scrape results and summaries
//!
//! This module handles:
//! - The result returned by a scrape run (records, failures, statistics)
//! - Printing run summaries and dataset statistics for the CLI

pub mod stats;

pub use stats::{load_statistics, print_scrape_summary, print_statistics, DatasetStatistics};

use crate::crawler::FetchError;
use crate::storage::BusinessRecord;
use serde::Serialize;

/// A page that could not be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageFailure {
    pub page: u32,
    pub url: String,
    pub error: String,
    /// Failure classification, e.g. `not_found` or `blocked_403`
    pub kind: String,
}

impl From<&FetchError> for PageFailure {
    fn from(error: &FetchError) -> Self {
        Self {
            page: error.page,
            url: error.url.to_string(),
            error: error.message.clone(),
            kind: error.kind.to_string(),
        }
    }
}

/// A listing that could not be read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub page: u32,
    pub message: String,
}

/// Aggregate numbers of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeStats {
    pub total_pages_attempted: u32,
    pub successful_pages: u32,
    pub failed_pages: u32,
    pub new_businesses_scraped: usize,
    /// Acceptable listings that were already known
    pub duplicates_skipped: usize,
    /// Listings dropped for lacking a name or any contact detail
    pub invalid_skipped: usize,
    pub total_businesses_saved: usize,
    /// File name of the dataset inside the output directory
    pub output_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub stopped_early: bool,
    pub cancelled: bool,
}

/// Everything a run produced
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeResult {
    /// Records added by this run, in discovery order
    pub businesses: Vec<BusinessRecord>,
    pub errors: Vec<PageFailure>,
    pub item_errors: Vec<ItemFailure>,
    pub stats: ScrapeStats,
}
