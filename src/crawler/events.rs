//! Scrape lifecycle events
//!
//! The fetcher and orchestrator report what they do through a
//! `ScrapeObserver` instead of logging inline. Production wiring uses
//! `TracingObserver`; tests plug in a recorder.

use crate::crawler::fetcher::{FailureKind, FetchPath};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Something that happened during a scrape run
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeEvent {
    RunStarted {
        base_url: String,
        start_page: u32,
        end_page: u32,
        dataset: String,
    },
    DatasetLoaded {
        dataset: String,
        records: usize,
    },
    /// The prior dataset could not be read; the run continues with none
    DatasetUnreadable {
        dataset: String,
        error: String,
    },
    AttemptFailed {
        page: u32,
        attempt: u32,
        kind: FailureKind,
        error: String,
        backoff: Option<Duration>,
    },
    BrowserFallbackStarted {
        page: u32,
        url: Url,
    },
    PageFetched {
        page: u32,
        via: FetchPath,
        bytes: usize,
    },
    PageExtracted {
        page: u32,
        new_records: usize,
        duplicates: usize,
        invalid: usize,
        item_errors: usize,
    },
    PageFailed {
        page: u32,
        kind: FailureKind,
        error: String,
    },
    EarlyStop {
        page: u32,
        consecutive_not_found: u32,
    },
    Cancelled {
        page: u32,
    },
    DatasetPersisted {
        path: PathBuf,
        total_records: usize,
    },
}

/// Receives scrape events
pub trait ScrapeObserver: Send + Sync {
    fn on_event(&self, event: &ScrapeEvent);
}

/// Writes every event to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ScrapeObserver for TracingObserver {
    fn on_event(&self, event: &ScrapeEvent) {
        match event {
            ScrapeEvent::RunStarted {
                base_url,
                start_page,
                end_page,
                dataset,
            } => {
                tracing::info!(%base_url, start_page, end_page, %dataset, "Starting scrape");
            }
            ScrapeEvent::DatasetLoaded { dataset, records } => {
                tracing::info!(%dataset, records, "Loaded existing dataset");
            }
            ScrapeEvent::DatasetUnreadable { dataset, error } => {
                tracing::warn!(%dataset, %error, "Existing dataset unreadable, starting empty");
            }
            ScrapeEvent::AttemptFailed {
                page,
                attempt,
                kind,
                error,
                backoff,
            } => {
                tracing::warn!(
                    page,
                    attempt,
                    kind = %kind,
                    backoff_ms = backoff.map(|d| d.as_millis() as u64),
                    "Fetch attempt failed: {}",
                    error
                );
            }
            ScrapeEvent::BrowserFallbackStarted { page, url } => {
                tracing::info!(page, %url, "Falling back to headless browser");
            }
            ScrapeEvent::PageFetched { page, via, bytes } => {
                tracing::debug!(page, via = %via, bytes, "Page fetched");
            }
            ScrapeEvent::PageExtracted {
                page,
                new_records,
                duplicates,
                invalid,
                item_errors,
            } => {
                tracing::info!(
                    page,
                    new_records,
                    duplicates,
                    invalid,
                    item_errors,
                    "Page extracted"
                );
            }
            ScrapeEvent::PageFailed { page, kind, error } => {
                tracing::error!(page, kind = %kind, "Page failed: {}", error);
            }
            ScrapeEvent::EarlyStop {
                page,
                consecutive_not_found,
            } => {
                tracing::warn!(
                    page,
                    consecutive_not_found,
                    "Stopping early, pages no longer exist"
                );
            }
            ScrapeEvent::Cancelled { page } => {
                tracing::warn!(page, "Scrape cancelled");
            }
            ScrapeEvent::DatasetPersisted {
                path,
                total_records,
            } => {
                tracing::info!(path = %path.display(), total_records, "Dataset saved");
            }
        }
    }
}
