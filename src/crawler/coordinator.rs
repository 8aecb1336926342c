//! Page-range orchestration
//!
//! This module contains the main scrape loop that coordinates a run:
//! - Validating the request before any network activity
//! - Loading the prior dataset and its key set
//! - Fetching and extracting pages strictly in order, with pacing
//! - Stopping early when the directory runs out of pages
//! - Merging new records into the dataset and reporting statistics

use crate::config::{validate, Config};
use crate::crawler::browser::HeadlessChromeRenderer;
use crate::crawler::disguise::{DisguisePolicy, Pace};
use crate::crawler::events::{ScrapeEvent, ScrapeObserver, TracingObserver};
use crate::crawler::extractor::{ExtractionContext, Extractor};
use crate::crawler::fetcher::{FetchStrategy, Renderer, ReqwestTransport, Transport};
use crate::crawler::pacing::{Pacer, TokioPacer};
use crate::output::{PageFailure, ScrapeResult};
use crate::storage::{
    scrape_timestamp, BusinessRecord, CsvDatasetStore, DatasetId, DatasetStore, LoadedDataset,
};
use crate::url::PageLayout;
use crate::{ConfigError, HarvestError, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How page numbers map onto URLs and which dataset a run feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Page number appended to the base URL; records go to the default dataset
    Standard,
    /// Category listing; records go to the category's own dataset
    Category,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Category => write!(f, "category"),
        }
    }
}

/// One scrape run's parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeRequest {
    pub base_url: String,
    pub start_page: u32,
    pub end_page: u32,
    pub mode: RunMode,
}

impl ScrapeRequest {
    pub fn new(base_url: impl Into<String>, start_page: u32, end_page: u32, mode: RunMode) -> Self {
        Self {
            base_url: base_url.into(),
            start_page,
            end_page,
            mode,
        }
    }

    /// Checks the page range and parses the base URL
    ///
    /// # Returns
    ///
    /// * `Ok(PageLayout)` - The request is runnable
    /// * `Err(HarvestError)` - A validation error; nothing was fetched
    pub fn validate(&self) -> Result<PageLayout> {
        if self.start_page < 1 {
            return Err(HarvestError::Validation(
                "startPage must be a positive integer".to_string(),
            ));
        }
        if self.end_page < self.start_page {
            return Err(HarvestError::Validation(format!(
                "startPage ({}) must not be greater than endPage ({})",
                self.start_page, self.end_page
            )));
        }

        let layout = match self.mode {
            RunMode::Standard => PageLayout::standard(&self.base_url)?,
            RunMode::Category => PageLayout::category(&self.base_url)?,
        };
        Ok(layout)
    }
}

/// The collaborators an orchestrator is wired with
pub struct Components {
    pub transport: Arc<dyn Transport>,
    /// None disables the browser fallback
    pub renderer: Option<Arc<dyn Renderer>>,
    pub store: Arc<dyn DatasetStore>,
    pub pacer: Arc<dyn Pacer>,
    pub observer: Arc<dyn ScrapeObserver>,
}

/// Runs page ranges against a directory
///
/// Pages are processed one at a time; concurrent fetching would defeat the
/// pacing. Runs against the same dataset must not overlap: the dataset is
/// read at the start and rewritten at the end without locking.
pub struct Orchestrator {
    fetcher: FetchStrategy,
    extractor: Extractor,
    store: Arc<dyn DatasetStore>,
    policy: Arc<DisguisePolicy>,
    pacer: Arc<dyn Pacer>,
    observer: Arc<dyn ScrapeObserver>,
    default_dataset: DatasetId,
    early_stop_window: u32,
    stop: Option<Arc<AtomicBool>>,
}

impl Orchestrator {
    /// Creates an orchestrator with production collaborators
    ///
    /// Uses a reqwest transport, headless Chrome when available, CSV files
    /// in the configured output directory, real sleeping and tracing output.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config.fetch, &config.proxy)?);
        let renderer = HeadlessChromeRenderer::from_config(
            &config.browser,
            &config.proxy,
            Duration::from_secs(config.fetch.timeout_secs),
        )
        .map(|r| Arc::new(r) as Arc<dyn Renderer>);

        Self::new(
            config,
            Components {
                transport,
                renderer,
                store: Arc::new(CsvDatasetStore::new(&config.output.directory)),
                pacer: Arc::new(TokioPacer),
                observer: Arc::new(TracingObserver),
            },
        )
    }

    /// Creates an orchestrator from explicit collaborators
    ///
    /// The configuration is validated here as well, since callers may build
    /// it in code rather than load it from a file.
    pub fn new(config: &Config, components: Components) -> Result<Self> {
        validate(config)?;
        let extractor = Extractor::new(&config.selectors)?;
        let default_dataset = DatasetId::new(&config.output.default_dataset).ok_or_else(|| {
            ConfigError::Validation(format!(
                "output.default-dataset '{}' is not a valid file name",
                config.output.default_dataset
            ))
        })?;

        let policy = Arc::new(DisguisePolicy::new(config.pacing.clone()));
        let fetcher = FetchStrategy::new(
            components.transport,
            components.renderer,
            policy.clone(),
            components.pacer.clone(),
            components.observer.clone(),
            &config.fetch,
        );

        Ok(Self {
            fetcher,
            extractor,
            store: components.store,
            policy,
            pacer: components.pacer,
            observer: components.observer,
            default_dataset,
            early_stop_window: config.pacing.early_stop_window,
            stop: None,
        })
    }

    /// Checks `flag` between pages and ends the run once it is set
    ///
    /// A cancelled run still saves what it gathered.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn store(&self) -> &Arc<dyn DatasetStore> {
        &self.store
    }

    /// Whether a rendered-browser fallback is wired in
    pub fn browser_available(&self) -> bool {
        self.fetcher.plan().browser_available
    }

    /// The dataset a request will feed
    pub fn dataset_for(&self, layout: &PageLayout) -> DatasetId {
        match layout.category_name() {
            Some(category) => DatasetId::for_category(category),
            None => self.default_dataset.clone(),
        }
    }

    /// Scrapes a page range and merges the results into its dataset
    ///
    /// # Returns
    ///
    /// * `Ok(ScrapeResult)` - New records, per-page and per-listing failures, statistics
    /// * `Err(HarvestError::Validation | Url)` - Bad request; nothing was fetched
    /// * `Err(HarvestError::EmptyResult)` - No listing was found on any page
    /// * `Err(HarvestError::PersistenceWrite)` - The dataset could not be saved
    pub async fn run(&self, request: &ScrapeRequest) -> Result<ScrapeResult> {
        let layout = request.validate()?;
        let dataset = self.dataset_for(&layout);
        let category = layout.category_name().map(str::to_string);
        let origin = layout.origin();

        self.observer.on_event(&ScrapeEvent::RunStarted {
            base_url: request.base_url.clone(),
            start_page: request.start_page,
            end_page: request.end_page,
            dataset: dataset.to_string(),
        });

        let LoadedDataset {
            records: existing,
            mut keys,
        } = self.load_or_empty(&dataset);

        let mut result = ScrapeResult::default();
        let mut candidates_seen = 0;
        let mut consecutive_not_found = 0;
        let mut pace = Pace::First;

        for page in request.start_page..=request.end_page {
            if self.is_cancelled() {
                self.observer.on_event(&ScrapeEvent::Cancelled { page });
                result.stats.cancelled = true;
                break;
            }

            let profile = self.policy.next_request_profile(request.mode, pace);
            if !profile.delay_before.is_zero() {
                self.pacer.pause(profile.delay_before).await;
            }

            let url = layout.page_url(page);
            result.stats.total_pages_attempted += 1;

            let missing = match self.fetcher.fetch_page(&url, page, profile.identity).await {
                Ok(fetched) => {
                    result.stats.successful_pages += 1;

                    let context = ExtractionContext {
                        page,
                        origin: &origin,
                        category: category.as_deref(),
                        scraped_at: scrape_timestamp(),
                    };
                    let extraction = self.extractor.extract(&fetched.markup, &context, &keys);

                    self.observer.on_event(&ScrapeEvent::PageExtracted {
                        page,
                        new_records: extraction.records.len(),
                        duplicates: extraction.duplicates,
                        invalid: extraction.invalid,
                        item_errors: extraction.item_errors.len(),
                    });

                    let candidates = extraction.candidates();
                    candidates_seen += candidates;
                    result.stats.duplicates_skipped += extraction.duplicates;
                    result.stats.invalid_skipped += extraction.invalid;
                    keys.extend(extraction.records.iter().map(BusinessRecord::dedup_key));
                    result.businesses.extend(extraction.records);
                    result.item_errors.extend(extraction.item_errors);

                    pace = Pace::AfterSuccess;

                    // A rendered 404 page has no listings
                    fetched.not_found && candidates == 0
                }
                Err(error) => {
                    self.observer.on_event(&ScrapeEvent::PageFailed {
                        page,
                        kind: error.kind,
                        error: error.message.clone(),
                    });

                    result.stats.failed_pages += 1;
                    result.errors.push(PageFailure::from(&error));
                    pace = Pace::AfterFailure;

                    error.not_found
                }
            };

            if missing {
                consecutive_not_found += 1;
            } else {
                consecutive_not_found = 0;
            }

            if self.early_stop_window > 0
                && consecutive_not_found >= self.early_stop_window
                && page < request.end_page
            {
                self.observer.on_event(&ScrapeEvent::EarlyStop {
                    page,
                    consecutive_not_found,
                });
                result.stats.stopped_early = true;
                break;
            }
        }

        if candidates_seen == 0 && !result.stats.cancelled {
            return Err(HarvestError::EmptyResult {
                pages_attempted: result.stats.total_pages_attempted,
                failed_pages: result.stats.failed_pages,
            });
        }

        result.stats.new_businesses_scraped = result.businesses.len();
        result.stats.output_file = dataset.file_name();
        result.stats.category = category;
        result.stats.total_businesses_saved = if result.businesses.is_empty() {
            existing.len()
        } else {
            self.persist(&dataset, existing, result.businesses.clone())?
        };

        Ok(result)
    }

    /// Loads the prior dataset; an unreadable one counts as empty
    fn load_or_empty(&self, dataset: &DatasetId) -> LoadedDataset {
        match self.store.load_dataset(dataset) {
            Ok(loaded) => {
                self.observer.on_event(&ScrapeEvent::DatasetLoaded {
                    dataset: dataset.to_string(),
                    records: loaded.len(),
                });
                loaded
            }
            Err(e) => {
                self.observer.on_event(&ScrapeEvent::DatasetUnreadable {
                    dataset: dataset.to_string(),
                    error: e.to_string(),
                });
                LoadedDataset::default()
            }
        }
    }

    fn persist(
        &self,
        dataset: &DatasetId,
        existing: Vec<BusinessRecord>,
        new: Vec<BusinessRecord>,
    ) -> Result<usize> {
        let path = self.store.dataset_path(dataset);
        let combined = self
            .store
            .merge_and_persist(dataset, existing, new)
            .map_err(|source| HarvestError::PersistenceWrite {
                path: path.clone(),
                source,
            })?;

        self.observer.on_event(&ScrapeEvent::DatasetPersisted {
            path,
            total_records: combined.len(),
        });

        Ok(combined.len())
    }

    fn is_cancelled(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }
}
