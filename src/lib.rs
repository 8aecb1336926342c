//! Biz-Harvest: a resilient business-directory harvester
//!
//! This crate walks a paginated business directory page by page, extracts
//! listing records from each page, and merges them into a deduplicated CSV
//! dataset that grows across runs.

pub mod config;
pub mod crawler;
pub mod output;
pub mod server;
pub mod state;
pub mod storage;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Biz-Harvest operations
///
/// Only the variants that end a run abnormally live here. Per-page fetch
/// failures and per-listing extraction failures are collected into the
/// run result instead of being raised.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Failed to save dataset to {path}: {source}")]
    PersistenceWrite {
        path: PathBuf,
        source: storage::StorageError,
    },

    #[error(
        "No businesses were scraped from {pages_attempted} page(s) ({failed_pages} failed). \
         The site may be blocking automated requests: try again later, during off-peak hours, \
         or configure a proxy"
    )]
    EmptyResult {
        pages_attempted: u32,
        failed_pages: u32,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Returns true if the error was caused by a bad request rather than by the run itself
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Url(_))
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("URL has no category segment: {0}")]
    MissingCategory(String),
}

/// Result type alias for Biz-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Orchestrator, RunMode, ScrapeRequest};
pub use output::{ScrapeResult, ScrapeStats};
pub use storage::{BusinessRecord, CsvDatasetStore, DedupKey};
