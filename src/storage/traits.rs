//! Storage traits and error types
//!
//! This module defines the trait interface for dataset backends and
//! associated error types.

use crate::storage::{BusinessRecord, DatasetId, LoadedDataset};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column '{0}' in dataset header")]
    MissingColumn(String),

    #[error("Malformed row at line {line}: {message}")]
    MalformedRow { line: u64, message: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for dataset backends
///
/// A dataset is read once at the start of a run and rewritten in full at the
/// end. There is no locking: two runs against the same dataset race, and the
/// last writer wins.
pub trait DatasetStore: Send + Sync {
    /// Reads a dataset
    ///
    /// An absent dataset is not an error and yields an empty result.
    fn load_dataset(&self, id: &DatasetId) -> StorageResult<LoadedDataset>;

    /// Appends `new` after `existing` and rewrites the dataset atomically
    ///
    /// Existing records keep their order; new records follow in discovery
    /// order. A new record whose key is already present is dropped, so the
    /// stored dataset holds at most one record per key.
    ///
    /// # Returns
    ///
    /// The combined records as written
    fn merge_and_persist(
        &self,
        id: &DatasetId,
        existing: Vec<BusinessRecord>,
        new: Vec<BusinessRecord>,
    ) -> StorageResult<Vec<BusinessRecord>>;

    /// Where the dataset lives, for reporting
    fn dataset_path(&self, id: &DatasetId) -> PathBuf;
}
