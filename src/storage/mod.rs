//! Storage module for persisting harvested businesses
//!
//! This module handles the durable dataset side of a run:
//! - The `BusinessRecord` type and its deduplication key
//! - Dataset identifiers (global default or one per category)
//! - Loading a prior dataset and rewriting it with merged results

mod csv_store;
mod traits;

pub use csv_store::{CsvDatasetStore, COLUMNS};
pub use traits::{DatasetStore, StorageError, StorageResult};

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// One directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRecord {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub image_url: Option<String>,
    pub verified: bool,
    /// Present only in category-scoped scrapes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub source_page: u32,
    pub date_scraped: DateTime<Utc>,
}

impl BusinessRecord {
    /// Returns the key used to recognise this business across runs
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.name, &self.address)
    }

    /// Returns true if the record satisfies the minimum-field rule
    ///
    /// A name is required, plus at least one way to reach the business.
    pub fn is_acceptable(&self) -> bool {
        !self.name.is_empty() && (!self.address.is_empty() || !self.phone.is_empty())
    }
}

/// Timestamp for a freshly scraped record
///
/// Truncated to milliseconds, the precision the dataset file keeps.
pub fn scrape_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Deduplication key: two records with the same name but different
/// addresses are distinct businesses
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DedupKey {
    pub name: String,
    pub address: String,
}

impl DedupKey {
    pub fn new(name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            address: address.to_string(),
        }
    }
}

/// Logical name of a persisted dataset
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetId(String);

impl DatasetId {
    /// Creates an identifier from an already safe name
    ///
    /// Returns None if the name contains anything but letters, digits, `-` and `_`.
    pub fn new(name: &str) -> Option<Self> {
        crate::config::is_safe_file_stem(name).then(|| Self(name.to_string()))
    }

    /// Derives the identifier of a category dataset from a category name
    ///
    /// # Examples
    ///
    /// ```
    /// use biz_harvest::storage::DatasetId;
    ///
    /// assert_eq!(DatasetId::for_category("Car Rental").as_str(), "category_car_rental");
    /// ```
    pub fn for_category(category: &str) -> Self {
        let mut sanitized = String::with_capacity(category.len());
        for c in category.trim().chars() {
            if c.is_ascii_alphanumeric() || c == '-' {
                sanitized.push(c.to_ascii_lowercase());
            } else if !sanitized.ends_with('_') {
                sanitized.push('_');
            }
        }

        let sanitized = sanitized.trim_matches('_');
        if sanitized.is_empty() {
            Self("category_uncategorized".to_string())
        } else {
            Self(format!("category_{}", sanitized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the dataset inside the output directory
    pub fn file_name(&self) -> String {
        format!("{}.csv", self.0)
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A dataset read at the start of a run, with its key set
///
/// Both halves come from the same list of records so they cannot drift.
#[derive(Debug, Clone, Default)]
pub struct LoadedDataset {
    pub records: Vec<BusinessRecord>,
    pub keys: HashSet<DedupKey>,
}

impl LoadedDataset {
    pub fn from_records(records: Vec<BusinessRecord>) -> Self {
        let keys = records.iter().map(BusinessRecord::dedup_key).collect();
        Self { records, keys }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;

    /// Builds a record with a fixed timestamp
    pub fn record(name: &str, address: &str, phone: &str) -> BusinessRecord {
        BusinessRecord {
            name: name.to_string(),
            address: address.to_string(),
            phone: phone.to_string(),
            image_url: None,
            verified: false,
            category: None,
            source_page: 1,
            date_scraped: Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn test_acceptance_rule() {
        assert!(record("Nile Bakery", "12 Tahrir St", "").is_acceptable());
        assert!(record("Nile Bakery", "", "0100 000 0000").is_acceptable());
        assert!(!record("Nile Bakery", "", "").is_acceptable());
        assert!(!record("", "12 Tahrir St", "0100 000 0000").is_acceptable());
    }

    #[test]
    fn test_dedup_key_distinguishes_addresses() {
        let a = record("Nile Bakery", "12 Tahrir St", "");
        let b = record("Nile Bakery", "3 Corniche Rd", "");
        let c = record("Nile Bakery", "12 Tahrir St", "0100");
        assert_ne!(a.dedup_key(), b.dedup_key());
        assert_eq!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn test_loaded_dataset_keys_match_records() {
        let dataset = LoadedDataset::from_records(vec![
            record("A", "1", ""),
            record("B", "2", ""),
        ]);
        assert_eq!(dataset.len(), 2);
        assert!(dataset.keys.contains(&DedupKey::new("A", "1")));
        assert!(dataset.keys.contains(&DedupKey::new("B", "2")));
    }

    #[test]
    fn test_dataset_id_validation() {
        assert!(DatasetId::new("businesses").is_some());
        assert!(DatasetId::new("../secrets").is_none());
    }

    #[test]
    fn test_category_dataset_id() {
        assert_eq!(
            DatasetId::for_category("pharmacies").as_str(),
            "category_pharmacies"
        );
        assert_eq!(
            DatasetId::for_category("Car  Rental & Hire").as_str(),
            "category_car_rental_hire"
        );
        assert_eq!(
            DatasetId::for_category("%%%").as_str(),
            "category_uncategorized"
        );
        assert_eq!(
            DatasetId::for_category("pharmacies").file_name(),
            "category_pharmacies.csv"
        );
    }

    #[test]
    fn test_scrape_timestamp_has_millisecond_precision() {
        let ts = scrape_timestamp();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let mut rec = record("A", "1", "");
        rec.image_url = Some("https://img.example/a.png".to_string());
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["imageUrl"], "https://img.example/a.png");
        assert_eq!(json["sourcePage"], 1);
        assert!(json.get("category").is_none());
    }
}
