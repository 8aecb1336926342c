//! Statistics for runs and datasets
//!
//! This module prints the summary of a finished run and computes
//! statistics over a stored dataset.

use crate::output::ScrapeResult;
use crate::storage::{DatasetId, DatasetStore, StorageResult};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Statistics of a stored dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetStatistics {
    pub dataset: String,
    pub path: PathBuf,
    pub total_records: usize,
    pub verified: usize,
    pub with_phone: usize,
    pub with_image: usize,
    /// Record count per source page
    pub records_by_page: BTreeMap<u32, usize>,
    /// Record count per category, for category datasets
    pub records_by_category: BTreeMap<String, usize>,
}

/// Loads statistics for a dataset
///
/// # Arguments
///
/// * `store` - The dataset backend
/// * `id` - Dataset to inspect
///
/// # Returns
///
/// * `Ok(DatasetStatistics)` - An absent dataset yields zero counts
/// * `Err(StorageError)` - The dataset exists but could not be read
pub fn load_statistics(store: &dyn DatasetStore, id: &DatasetId) -> StorageResult<DatasetStatistics> {
    let dataset = store.load_dataset(id)?;

    let mut stats = DatasetStatistics {
        dataset: id.to_string(),
        path: store.dataset_path(id),
        total_records: dataset.len(),
        ..DatasetStatistics::default()
    };

    for record in &dataset.records {
        if record.verified {
            stats.verified += 1;
        }
        if !record.phone.is_empty() {
            stats.with_phone += 1;
        }
        if record.image_url.is_some() {
            stats.with_image += 1;
        }
        *stats.records_by_page.entry(record.source_page).or_insert(0) += 1;
        if let Some(category) = &record.category {
            *stats
                .records_by_category
                .entry(category.clone())
                .or_insert(0) += 1;
        }
    }

    Ok(stats)
}

/// Prints dataset statistics to stdout
pub fn print_statistics(stats: &DatasetStatistics) {
    println!("=== Dataset Statistics: {} ===\n", stats.dataset);

    println!("Overview:");
    println!("  File: {}", stats.path.display());
    println!("  Total businesses: {}", stats.total_records);
    println!(
        "  Verified: {} ({:.1}%)",
        stats.verified,
        percentage(stats.verified, stats.total_records)
    );
    println!(
        "  With phone: {} ({:.1}%)",
        stats.with_phone,
        percentage(stats.with_phone, stats.total_records)
    );
    println!(
        "  With image: {} ({:.1}%)",
        stats.with_image,
        percentage(stats.with_image, stats.total_records)
    );
    println!();

    if !stats.records_by_category.is_empty() {
        println!("By Category:");
        for (category, count) in &stats.records_by_category {
            println!("  {}: {}", category, count);
        }
        println!();
    }

    if !stats.records_by_page.is_empty() {
        println!("By Source Page:");
        for (page, count) in &stats.records_by_page {
            println!("  Page {}: {}", page, count);
        }
    }
}

/// Prints the summary of a finished run to stdout
pub fn print_scrape_summary(result: &ScrapeResult) {
    let stats = &result.stats;

    println!("=== Scrape Summary ===\n");
    println!(
        "Pages: {} attempted, {} succeeded, {} failed",
        stats.total_pages_attempted, stats.successful_pages, stats.failed_pages
    );
    println!(
        "Businesses: {} new, {} already known, {} incomplete",
        stats.new_businesses_scraped, stats.duplicates_skipped, stats.invalid_skipped
    );
    println!(
        "Dataset: {} ({} total)",
        stats.output_file, stats.total_businesses_saved
    );
    if let Some(category) = &stats.category {
        println!("Category: {}", category);
    }
    if stats.stopped_early {
        println!("Stopped early: the directory appears to have run out of pages");
    }
    if stats.cancelled {
        println!("Cancelled before the end of the page range");
    }

    if !result.errors.is_empty() {
        println!("\nPage Errors ({}):", result.errors.len());
        for error in &result.errors {
            println!("  - page {} [{}] {}: {}", error.page, error.kind, error.url, error.error);
        }
    }

    if !result.item_errors.is_empty() {
        println!("\nListing Errors ({}):", result.item_errors.len());
        for error in &result.item_errors {
            println!("  - page {}: {}", error.page, error.message);
        }
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total > 0 {
        (part as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::record;
    use crate::storage::CsvDatasetStore;

    #[test]
    fn test_statistics_of_absent_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvDatasetStore::new(dir.path());
        let id = DatasetId::new("businesses").unwrap();

        let stats = load_statistics(&store, &id).unwrap();
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.dataset, "businesses");
    }

    #[test]
    fn test_statistics_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvDatasetStore::new(dir.path());
        let id = DatasetId::for_category("gyms");

        let mut a = record("A", "1", "0100");
        a.verified = true;
        a.category = Some("gyms".to_string());
        let mut b = record("B", "2", "");
        b.source_page = 2;
        b.image_url = Some("https://img.example/b.png".to_string());
        b.category = Some("gyms".to_string());
        store.merge_and_persist(&id, vec![], vec![a, b]).unwrap();

        let stats = load_statistics(&store, &id).unwrap();
        assert_eq!(stats.total_records, 2);
        assert_eq!(stats.verified, 1);
        assert_eq!(stats.with_phone, 1);
        assert_eq!(stats.with_image, 1);
        assert_eq!(stats.records_by_page.get(&1), Some(&1));
        assert_eq!(stats.records_by_page.get(&2), Some(&1));
        assert_eq!(stats.records_by_category.get("gyms"), Some(&2));
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(3, 0), 0.0);
    }
}
