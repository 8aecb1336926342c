//! CSV dataset storage
//!
//! One CSV file per dataset in the output directory. Files are rewritten by
//! writing a temporary file next to the target and renaming it into place,
//! so readers never observe a half-written dataset.

use crate::storage::traits::{DatasetStore, StorageError, StorageResult};
use crate::storage::{BusinessRecord, DatasetId, DedupKey, LoadedDataset};
use chrono::{DateTime, SecondsFormat, Utc};
use csv::StringRecord;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

const COL_NAME: &str = "Name";
const COL_ADDRESS: &str = "Address";
const COL_PHONE: &str = "Phone";
const COL_IMAGE_URL: &str = "Image URL";
const COL_VERIFIED: &str = "Verified";
const COL_CATEGORY: &str = "Category";
const COL_SOURCE_PAGE: &str = "Source Page";
const COL_DATE_SCRAPED: &str = "Date Scraped";

/// Column order of a dataset file; `Category` is written only for category datasets
pub const COLUMNS: &[&str] = &[
    COL_NAME,
    COL_ADDRESS,
    COL_PHONE,
    COL_IMAGE_URL,
    COL_VERIFIED,
    COL_CATEGORY,
    COL_SOURCE_PAGE,
    COL_DATE_SCRAPED,
];

/// CSV-backed dataset store rooted at an output directory
#[derive(Debug, Clone)]
pub struct CsvDatasetStore {
    directory: PathBuf,
}

impl CsvDatasetStore {
    /// Creates a store rooted at `directory`
    ///
    /// The directory is created on first write.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// The output directory
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Resolves a file name requested for download
    ///
    /// Returns None for names that could escape the output directory or that
    /// do not exist.
    pub fn resolve_download(&self, file_name: &str) -> Option<PathBuf> {
        if file_name.is_empty()
            || file_name.contains('/')
            || file_name.contains('\\')
            || file_name.contains("..")
        {
            return None;
        }

        let path = self.directory.join(file_name);
        path.is_file().then_some(path)
    }

    /// Reads every record from a dataset file
    ///
    /// Any malformed row fails the whole read.
    pub fn read_records(path: &Path) -> StorageResult<Vec<BusinessRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)?;

        let columns = ColumnIndex::from_headers(reader.headers()?)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            records.push(columns.parse_row(&row)?);
        }

        Ok(records)
    }

    /// Writes `records` to `path`, replacing any previous content atomically
    pub fn write_records(path: &Path, records: &[BusinessRecord]) -> StorageResult<()> {
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(directory)?;

        let with_category = records.iter().any(|r| r.category.is_some());

        let mut temp = tempfile::NamedTempFile::new_in(directory)?;
        {
            let mut writer = csv::Writer::from_writer(temp.as_file_mut());

            let header: Vec<&str> = COLUMNS
                .iter()
                .copied()
                .filter(|c| with_category || *c != COL_CATEGORY)
                .collect();
            writer.write_record(&header)?;

            for record in records {
                writer.write_record(&to_row(record, with_category))?;
            }

            writer.flush()?;
        }
        temp.as_file_mut().flush()?;
        temp.as_file().sync_all()?;

        temp.persist(path).map_err(|e| StorageError::Io(e.error))?;

        Ok(())
    }
}

impl DatasetStore for CsvDatasetStore {
    fn load_dataset(&self, id: &DatasetId) -> StorageResult<LoadedDataset> {
        let path = self.dataset_path(id);

        if !path.exists() {
            return Ok(LoadedDataset::default());
        }

        Self::read_records(&path).map(LoadedDataset::from_records)
    }

    fn merge_and_persist(
        &self,
        id: &DatasetId,
        existing: Vec<BusinessRecord>,
        new: Vec<BusinessRecord>,
    ) -> StorageResult<Vec<BusinessRecord>> {
        let mut seen: HashSet<DedupKey> = existing.iter().map(BusinessRecord::dedup_key).collect();

        let mut combined = existing;
        combined.extend(new.into_iter().filter(|r| seen.insert(r.dedup_key())));

        Self::write_records(&self.dataset_path(id), &combined)?;

        Ok(combined)
    }

    fn dataset_path(&self, id: &DatasetId) -> PathBuf {
        self.directory.join(id.file_name())
    }
}

fn to_row(record: &BusinessRecord, with_category: bool) -> Vec<String> {
    let mut row = vec![
        record.name.clone(),
        record.address.clone(),
        record.phone.clone(),
        record.image_url.clone().unwrap_or_default(),
        record.verified.to_string(),
    ];
    if with_category {
        row.push(record.category.clone().unwrap_or_default());
    }
    row.push(record.source_page.to_string());
    row.push(
        record
            .date_scraped
            .to_rfc3339_opts(SecondsFormat::Millis, true),
    );
    row
}

/// Positions of the known columns in a dataset header
struct ColumnIndex {
    name: usize,
    address: usize,
    phone: usize,
    image_url: usize,
    verified: usize,
    category: Option<usize>,
    source_page: usize,
    date_scraped: usize,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> StorageResult<Self> {
        let find = |column: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(column))
        };
        let require =
            |column: &str| find(column).ok_or_else(|| StorageError::MissingColumn(column.to_string()));

        Ok(Self {
            name: require(COL_NAME)?,
            address: require(COL_ADDRESS)?,
            phone: require(COL_PHONE)?,
            image_url: require(COL_IMAGE_URL)?,
            verified: require(COL_VERIFIED)?,
            category: find(COL_CATEGORY),
            source_page: require(COL_SOURCE_PAGE)?,
            date_scraped: require(COL_DATE_SCRAPED)?,
        })
    }

    fn parse_row(&self, row: &StringRecord) -> StorageResult<BusinessRecord> {
        let line = row.position().map_or(0, |p| p.line());
        let field = |index: usize| row.get(index).unwrap_or("");
        let malformed = |message: String| StorageError::MalformedRow { line, message };

        let verified = match field(self.verified).trim() {
            v if v.eq_ignore_ascii_case("true") => true,
            v if v.eq_ignore_ascii_case("false") => false,
            other => return Err(malformed(format!("invalid verified value '{}'", other))),
        };

        let source_page = field(self.source_page)
            .trim()
            .parse::<u32>()
            .map_err(|e| malformed(format!("invalid source page: {}", e)))?;

        let date_scraped = DateTime::parse_from_rfc3339(field(self.date_scraped).trim())
            .map_err(|e| malformed(format!("invalid date: {}", e)))?
            .with_timezone(&Utc);

        let image_url = Some(field(self.image_url).to_string()).filter(|s| !s.is_empty());
        let category = self
            .category
            .map(|index| field(index).to_string())
            .filter(|s| !s.is_empty());

        Ok(BusinessRecord {
            name: field(self.name).to_string(),
            address: field(self.address).to_string(),
            phone: field(self.phone).to_string(),
            image_url,
            verified,
            category,
            source_page,
            date_scraped,
        })
    }
}
