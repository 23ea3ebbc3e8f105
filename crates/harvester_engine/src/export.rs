use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{DateTime, Local};
use engine_logging::{engine_info, engine_warn};
use harvester_core::ListingRecord;
use serde::Serialize;

use crate::filename::run_filename;
use crate::persist::{AtomicFileWriter, PersistError};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Final destination for the accumulated collection.
pub trait ResultSink: Send + Sync {
    /// Writes one run's records. An empty slice writes nothing and yields no paths.
    fn persist(
        &self,
        records: &[ListingRecord],
        run_at: DateTime<Local>,
    ) -> Result<Vec<PathBuf>, ExportError>;
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub prefix: String,
    /// `metadata.source` in the JSON document.
    pub source_label: String,
    pub write_csv: bool,
    pub write_json: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            prefix: "dealapp".to_string(),
            source_label: "DealApp Scraper".to_string(),
            write_csv: true,
            write_json: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Column layout shared by the CSV header and the JSON `properties` entries.
#[derive(Debug, Serialize)]
struct ListingRow<'a> {
    #[serde(rename = "type")]
    property_type: &'a str,
    listing_type: &'a str,
    city: &'a str,
    district: &'a str,
    district_en: &'a str,
    price: &'a str,
    price_numeric: f64,
    area: &'a str,
    area_numeric: f64,
    bedrooms: f64,
    ad_id: &'a str,
    code: &'a str,
    title: &'a str,
    lat: Option<f64>,
    lng: Option<f64>,
    created_at: &'a str,
    source: &'a str,
    #[serde(rename = "extraction_date")]
    extracted_at: &'a str,
}

impl<'a> From<&'a ListingRecord> for ListingRow<'a> {
    fn from(record: &'a ListingRecord) -> Self {
        Self {
            property_type: &record.property_type,
            listing_type: &record.listing_type,
            city: &record.city,
            district: &record.district,
            district_en: &record.district_en,
            price: &record.price,
            price_numeric: record.price_numeric,
            area: &record.area,
            area_numeric: record.area_numeric,
            bedrooms: record.bedrooms,
            ad_id: &record.ad_id,
            code: &record.code,
            title: &record.title,
            lat: record.lat,
            lng: record.lng,
            created_at: &record.created_at,
            source: &record.source,
            extracted_at: &record.extracted_at,
        }
    }
}

#[derive(Debug, Serialize)]
struct ExportMetadata<'a> {
    timestamp: String,
    total_properties: usize,
    source: &'a str,
}

#[derive(Debug, Serialize)]
struct ExportDocument<'a> {
    metadata: ExportMetadata<'a>,
    properties: Vec<ListingRow<'a>>,
}

/// Writes a timestamped CSV and JSON pair into one directory.
#[derive(Debug, Clone)]
pub struct FileResultSink {
    options: ExportOptions,
    writer: AtomicFileWriter,
}

impl FileResultSink {
    pub fn new(options: ExportOptions) -> Self {
        let writer = AtomicFileWriter::new(options.output_dir.clone());
        Self { options, writer }
    }

    fn write_csv(
        &self,
        records: &[ListingRecord],
        run_at: &DateTime<Local>,
    ) -> Result<PathBuf, ExportError> {
        // Encode up front so csv errors keep their type instead of folding into io.
        let mut encoder = csv::Writer::from_writer(Vec::with_capacity(records.len() * 256));
        for record in records {
            encoder.serialize(ListingRow::from(record))?;
        }
        let body = encoder
            .into_inner()
            .map_err(|err| ExportError::Persist(PersistError::Io(err.into_error())))?;

        let filename = run_filename(&self.options.prefix, run_at, "csv");
        let path = self.writer.write_with(&filename, |out: &mut dyn Write| {
            out.write_all(UTF8_BOM)?;
            out.write_all(&body)
        })?;
        Ok(path)
    }

    fn write_json(
        &self,
        records: &[ListingRecord],
        run_at: &DateTime<Local>,
    ) -> Result<PathBuf, ExportError> {
        let document = ExportDocument {
            metadata: ExportMetadata {
                timestamp: run_at.to_rfc3339(),
                total_properties: records.len(),
                source: &self.options.source_label,
            },
            properties: records.iter().map(ListingRow::from).collect(),
        };
        let body = serde_json::to_vec_pretty(&document)?;

        let filename = run_filename(&self.options.prefix, run_at, "json");
        let path = self
            .writer
            .write_with(&filename, |out: &mut dyn Write| -> io::Result<()> {
                out.write_all(&body)
            })?;
        Ok(path)
    }
}

impl ResultSink for FileResultSink {
    fn persist(
        &self,
        records: &[ListingRecord],
        run_at: DateTime<Local>,
    ) -> Result<Vec<PathBuf>, ExportError> {
        if records.is_empty() {
            engine_warn!("No listings to save");
            return Ok(Vec::new());
        }

        let mut paths = Vec::with_capacity(2);
        if self.options.write_csv {
            let path = self.write_csv(records, &run_at)?;
            engine_info!("Saved {} listings to CSV: {}", records.len(), path.display());
            paths.push(path);
        }
        if self.options.write_json {
            let path = self.write_json(records, &run_at)?;
            engine_info!("Saved {} listings to JSON: {}", records.len(), path.display());
            paths.push(path);
        }
        Ok(paths)
    }
}
