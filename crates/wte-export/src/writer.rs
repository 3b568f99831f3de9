//! Parquet writer and terminal rendering for overview records.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use arrow::error::ArrowError;
use arrow::util::pretty::pretty_format_batches;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression as ParquetCompression, ZstdLevel};
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::schema::{overview_schema, overview_to_batch, OverviewRecord};

/// Errors from building or writing overview exports.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] ParquetError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record shape mismatch: {0}")]
    Shape(String),
}

/// Column compression codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Zstd,
    Snappy,
    None,
}

impl Compression {
    fn to_parquet(self) -> ParquetCompression {
        match self {
            Compression::Zstd => ParquetCompression::ZSTD(ZstdLevel::default()),
            Compression::Snappy => ParquetCompression::SNAPPY,
            Compression::None => ParquetCompression::UNCOMPRESSED,
        }
    }
}

/// Writer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterConfig {
    pub compression: Compression,
    /// Value of the `created_by` metadata entry.
    pub created_by: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            created_by: concat!("wte-export ", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl WriterConfig {
    fn properties(&self) -> WriterProperties {
        let metadata = vec![
            KeyValue {
                key: "created_by".to_string(),
                value: Some(self.created_by.clone()),
            },
            KeyValue {
                key: crate::SCHEMA_VERSION_KEY.to_string(),
                value: Some(wte_common::SCHEMA_VERSION.to_string()),
            },
        ];
        WriterProperties::builder()
            .set_compression(self.compression.to_parquet())
            .set_key_value_metadata(Some(metadata))
            .build()
    }
}

/// Write records to a Parquet file at `path`, replacing it atomically.
/// Returns the number of rows written.
pub fn write_overview_parquet(
    records: &[OverviewRecord],
    counter_names: &[String],
    path: &Path,
    config: &WriterConfig,
) -> Result<usize, WriteError> {
    let batch = overview_to_batch(records, counter_names)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    let tmp_path = path.with_extension("parquet.tmp");
    let file = File::create(&tmp_path).map_err(io_err(&tmp_path))?;

    let mut writer = ArrowWriter::try_new(file, overview_schema(counter_names), Some(config.properties()))?;
    writer.write(&batch)?;
    writer.close()?;
    fs::rename(&tmp_path, path).map_err(io_err(path))?;

    debug!(
        path = %path.display(),
        rows = records.len(),
        compression = ?config.compression,
        "overview exported"
    );
    Ok(records.len())
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> WriteError {
    let path = path.to_path_buf();
    move |source| WriteError::Io { path, source }
}

/// Render records as a boxed text table.
pub fn render_overview(
    records: &[OverviewRecord],
    counter_names: &[String],
) -> Result<String, WriteError> {
    let batch = overview_to_batch(records, counter_names)?;
    Ok(pretty_format_batches(&[batch])?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
    use parquet::file::reader::FileReader;
    use parquet::file::serialized_reader::SerializedFileReader;

    fn names() -> Vec<String> {
        vec!["outlet_akl_g_zu".to_string()]
    }

    fn record(key: &str, counter: Option<u64>) -> OverviewRecord {
        OverviewRecord {
            week: Some(3),
            date: NaiveDate::from_ymd_opt(2026, 1, 15),
            batch_key: key.to_string(),
            flag: Some("X".to_string()),
            window_start: NaiveTime::from_hms_opt(8, 0, 0),
            window_end: NaiveTime::from_hms_opt(9, 0, 0),
            duration_ms: Some(3_600_000),
            colli_total: Some(20.0),
            per_colli_duration_ms: Some(180_000),
            throughput_rate: Some(20.0 / 60.0),
            pallet_quantity: Some(2.0),
            per_pallet_duration_ms: Some(1_800_000),
            shift_flag: Some(1),
            counters: vec![counter],
        }
    }

    #[test]
    fn written_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("overview.parquet");
        let records = vec![record("B1", Some(3)), record("B2", None)];

        let written =
            write_overview_parquet(&records, &names(), &path, &WriterConfig::default()).unwrap();
        assert_eq!(written, 2);
        assert!(!path.with_extension("parquet.tmp").exists());

        let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&path).unwrap())
            .unwrap()
            .build()
            .unwrap();
        let rows: usize = reader.map(|b| b.unwrap().num_rows()).sum();
        assert_eq!(rows, 2);
    }

    #[test]
    fn metadata_carries_created_by_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("overview.parquet");
        let config = WriterConfig {
            compression: Compression::Snappy,
            created_by: "test-suite".to_string(),
        };
        write_overview_parquet(&[record("B1", Some(1))], &names(), &path, &config).unwrap();

        let reader = SerializedFileReader::new(File::open(&path).unwrap()).unwrap();
        let kv = reader
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .cloned()
            .unwrap_or_default();
        let value = |key: &str| {
            kv.iter()
                .find(|e| e.key == key)
                .and_then(|e| e.value.clone())
        };
        assert_eq!(value("created_by").as_deref(), Some("test-suite"));
        assert_eq!(
            value(crate::SCHEMA_VERSION_KEY).as_deref(),
            Some(wte_common::SCHEMA_VERSION)
        );
    }

    #[test]
    fn render_shows_keys_and_nulls() {
        let text = render_overview(&[record("B1", Some(3)), record("B2", None)], &names()).unwrap();
        assert!(text.contains("batch_key"));
        assert!(text.contains("B1"));
        assert!(text.contains("outlet_akl_g_zu"));
        assert!(text.contains("08:00:00"));
    }

    #[test]
    fn uncompressed_is_supported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.parquet");
        let config = WriterConfig {
            compression: Compression::None,
            ..WriterConfig::default()
        };
        assert_eq!(
            write_overview_parquet(&[], &names(), &path, &config).unwrap(),
            0
        );
        assert!(path.exists());
    }
}
