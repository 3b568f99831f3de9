//! Pipeline configuration types.
//!
//! Every table the pipeline touches is addressed through [`TableNames`], and
//! every label the staging filters compare against lives in
//! [`FilterMarkers`]. Defaults reproduce the German-labelled workbook the
//! pipeline was built for.

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::counter::{default_counters, CounterSpec, COUNTER_COUNT};
use crate::validate::ValidationResult;

/// Errors from loading or validating a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse TOML config {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported config format (expected .json or .toml): {0}")]
    UnsupportedFormat(PathBuf),

    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(ValidationResult),
}

impl From<ConfigError> for wte_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(result) => wte_common::Error::Validation(result.to_string()),
            other => wte_common::Error::Config(other.to_string()),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PipelineConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub tables: TableNames,

    #[serde(default)]
    pub markers: FilterMarkers,

    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default = "default_counters")]
    pub counters: [CounterSpec; COUNTER_COUNT],

    /// `chrono` layouts tried in order when parsing raw timestamps.
    #[serde(default = "default_timestamp_formats")]
    pub timestamp_formats: Vec<String>,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

fn default_timestamp_formats() -> Vec<String> {
    vec![
        "%d.%m.%Y %H:%M:%S".to_string(),
        "%d/%m/%Y %H:%M:%S".to_string(),
        "%Y-%m-%d %H:%M:%S".to_string(),
        "%Y-%m-%dT%H:%M:%S".to_string(),
    ]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            tables: TableNames::default(),
            markers: FilterMarkers::default(),
            thresholds: Thresholds::default(),
            counters: default_counters(),
            timestamp_formats: default_timestamp_formats(),
        }
    }
}

impl PipelineConfig {
    /// Load a config file, picking the parser by extension, then validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config: PipelineConfig = match extension.as_deref() {
            Some("json") => serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            Some("toml") => toml::from_str(&content).map_err(|source| ConfigError::Toml {
                path: path.to_path_buf(),
                source,
            })?,
            _ => return Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        };

        config.validated()
    }

    /// Run semantic validation, returning the config unchanged on success.
    pub fn validated(self) -> Result<Self, ConfigError> {
        let result = crate::validate::validate(&self);
        if result.is_ok() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid(result))
        }
    }

    /// Names of every table the pipeline expects to exist.
    pub fn all_tables(&self) -> Vec<&str> {
        self.tables.all()
    }

    /// Counter column names in layout order.
    pub fn counter_names(&self) -> Vec<&str> {
        self.counters.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Table-name registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct TableNames {
    /// Raw transport statistics (source).
    pub transport_events: String,
    /// Raw order-status change log (source).
    pub status_changes: String,
    /// Raw order monitor snapshot (source).
    pub order_monitor: String,
    /// Shipment timings staging table.
    pub shipment_timings: String,
    /// Pallet finalization staging table.
    pub pallet_finalizations: String,
    /// Order flags staging table.
    pub order_flags: String,
    /// Per-run aggregate table.
    pub aggregates: String,
    /// Permanent archive of aggregate rows.
    pub overview: String,
    /// Yearly rollup view activated after cleanup.
    pub overview_yearly: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            transport_events: "Transport Statistik".to_string(),
            status_changes: "Änderungen des Auftragsstatus".to_string(),
            order_monitor: "AuftragsmonitorAp".to_string(),
            shipment_timings: "TS".to_string(),
            pallet_finalizations: "PAL".to_string(),
            order_flags: "AF".to_string(),
            aggregates: "Step2Formulas".to_string(),
            overview: "Übersicht".to_string(),
            overview_yearly: "Übersicht Jahr".to_string(),
        }
    }
}

impl TableNames {
    pub fn all(&self) -> Vec<&str> {
        vec![
            self.transport_events.as_str(),
            self.status_changes.as_str(),
            self.order_monitor.as_str(),
            self.shipment_timings.as_str(),
            self.pallet_finalizations.as_str(),
            self.order_flags.as_str(),
            self.aggregates.as_str(),
            self.overview.as_str(),
            self.overview_yearly.as_str(),
        ]
    }

    /// Staging tables, fully recreated every run.
    pub fn staging(&self) -> [&str; 4] {
        [
            self.shipment_timings.as_str(),
            self.order_flags.as_str(),
            self.pallet_finalizations.as_str(),
            self.aggregates.as_str(),
        ]
    }
}

/// Labels and LIKE patterns used by the staging filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FilterMarkers {
    /// LIKE pattern on the transport process type for shipment events.
    pub shipment_process_type: String,
    /// Transport status of a completed request.
    pub completed_status: String,
    /// Transport status of a created request.
    pub created_status: String,
    /// LIKE pattern on the transport subtype of completed batch requests.
    pub batch_subtype: String,
    /// Status-change label marking the start of pallet finalization.
    pub finalization_status: String,
    /// Location label of the outlet.
    pub outlet_location: String,
    /// LIKE pattern on monitor order ids that take part in the analysis.
    pub order_id_pattern: String,
    /// Monitor status of deleted orders.
    pub deleted_status: String,
}

impl Default for FilterMarkers {
    fn default() -> Self {
        Self {
            shipment_process_type: "Versand%".to_string(),
            completed_status: "Transportrequest erledigt".to_string(),
            created_status: "Transportrequest erstellt".to_string(),
            batch_subtype: "PALAP%".to_string(),
            finalization_status: "Finalisierung gestartet".to_string(),
            outlet_location: "OUTLET".to_string(),
            order_id_pattern: "4%".to_string(),
            deleted_status: "Deleted".to_string(),
        }
    }
}

/// Numeric thresholds of the aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Thresholds {
    /// Batches need strictly more colli than this to be aggregated.
    pub min_batch_colli: f64,
    /// Earliest window start of the first shift (inclusive).
    pub shift_start: NaiveTime,
    /// Latest window start of the first shift (inclusive).
    pub shift_end: NaiveTime,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_batch_colli: 16.0,
            shift_start: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            shift_end: NaiveTime::from_hms_opt(14, 45, 0).unwrap_or_default(),
        }
    }
}
