//! Semantic validation of a [`PipelineConfig`].

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::like::LikePattern;
use crate::pipeline::PipelineConfig;

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All failures found in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", joined.join("; "))
    }
}

/// Validate a configuration.
pub fn validate(config: &PipelineConfig) -> ValidationResult {
    let mut result = ValidationResult::default();

    if !crate::CONFIG_SCHEMA_VERSION
        .split('.')
        .next()
        .is_some_and(|major| config.schema_version.split('.').next() == Some(major))
    {
        result.push(
            "schema_version",
            format!(
                "unsupported version {} (expected {})",
                config.schema_version,
                crate::CONFIG_SCHEMA_VERSION
            ),
        );
    }

    let mut seen = HashSet::new();
    for name in config.all_tables() {
        if name.trim().is_empty() {
            result.push("tables", "table names must not be empty");
        } else if !seen.insert(name) {
            result.push("tables", format!("table name '{name}' is used twice"));
        }
    }

    let markers = &config.markers;
    for (field, pattern) in [
        ("markers.shipment_process_type", &markers.shipment_process_type),
        ("markers.batch_subtype", &markers.batch_subtype),
        ("markers.order_id_pattern", &markers.order_id_pattern),
    ] {
        if let Err(e) = LikePattern::new(pattern) {
            result.push(field, format!("invalid LIKE pattern: {e}"));
        }
    }
    for (field, label) in [
        ("markers.completed_status", &markers.completed_status),
        ("markers.created_status", &markers.created_status),
        ("markers.finalization_status", &markers.finalization_status),
        ("markers.outlet_location", &markers.outlet_location),
    ] {
        if label.trim().is_empty() {
            result.push(field, "label must not be empty");
        }
    }

    let thresholds = &config.thresholds;
    if !thresholds.min_batch_colli.is_finite() {
        result.push("thresholds.min_batch_colli", "must be a finite number");
    }
    if thresholds.shift_start > thresholds.shift_end {
        result.push(
            "thresholds.shift_start",
            "shift start must not be after shift end",
        );
    }

    let mut counter_names = HashSet::new();
    for (idx, counter) in config.counters.iter().enumerate() {
        let field = format!("counters[{idx}]");
        if counter.name.trim().is_empty() {
            result.push(&field, "counter name must not be empty");
        } else if !counter_names.insert(counter.name.as_str()) {
            result.push(&field, format!("duplicate counter name '{}'", counter.name));
        }
        if counter.status.is_none() {
            result.push(&field, "counter needs a status filter");
        }
    }

    if config.timestamp_formats.is_empty() {
        result.push("timestamp_formats", "at least one layout is required");
    }

    result
}
