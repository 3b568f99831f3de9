//! Pipeline configuration loading and validation.
//!
//! This crate provides:
//! - The table-name registry and filter labels as a typed [`PipelineConfig`]
//! - The nine distinct-count counter definitions
//! - SQL-style LIKE patterns used by the staging filters
//! - Config resolution (CLI → env → XDG → defaults)
//! - Semantic validation

pub mod counter;
pub mod like;
pub mod pipeline;
pub mod resolve;
pub mod validate;

pub use counter::{default_counters, CounterSpec, COUNTER_COUNT};
pub use like::LikePattern;
pub use pipeline::{ConfigError, FilterMarkers, PipelineConfig, TableNames, Thresholds};
pub use resolve::{resolve_config, ConfigPaths, ConfigSource, ResolvedConfig, CONFIG_ENV_VAR};
pub use validate::{validate, ValidationError, ValidationResult};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
