//! Warehouse transport efficiency common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the pipeline crates:
//! - Run identity for log and report correlation
//! - Schema versioning for persisted tables and JSON reports
//! - Common error types
//! - Time-of-day and signed span arithmetic used by the metrics
//! - Output format selection

pub mod error;
pub mod id;
pub mod output;
pub mod time;

pub use error::{Error, Result};
pub use id::RunId;
pub use output::OutputFormat;
pub use time::{ClockTime, Span};

/// Schema version stamped on store manifests, JSON reports and exports.
///
/// A major bump means older stores can no longer be opened.
pub const SCHEMA_VERSION: &str = "1.0.0";
