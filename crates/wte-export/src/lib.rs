//! Warehouse transport efficiency overview export.
//!
//! This crate provides:
//! - The Arrow schema of the archived overview table
//! - A Parquet writer with configurable compression
//! - A pretty-printed table rendering for terminals

pub mod schema;
pub mod writer;

pub use schema::{overview_schema, overview_to_batch, OverviewRecord};
pub use writer::{render_overview, write_overview_parquet, Compression, WriteError, WriterConfig};

/// Metadata key carrying the pipeline schema version in written files.
pub const SCHEMA_VERSION_KEY: &str = "wte.schema_version";
