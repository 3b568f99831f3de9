//! Warehouse transport efficiency pipeline.
//!
//! Turns raw transport-order, status-change and order-monitor imports into
//! per-batch efficiency metrics and appends them to an append-only overview:
//!
//! 1. [`staging`] derives the shipment, pallet and order-flag tables
//! 2. [`aggregate`] computes windows, throughput, shift and distinct counts
//! 3. [`archive`] appends rows whose batch key is not archived yet
//! 4. [`purge`] clears staging and raw inputs for the next import
//!
//! [`pipeline::Pipeline`] runs the stages against any [`store::TabularStore`].

pub mod aggregate;
pub mod archive;
pub mod cli;
pub mod exit_codes;
pub mod logging;
pub mod overview;
pub mod pipeline;
pub mod purge;
pub mod source;
pub mod staging;
pub mod store;

pub use exit_codes::ExitCode;
pub use pipeline::{Pipeline, PipelineError, Stage};
