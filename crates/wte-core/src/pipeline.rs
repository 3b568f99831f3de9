//! Stage orchestration.
//!
//! Stages run strictly in order: prepare, analyze, archive, cleanup. Each
//! one reads its inputs from the store, writes its outputs, then flushes.
//! A failed stage stops the run; whatever earlier stages flushed stays.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span};
use wte_common::{Error, Result, RunId, SCHEMA_VERSION};
use wte_config::PipelineConfig;

use crate::aggregate::{self, layout_header, AggregateSummary, AggregationEngine};
use crate::archive::{ArchivalDeduplicator, ArchiveOutcome};
use crate::purge::{PurgeReport, Purger};
use crate::source::{read_order_monitor, read_status_changes, read_transport_events, TimestampParser};
use crate::staging::{
    decode_rows, OrderFlag, PalletFinalization, StagingDeriver, ORDER_FLAGS_HEADER, PALLET_HEADER,
};
use crate::store::{Cell, Table, TabularStore};

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Prepare,
    Analyze,
    Archive,
    Cleanup,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Prepare, Stage::Analyze, Stage::Archive, Stage::Cleanup];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Prepare => "prepare",
            Stage::Analyze => "analyze",
            Stage::Archive => "archive",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage failure, tagged with the stage that raised it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Error,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Stage { stage, .. } => *stage,
        }
    }

    pub fn inner(&self) -> &Error {
        match self {
            PipelineError::Stage { source, .. } => source,
        }
    }
}

// ── Reports ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrepareReport {
    pub shipments_completed: usize,
    pub shipments_created: usize,
    pub pallet_finalizations: usize,
    pub order_flags: usize,
}

/// Reports of a full run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub schema_version: String,
    pub run_id: RunId,
    pub generated_at: DateTime<Utc>,
    pub prepare: PrepareReport,
    pub analyze: AggregateSummary,
    pub archive: ArchiveOutcome,
    pub cleanup: PurgeReport,
}

// ── Pipeline ────────────────────────────────────────────────────────────

/// Create every configured table that does not exist yet. Returns the names
/// created.
pub fn ensure_tables<S: TabularStore>(store: &mut S, config: &PipelineConfig) -> Result<Vec<String>> {
    let mut created = Vec::new();
    for name in config.all_tables() {
        if store.create_table(name)? {
            created.push(name.to_string());
        }
    }
    store.flush()?;
    info!(created = created.len(), "tables initialized");
    Ok(created)
}

/// Runs stages against one store with one configuration.
pub struct Pipeline<'a, S: TabularStore> {
    store: &'a mut S,
    config: &'a PipelineConfig,
    run_id: RunId,
}

impl<'a, S: TabularStore> Pipeline<'a, S> {
    pub fn new(store: &'a mut S, config: &'a PipelineConfig, run_id: RunId) -> Self {
        Self {
            store,
            config,
            run_id,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Run `body` as `stage`, flushing on success.
    fn stage<T>(
        &mut self,
        stage: Stage,
        body: impl FnOnce(&mut S, &PipelineConfig) -> Result<T>,
    ) -> std::result::Result<T, PipelineError> {
        let span = info_span!("stage", stage = %stage, run_id = %self.run_id);
        let _guard = span.enter();

        let result = body(&mut *self.store, self.config).and_then(|value| {
            self.store.flush()?;
            Ok(value)
        });
        result.map_err(|source| {
            tracing::error!(error = %source, "stage failed");
            PipelineError::Stage { stage, source }
        })
    }

    /// Derive TS, PAL and AF from the raw tables.
    pub fn prepare(&mut self) -> std::result::Result<PrepareReport, PipelineError> {
        self.stage(Stage::Prepare, |store, config| {
            let tables = &config.tables;
            let parser = TimestampParser::new(&config.timestamp_formats);
            let deriver = StagingDeriver::new(config)?;

            let events = read_transport_events(
                &tables.transport_events,
                &store.read_table(&tables.transport_events)?,
                &parser,
            )?;
            let changes =
                read_status_changes(&tables.status_changes, &store.read_table(&tables.status_changes)?)?;
            let monitor = read_order_monitor(
                &tables.order_monitor,
                &store.read_table(&tables.order_monitor)?,
                &parser,
            )?;

            let timings = deriver.build_shipment_timings(&events);
            let pallets = deriver.build_pallet_finalizations(&changes);
            let flags = deriver.build_order_flags(&monitor, &pallets, &timings)?;

            replace_table(store, &tables.shipment_timings, timings.to_table())?;
            replace_table(
                store,
                &tables.pallet_finalizations,
                Table::new(&PALLET_HEADER).with_rows(pallets.iter().map(PalletFinalization::to_cells).collect()),
            )?;
            replace_table(
                store,
                &tables.order_flags,
                Table::new(&ORDER_FLAGS_HEADER).with_rows(flags.iter().map(OrderFlag::to_cells).collect()),
            )?;

            let report = PrepareReport {
                shipments_completed: timings.completed.len(),
                shipments_created: timings.created.len(),
                pallet_finalizations: pallets.len(),
                order_flags: flags.len(),
            };
            info!(
                completed = report.shipments_completed,
                created = report.shipments_created,
                pallets = report.pallet_finalizations,
                order_flags = report.order_flags,
                "staging prepared"
            );
            Ok(report)
        })
    }

    /// Compute the aggregate table from staging and transport events.
    pub fn analyze(&mut self) -> std::result::Result<AggregateSummary, PipelineError> {
        self.stage(Stage::Analyze, |store, config| {
            let tables = &config.tables;
            let parser = TimestampParser::new(&config.timestamp_formats);

            let flags = decode_rows(
                &tables.order_flags,
                &store.read_table(&tables.order_flags)?,
                OrderFlag::from_row,
            )?;
            let pallets = decode_rows(
                &tables.pallet_finalizations,
                &store.read_table(&tables.pallet_finalizations)?,
                PalletFinalization::from_row,
            )?;
            let events = read_transport_events(
                &tables.transport_events,
                &store.read_table(&tables.transport_events)?,
                &parser,
            )?;

            let (rows, summary) = AggregationEngine::new(config).compute(&flags, &pallets, &events);
            replace_table(store, &tables.aggregates, aggregate::to_table(config, &rows))?;
            info!(
                candidates = summary.candidates,
                rows = summary.rows,
                incomplete_windows = summary.incomplete_windows,
                "aggregates written"
            );
            Ok(summary)
        })
    }

    /// Append new aggregate rows to the overview.
    pub fn archive(&mut self) -> std::result::Result<ArchiveOutcome, PipelineError> {
        self.stage(Stage::Archive, |store, config| {
            let tables = &config.tables;
            let aggregates = store.read_table(&tables.aggregates)?;
            let rows: Vec<Vec<Cell>> = aggregates
                .rows
                .into_iter()
                .filter(|row| row.iter().any(|c| !c.is_empty()))
                .collect();
            ArchivalDeduplicator::new(tables.overview.as_str()).archive(
                store,
                &layout_header(config),
                rows,
            )
        })
    }

    /// Clear staging and raw tables, then activate the yearly overview.
    pub fn cleanup(&mut self) -> std::result::Result<PurgeReport, PipelineError> {
        self.stage(Stage::Cleanup, |store, config| Purger::new(config).purge(store))
    }

    /// All four stages in order.
    pub fn run_all(&mut self) -> std::result::Result<RunReport, PipelineError> {
        info!(run_id = %self.run_id, "pipeline run started");
        let prepare = self.prepare()?;
        let analyze = self.analyze()?;
        let archive = self.archive()?;
        let cleanup = self.cleanup()?;
        info!(run_id = %self.run_id, appended = archive.appended, "pipeline run finished");

        Ok(RunReport {
            schema_version: SCHEMA_VERSION.to_string(),
            run_id: self.run_id.clone(),
            generated_at: Utc::now(),
            prepare,
            analyze,
            archive,
            cleanup,
        })
    }
}

/// Replace a staging table, creating it on first use.
fn replace_table<S: TabularStore>(store: &mut S, name: &str, table: Table) -> Result<()> {
    store.create_table(name)?;
    store.write_table(name, table)
}
