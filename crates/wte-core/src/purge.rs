//! End-of-cycle purge of staging and raw tables.
//!
//! The overview table is never touched here.

use serde::Serialize;
use tracing::info;
use wte_common::Result;
use wte_config::PipelineConfig;

use crate::source::transport_col;
use crate::store::TabularStore;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Tables cleared completely, in clearing order.
    pub cleared_tables: Vec<String>,
    /// Table whose import columns were cleared.
    pub cleared_columns: Option<String>,
    /// Table activated for operators.
    pub active: String,
}

#[derive(Debug, Clone)]
pub struct Purger<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Purger<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn purge<S: TabularStore>(&self, store: &mut S) -> Result<PurgeReport> {
        let tables = &self.config.tables;
        let mut report = PurgeReport::default();

        let full_clear = tables
            .staging()
            .into_iter()
            .chain([tables.status_changes.as_str(), tables.order_monitor.as_str()]);
        for name in full_clear {
            store.clear_table(name)?;
            report.cleared_tables.push(name.to_string());
        }

        store.clear_columns(&tables.transport_events, transport_col::IMPORT_BLOCK)?;
        report.cleared_columns = Some(tables.transport_events.clone());

        store.set_active(&tables.overview_yearly)?;
        report.active = tables.overview_yearly.clone();

        info!(
            cleared = report.cleared_tables.len(),
            active = %report.active,
            "staging and raw tables purged"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Cell, MemoryStore, Table};

    fn filled() -> Table {
        Table::new(&["a"]).with_rows(vec![vec![Cell::from("x")]])
    }

    #[test]
    fn purge_clears_everything_but_overview() {
        let config = PipelineConfig::default();
        let mut store = MemoryStore::new();
        for name in config.all_tables() {
            store.insert(name, filled());
        }
        let mut transport = Table::new(&["A", "B", "C", "D", "E", "F", "G", "H"]);
        transport.rows = vec![(0..8).map(|i| Cell::from(format!("v{i}"))).collect()];
        store.insert(config.tables.transport_events.as_str(), transport);

        let report = Purger::new(&config).purge(&mut store).unwrap();
        assert_eq!(report.cleared_tables.len(), 6);
        assert_eq!(store.active().as_deref(), Some("Übersicht Jahr"));

        for name in config.tables.staging() {
            assert!(store.read_table(name).unwrap().is_blank());
        }
        assert!(store.read_table(&config.tables.order_monitor).unwrap().is_blank());
        assert_eq!(store.read_table(&config.tables.overview).unwrap(), filled());
        assert_eq!(store.read_table(&config.tables.overview_yearly).unwrap(), filled());

        let transport = store.read_table(&config.tables.transport_events).unwrap();
        assert_eq!(transport.rows.len(), 1);
        assert!(transport.cell(0, 6).is_empty());
        assert_eq!(transport.cell(0, 7), &Cell::from("v7"));
    }

    #[test]
    fn missing_yearly_table_fails() {
        let config = PipelineConfig::default();
        let mut store = MemoryStore::new();
        for name in config.all_tables() {
            if name != config.tables.overview_yearly {
                store.insert(name, Table::default());
            }
        }
        assert!(Purger::new(&config).purge(&mut store).is_err());
    }
}
