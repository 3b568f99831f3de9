//! Reading the archived overview for display and export.

use wte_common::Result;
use wte_config::PipelineConfig;
use wte_export::OverviewRecord;

use crate::aggregate::AggregateRow;
use crate::staging::decode_rows;
use crate::store::TabularStore;

impl AggregateRow {
    /// Export form of this row.
    pub fn to_record(&self) -> OverviewRecord {
        OverviewRecord {
            week: self.week,
            date: self.date,
            batch_key: self.batch_key.clone(),
            flag: self.flag.text(),
            window_start: self.window_start.map(|t| t.0),
            window_end: self.window_end.map(|t| t.0),
            duration_ms: self.duration.map(|d| d.millis()),
            colli_total: self.colli_total,
            per_colli_duration_ms: self.per_colli_duration.map(|d| d.millis()),
            throughput_rate: self.throughput_rate,
            pallet_quantity: self.pallet_quantity,
            per_pallet_duration_ms: self.per_pallet_duration.map(|d| d.millis()),
            shift_flag: self.shift_flag,
            counters: self.counters.to_vec(),
        }
    }
}

/// Every archived row in append order.
pub fn read_overview<S: TabularStore>(store: &S, config: &PipelineConfig) -> Result<Vec<AggregateRow>> {
    let name = &config.tables.overview;
    decode_rows(name, &store.read_table(name)?, AggregateRow::from_row)
}

/// Counter column names in layout order, owned for the export API.
pub fn counter_columns(config: &PipelineConfig) -> Vec<String> {
    config.counter_names().into_iter().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::to_table;
    use crate::store::{Cell, MemoryStore};
    use chrono::NaiveDate;
    use wte_common::{ClockTime, Span};

    fn row(key: &str) -> AggregateRow {
        AggregateRow {
            week: Some(3),
            date: NaiveDate::from_ymd_opt(2026, 1, 15),
            batch_key: key.into(),
            flag: Cell::from("X"),
            window_start: ClockTime::from_hms(8, 30, 0),
            window_end: ClockTime::from_hms(9, 15, 0),
            duration: Some(Span::from_millis(2_700_000)),
            colli_total: Some(20.0),
            per_colli_duration: Some(Span::from_millis(135_000)),
            throughput_rate: Some(0.5),
            pallet_quantity: None,
            per_pallet_duration: None,
            shift_flag: Some(1),
            counters: [Some(3), Some(0), None, None, None, None, None, None, None],
        }
    }

    #[test]
    fn overview_rows_decode_and_convert() {
        let config = PipelineConfig::default();
        let mut store = MemoryStore::new();
        store.insert(
            config.tables.overview.as_str(),
            to_table(&config, &[row("B1"), row("B2")]),
        );

        let rows = read_overview(&store, &config).unwrap();
        assert_eq!(rows.len(), 2);
        let record = rows[0].to_record();
        assert_eq!(record.flag.as_deref(), Some("X"));
        assert_eq!(record.duration_ms, Some(2_700_000));
        assert_eq!(record.counters.len(), counter_columns(&config).len());
        assert_eq!(record.counters[0], Some(3));
    }
}
