//! Staging derivation: raw rows into the TS, PAL and AF tables.
//!
//! Every lookup is a first-match map keyed by a non-empty id. A miss leaves
//! the dependent field absent; it never becomes zero and never an error.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use tracing::debug;
use wte_common::time::format_date;
use wte_common::{ClockTime, Error, Result};
use wte_config::{LikePattern, PipelineConfig};

use crate::source::{OrderMonitorRow, OrderStatusChange, RowReader, TransportEvent};
use crate::store::{Cell, Table};

pub const SHIPMENT_TIMINGS_HEADER: [&str; 6] = [
    "completed_order_id",
    "completed_at",
    "completed_time",
    "created_order_id",
    "created_at",
    "created_time",
];

pub const PALLET_HEADER: [&str; 4] = ["changed_at", "batch_key", "pallet_quantity", "colli_count"];

pub const ORDER_FLAGS_HEADER: [&str; 10] = [
    "batch_key",
    "order_id",
    "date_code",
    "flag",
    "date",
    "week",
    "colli_count",
    "released_time",
    "ended_time",
    "sort_key",
];

// ── Types ───────────────────────────────────────────────────────────────

/// One entry of a TS list.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipmentEntry {
    pub order_id: String,
    pub timestamp: String,
    pub time: Option<ClockTime>,
}

/// The completed and created shipment lists, kept side by side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShipmentTimings {
    pub completed: Vec<ShipmentEntry>,
    pub created: Vec<ShipmentEntry>,
}

impl ShipmentTimings {
    pub fn to_table(&self) -> Table {
        let len = self.completed.len().max(self.created.len());
        let rows = (0..len)
            .map(|i| {
                let mut row = entry_cells(self.completed.get(i));
                row.extend(entry_cells(self.created.get(i)));
                row
            })
            .collect();
        Table::new(&SHIPMENT_TIMINGS_HEADER).with_rows(rows)
    }
}

fn entry_cells(entry: Option<&ShipmentEntry>) -> Vec<Cell> {
    match entry {
        Some(e) => vec![
            Cell::from(e.order_id.as_str()),
            Cell::from(e.timestamp.as_str()),
            Cell::from(e.time.map(|t| t.to_string())),
        ],
        None => vec![Cell::Empty; 3],
    }
}

/// One PAL row.
#[derive(Debug, Clone, PartialEq)]
pub struct PalletFinalization {
    pub changed_at: Cell,
    pub batch_key: String,
    pub pallet_quantity: Option<f64>,
    pub colli_count: Option<f64>,
}

impl PalletFinalization {
    pub fn to_cells(&self) -> Vec<Cell> {
        vec![
            self.changed_at.clone(),
            Cell::from(self.batch_key.as_str()),
            Cell::from(self.pallet_quantity),
            Cell::from(self.colli_count),
        ]
    }

    pub fn from_row(reader: &RowReader<'_>) -> Result<Self> {
        Ok(Self {
            changed_at: reader.cell(0).clone(),
            batch_key: reader.label(1),
            pallet_quantity: reader.number(2)?,
            colli_count: reader.number(3)?,
        })
    }
}

/// One AF row.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderFlag {
    pub batch_key: String,
    pub order_id: String,
    pub date_code: String,
    pub flag: Cell,
    pub date: Option<NaiveDate>,
    pub week: Option<u32>,
    pub colli_count: Option<f64>,
    pub released_time: Option<ClockTime>,
    pub ended_time: Option<ClockTime>,
    /// `released_time` as a fraction of a day.
    pub sort_key: Option<f64>,
}

impl OrderFlag {
    pub fn to_cells(&self) -> Vec<Cell> {
        vec![
            Cell::from(self.batch_key.as_str()),
            Cell::from(self.order_id.as_str()),
            Cell::from(self.date_code.as_str()),
            self.flag.clone(),
            Cell::from(self.date.map(format_date)),
            Cell::from(self.week.map(f64::from)),
            Cell::from(self.colli_count),
            Cell::from(self.released_time.map(|t| t.to_string())),
            Cell::from(self.ended_time.map(|t| t.to_string())),
            Cell::from(self.sort_key),
        ]
    }

    pub fn from_row(reader: &RowReader<'_>) -> Result<Self> {
        let week = match reader.number(5)? {
            Some(w) if w.fract() == 0.0 && (1.0..=53.0).contains(&w) => Some(w as u32),
            Some(w) => return Err(reader.malformed(5, format!("{w} is not a week number"))),
            None => None,
        };
        Ok(Self {
            batch_key: reader.label(0),
            order_id: reader.label(1),
            date_code: reader.label(2),
            flag: reader.cell(3).clone(),
            date: reader.display_date(4)?,
            week,
            colli_count: reader.number(6)?,
            released_time: reader.trailing_time(7)?,
            ended_time: reader.trailing_time(8)?,
            sort_key: reader.number(9)?,
        })
    }
}

/// Fraction of a day, the spreadsheet time value.
pub fn day_fraction(time: ClockTime) -> f64 {
    time.millis_from_midnight() as f64 / 86_400_000.0
}

/// Decode every non-blank row of a staging table.
pub fn decode_rows<T>(
    name: &str,
    table: &Table,
    decode: impl Fn(&RowReader<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    table
        .rows
        .iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|c| !c.is_empty()))
        .map(|(index, row)| decode(&RowReader::new(name, index, row)))
        .collect()
}

// ── Deriver ─────────────────────────────────────────────────────────────

/// Builds the staging tables from raw rows.
#[derive(Debug, Clone)]
pub struct StagingDeriver {
    shipment_process_type: LikePattern,
    batch_subtype: LikePattern,
    order_id_pattern: LikePattern,
    completed_status: String,
    created_status: String,
    finalization_status: String,
    outlet_location: String,
    deleted_status: String,
    order_monitor_table: String,
}

impl StagingDeriver {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let markers = &config.markers;
        let compile = |pattern: &str| {
            LikePattern::new(pattern)
                .map_err(|e| Error::Config(format!("invalid LIKE pattern '{pattern}': {e}")))
        };
        Ok(Self {
            shipment_process_type: compile(&markers.shipment_process_type)?,
            batch_subtype: compile(&markers.batch_subtype)?,
            order_id_pattern: compile(&markers.order_id_pattern)?,
            completed_status: markers.completed_status.clone(),
            created_status: markers.created_status.clone(),
            finalization_status: markers.finalization_status.clone(),
            outlet_location: markers.outlet_location.clone(),
            deleted_status: markers.deleted_status.clone(),
            order_monitor_table: config.tables.order_monitor.clone(),
        })
    }

    /// Completed and created shipment lists, each ordered by event timestamp
    /// with unparsed timestamps first.
    pub fn build_shipment_timings(&self, events: &[TransportEvent]) -> ShipmentTimings {
        let shipments = events
            .iter()
            .filter(|e| self.shipment_process_type.matches(&e.process_type));

        let mut completed: Vec<&TransportEvent> = shipments
            .clone()
            .filter(|e| e.status == self.completed_status && self.batch_subtype.matches(&e.subtype))
            .collect();
        let mut created: Vec<&TransportEvent> = shipments
            .filter(|e| e.status == self.created_status)
            .collect();
        completed.sort_by_key(|e| e.at);
        created.sort_by_key(|e| e.at);

        let project = |e: &&TransportEvent| ShipmentEntry {
            order_id: e.id.clone(),
            timestamp: e.timestamp.clone(),
            time: e.time(),
        };
        let timings = ShipmentTimings {
            completed: completed.iter().map(project).collect(),
            created: created.iter().map(project).collect(),
        };
        debug!(
            completed = timings.completed.len(),
            created = timings.created.len(),
            "shipment timings derived"
        );
        timings
    }

    /// Outlet finalization starts, each with the colli quantity of the first
    /// matching change-log entry.
    pub fn build_pallet_finalizations(
        &self,
        changes: &[OrderStatusChange],
    ) -> Vec<PalletFinalization> {
        let mut colli_by_key: HashMap<&str, Option<f64>> = HashMap::new();
        for change in changes {
            if !change.batch_key.is_empty() && change.status_label == self.finalization_status {
                colli_by_key
                    .entry(change.batch_key.as_str())
                    .or_insert(change.colli_quantity);
            }
        }

        let pallets: Vec<PalletFinalization> = changes
            .iter()
            .filter(|c| {
                c.status_label == self.finalization_status
                    && c.location_label == self.outlet_location
            })
            .map(|c| PalletFinalization {
                changed_at: c.changed_at.clone(),
                batch_key: c.batch_key.clone(),
                pallet_quantity: c.pallet_quantity,
                colli_count: colli_by_key.get(c.batch_key.as_str()).copied().flatten(),
            })
            .collect();
        debug!(pallets = pallets.len(), "pallet finalizations derived");
        pallets
    }

    /// Outlet monitor rows joined with PAL and TS, newest first.
    pub fn build_order_flags(
        &self,
        monitor: &[OrderMonitorRow],
        pallets: &[PalletFinalization],
        timings: &ShipmentTimings,
    ) -> Result<Vec<OrderFlag>> {
        let colli_by_key = first_by_key(pallets.iter().map(|p| (p.batch_key.as_str(), p.colli_count)));
        let released_by_order =
            first_by_key(timings.created.iter().map(|e| (e.order_id.as_str(), e.time)));
        let ended_by_order =
            first_by_key(timings.completed.iter().map(|e| (e.order_id.as_str(), e.time)));

        let mut selected: Vec<&OrderMonitorRow> = monitor
            .iter()
            .filter(|m| {
                m.location_label == self.outlet_location
                    && self.order_id_pattern.matches(&m.order_id)
                    && m.status != self.deleted_status
            })
            .collect();
        // Stable: ties keep import order, rows without a timestamp go last.
        selected.sort_by(|a, b| match (a.recorded_at, b.recorded_at) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        let mut flags = Vec::with_capacity(selected.len());
        let mut skipped_empty = 0usize;
        for row in selected {
            if row.batch_key.is_empty() {
                skipped_empty += 1;
                continue;
            }
            let date = if row.date_code.is_empty() {
                None
            } else {
                Some(wte_common::time::parse_date_code(&row.date_code).ok_or_else(|| {
                    Error::malformed(
                        &self.order_monitor_table,
                        row.row_number,
                        format!("column F: '{}' is not a dd.mm.yyyy date", row.date_code),
                    )
                })?)
            };
            let released_time = released_by_order.get(row.order_id.as_str()).copied().flatten();
            flags.push(OrderFlag {
                batch_key: row.batch_key.clone(),
                order_id: row.order_id.clone(),
                date_code: row.date_code.clone(),
                flag: row.flag.clone(),
                date,
                week: date.map(|d| d.iso_week().week()),
                colli_count: colli_by_key.get(row.batch_key.as_str()).copied().flatten(),
                released_time,
                ended_time: ended_by_order.get(row.order_id.as_str()).copied().flatten(),
                sort_key: released_time.map(day_fraction),
            });
        }
        debug!(order_flags = flags.len(), skipped_empty, "order flags derived");
        Ok(flags)
    }
}

/// First value per non-empty key, in input order.
fn first_by_key<'a, V>(pairs: impl Iterator<Item = (&'a str, V)>) -> HashMap<&'a str, V> {
    let mut map = HashMap::new();
    for (key, value) in pairs {
        if !key.is_empty() {
            map.entry(key).or_insert(value);
        }
    }
    map
}
