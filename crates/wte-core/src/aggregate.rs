//! Per-batch aggregate metrics.
//!
//! One [`AggregateRow`] per distinct batch key whose colli count exceeds the
//! configured minimum. Windows are built max/max: the latest release and
//! the latest completion among the key's order rows. Anything computed from
//! an absent input stays absent, counters included.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, trace};
use wte_common::time::format_date;
use wte_common::{ClockTime, Result, Span};
use wte_config::{CounterSpec, PipelineConfig, Thresholds, COUNTER_COUNT};

use crate::source::{RowReader, TransportEvent};
use crate::staging::{OrderFlag, PalletFinalization};
use crate::store::{Cell, Table};

/// Position of `batch_key` in the aggregate and overview layouts.
pub const KEY_COLUMN: usize = 2;

/// Fixed metric columns preceding the counters.
pub const METRIC_COLUMNS: [&str; 13] = [
    "week",
    "date",
    "batch_key",
    "flag",
    "window_start",
    "window_end",
    "duration",
    "colli_total",
    "per_colli_duration",
    "throughput_rate",
    "pallet_quantity",
    "per_pallet_duration",
    "shift_flag",
];

/// Full header: metric columns followed by the counter names.
pub fn layout_header(config: &PipelineConfig) -> Vec<String> {
    METRIC_COLUMNS
        .iter()
        .map(|c| c.to_string())
        .chain(config.counters.iter().map(|c| c.name.clone()))
        .collect()
}

/// One row of the aggregate table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    pub week: Option<u32>,
    pub date: Option<NaiveDate>,
    pub batch_key: String,
    pub flag: Cell,
    pub window_start: Option<ClockTime>,
    pub window_end: Option<ClockTime>,
    pub duration: Option<Span>,
    pub colli_total: Option<f64>,
    pub per_colli_duration: Option<Span>,
    /// Colli per minute.
    pub throughput_rate: Option<f64>,
    pub pallet_quantity: Option<f64>,
    pub per_pallet_duration: Option<Span>,
    /// 1 inside the first shift, 2 otherwise.
    pub shift_flag: Option<u8>,
    pub counters: [Option<u64>; COUNTER_COUNT],
}

impl AggregateRow {
    pub fn to_cells(&self) -> Vec<Cell> {
        let span = |s: Option<Span>| Cell::from(s.map(|s| s.to_string()));
        let time = |t: Option<ClockTime>| Cell::from(t.map(|t| t.to_string()));
        let mut cells = vec![
            Cell::from(self.week.map(f64::from)),
            Cell::from(self.date.map(format_date)),
            Cell::from(self.batch_key.as_str()),
            self.flag.clone(),
            time(self.window_start),
            time(self.window_end),
            span(self.duration),
            Cell::from(self.colli_total),
            span(self.per_colli_duration),
            Cell::from(self.throughput_rate),
            Cell::from(self.pallet_quantity),
            span(self.per_pallet_duration),
            Cell::from(self.shift_flag.map(f64::from)),
        ];
        cells.extend(self.counters.iter().map(|c| Cell::from(c.map(|n| n as f64))));
        cells
    }

    pub fn from_row(reader: &RowReader<'_>) -> Result<Self> {
        let whole = |col: usize| -> Result<Option<u64>> {
            match reader.number(col)? {
                Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(Some(n as u64)),
                Some(n) => Err(reader.malformed(col, format!("{n} is not a whole count"))),
                None => Ok(None),
            }
        };

        let mut counters = [None; COUNTER_COUNT];
        for (i, slot) in counters.iter_mut().enumerate() {
            *slot = whole(METRIC_COLUMNS.len() + i)?;
        }
        let shift_flag = match whole(12)? {
            Some(f @ (1 | 2)) => Some(f as u8),
            Some(other) => return Err(reader.malformed(12, format!("shift flag {other}"))),
            None => None,
        };

        Ok(Self {
            week: whole(0)?.map(|w| w as u32),
            date: reader.display_date(1)?,
            batch_key: reader.label(KEY_COLUMN),
            flag: reader.cell(3).clone(),
            window_start: reader.trailing_time(4)?,
            window_end: reader.trailing_time(5)?,
            duration: reader.span(6)?,
            colli_total: reader.number(7)?,
            per_colli_duration: reader.span(8)?,
            throughput_rate: reader.number(9)?,
            pallet_quantity: reader.number(10)?,
            per_pallet_duration: reader.span(11)?,
            shift_flag,
            counters,
        })
    }
}

/// Summary of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregateSummary {
    /// Order rows above the colli minimum.
    pub candidates: usize,
    /// Distinct keys emitted.
    pub rows: usize,
    /// Emitted rows without a complete window.
    pub incomplete_windows: usize,
}

/// Computes aggregate rows from staged data and raw transport events.
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    thresholds: Thresholds,
    counters: [CounterSpec; COUNTER_COUNT],
}

impl AggregationEngine {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            thresholds: config.thresholds.clone(),
            counters: config.counters.clone(),
        }
    }

    pub fn compute(
        &self,
        flags: &[OrderFlag],
        pallets: &[PalletFinalization],
        events: &[TransportEvent],
    ) -> (Vec<AggregateRow>, AggregateSummary) {
        let mut candidates: Vec<&OrderFlag> = flags
            .iter()
            .filter(|f| {
                f.colli_count
                    .is_some_and(|c| c > self.thresholds.min_batch_colli)
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| cmp_absent_first(a.sort_key, b.sort_key))
        });

        let mut by_key: HashMap<&str, Vec<&OrderFlag>> = HashMap::new();
        for flag in flags.iter().filter(|f| !f.batch_key.is_empty()) {
            by_key.entry(flag.batch_key.as_str()).or_default().push(flag);
        }
        let mut pallet_by_key: HashMap<&str, Option<f64>> = HashMap::new();
        for pallet in pallets.iter().filter(|p| !p.batch_key.is_empty()) {
            pallet_by_key
                .entry(pallet.batch_key.as_str())
                .or_insert(pallet.pallet_quantity);
        }
        let mut events_by_date: HashMap<NaiveDate, Vec<&TransportEvent>> = HashMap::new();
        for event in events {
            if let Some(date) = event.date() {
                events_by_date.entry(date).or_default().push(event);
            }
        }

        let mut summary = AggregateSummary {
            candidates: candidates.len(),
            ..AggregateSummary::default()
        };
        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for head in candidates {
            if head.batch_key.is_empty() || !seen.insert(head.batch_key.as_str()) {
                continue;
            }
            let Some(group) = by_key.get(head.batch_key.as_str()) else {
                continue;
            };
            let day_events = head
                .date
                .and_then(|d| events_by_date.get(&d))
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let pallet_quantity = pallet_by_key.get(head.batch_key.as_str()).copied().flatten();
            let row = self.build_row(head, group, pallet_quantity, day_events);
            if row.duration.is_none() {
                summary.incomplete_windows += 1;
            }
            rows.push(row);
        }
        summary.rows = rows.len();

        debug!(
            candidates = summary.candidates,
            rows = summary.rows,
            incomplete_windows = summary.incomplete_windows,
            "aggregates computed"
        );
        (rows, summary)
    }

    fn build_row(
        &self,
        head: &OrderFlag,
        group: &[&OrderFlag],
        pallet_quantity: Option<f64>,
        day_events: &[&TransportEvent],
    ) -> AggregateRow {
        let window_start = group.iter().filter_map(|f| f.released_time).max();
        let window_end = group.iter().filter_map(|f| f.ended_time).max();
        let duration = window_start
            .zip(window_end)
            .map(|(start, end)| Span::between(start, end));
        let colli_total = group.first().and_then(|f| f.colli_count);

        let per_colli_duration = duration.zip(colli_total).and_then(|(d, c)| d.divide(c));
        let throughput_rate = duration
            .zip(colli_total)
            .filter(|(d, _)| !d.is_zero())
            .map(|(d, c)| c / d.total_minutes());
        let per_pallet_duration = duration
            .zip(pallet_quantity)
            .and_then(|(d, p)| d.divide(p));
        let shift_flag = window_start.map(|start| self.shift_flag(start));

        let mut counters = [None; COUNTER_COUNT];
        if let (Some(start), Some(end), Some(_)) = (window_start, window_end, head.date) {
            for (slot, spec) in counters.iter_mut().zip(&self.counters) {
                *slot = Some(count_distinct(spec, day_events, start, end));
            }
        }
        trace!(
            batch_key = %head.batch_key,
            window_start = ?window_start,
            window_end = ?window_end,
            "aggregate row built"
        );

        AggregateRow {
            week: head.week,
            date: head.date,
            batch_key: head.batch_key.clone(),
            flag: head.flag.clone(),
            window_start,
            window_end,
            duration,
            colli_total,
            per_colli_duration,
            throughput_rate,
            pallet_quantity,
            per_pallet_duration,
            shift_flag,
            counters,
        }
    }

    /// 1 when `start` lies within the first shift (bounds inclusive), else 2.
    pub fn shift_flag(&self, start: ClockTime) -> u8 {
        let shift = (
            ClockTime(self.thresholds.shift_start),
            ClockTime(self.thresholds.shift_end),
        );
        if start.within(shift.0, shift.1) {
            1
        } else {
            2
        }
    }
}

/// Distinct non-empty event ids admitted by `spec` within the window.
///
/// `events` must already be restricted to the row's date.
pub fn count_distinct(
    spec: &CounterSpec,
    events: &[&TransportEvent],
    start: ClockTime,
    end: ClockTime,
) -> u64 {
    let matches = |want: &Option<String>, have: &str| want.as_deref().map_or(true, |w| w == have);
    let ids: HashSet<&str> = events
        .iter()
        .filter(|e| !e.id.is_empty())
        .filter(|e| {
            matches(&spec.process_type, &e.process_type)
                && matches(&spec.status, &e.status)
                && matches(&spec.location, &e.location)
                && matches(&spec.subtype, &e.subtype)
        })
        .filter(|e| {
            e.time()
                .is_some_and(|t| spec.window_admits(t.0, start.0, end.0))
        })
        .map(|e| e.id.as_str())
        .collect();
    ids.len() as u64
}

fn cmp_absent_first(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Encode rows into the aggregate table layout.
pub fn to_table(config: &PipelineConfig, rows: &[AggregateRow]) -> Table {
    Table::new(&layout_header(config)).with_rows(rows.iter().map(AggregateRow::to_cells).collect())
}
