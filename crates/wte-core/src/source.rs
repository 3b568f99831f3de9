//! Typed views over the raw import tables.
//!
//! The raw grids have fixed column layouts (column A = index 0). Readers
//! here turn cells into typed rows once, so staging and aggregation never
//! index raw cells. A non-empty cell that cannot be parsed is a
//! [`Error::MalformedInput`] naming the table and the 1-based sheet row
//! (the header is row 1).

use chrono::{NaiveDate, NaiveDateTime};
use wte_common::time::{parse_date_code, parse_display_date};
use wte_common::{ClockTime, Error, Result, Span};

use crate::store::{Cell, Table};

/// Column indices of the transport statistics table.
pub mod transport_col {
    pub const ID: usize = 0;
    pub const PROCESS_TYPE: usize = 1;
    pub const STATUS: usize = 2;
    pub const LOCATION: usize = 4;
    pub const SUBTYPE: usize = 5;
    pub const TIMESTAMP: usize = 6;
    /// Columns A-G, the block the purge clears.
    pub const IMPORT_BLOCK: std::ops::Range<usize> = 0..7;
}

/// Column indices of the order-status change log.
pub mod change_col {
    pub const BATCH_KEY: usize = 0;
    pub const STATUS_LABEL: usize = 1;
    pub const LOCATION_LABEL: usize = 2;
    pub const PALLET_QUANTITY: usize = 3;
    pub const COLLI_QUANTITY: usize = 4;
    pub const CHANGED_AT: usize = 5;
}

/// Column indices of the order monitor snapshot.
pub mod monitor_col {
    pub const BATCH_KEY: usize = 0;
    pub const STATUS: usize = 1;
    pub const ORDER_ID: usize = 2;
    pub const DATE_CODE: usize = 5;
    pub const RECORDED_AT: usize = 6;
    pub const LOCATION_LABEL: usize = 18;
    pub const FLAG: usize = 23;
}

/// Cell accessor for one row with error context.
pub struct RowReader<'a> {
    table: &'a str,
    index: usize,
    row: &'a [Cell],
}

impl<'a> RowReader<'a> {
    pub fn new(table: &'a str, index: usize, row: &'a [Cell]) -> Self {
        Self { table, index, row }
    }

    /// 1-based sheet row, counting the header as row 1.
    pub fn row_number(&self) -> usize {
        self.index + 2
    }

    pub fn cell(&self, col: usize) -> &'a Cell {
        static EMPTY: Cell = Cell::Empty;
        self.row.get(col).unwrap_or(&EMPTY)
    }

    pub fn text(&self, col: usize) -> Option<String> {
        self.cell(col).text()
    }

    /// Text content, empty string when blank.
    pub fn label(&self, col: usize) -> String {
        self.text(col).unwrap_or_default()
    }

    pub fn number(&self, col: usize) -> Result<Option<f64>> {
        self.cell(col)
            .number()
            .map_err(|message| self.malformed(col, message))
    }

    /// Clock time from the trailing `HH:MM:SS` of the cell text.
    pub fn trailing_time(&self, col: usize) -> Result<Option<ClockTime>> {
        let raw = self.label(col);
        ClockTime::from_trailing(&raw)
            .map_err(|e| self.malformed(col, format!("'{raw}' has no HH:MM:SS time: {e}")))
    }

    pub fn date_code(&self, col: usize) -> Result<Option<NaiveDate>> {
        match self.text(col) {
            None => Ok(None),
            Some(raw) => parse_date_code(&raw)
                .map(Some)
                .ok_or_else(|| self.malformed(col, format!("'{raw}' is not a dd.mm.yyyy date"))),
        }
    }

    /// Date in the `dd/mm/yyyy` layout written to staging tables.
    pub fn display_date(&self, col: usize) -> Result<Option<NaiveDate>> {
        match self.text(col) {
            None => Ok(None),
            Some(raw) => parse_display_date(&raw)
                .map(Some)
                .ok_or_else(|| self.malformed(col, format!("'{raw}' is not a dd/mm/yyyy date"))),
        }
    }

    /// Signed `[-]HH:MM:SS[.mmm]` span.
    pub fn span(&self, col: usize) -> Result<Option<Span>> {
        match self.text(col) {
            None => Ok(None),
            Some(raw) => Span::parse(&raw)
                .map(Some)
                .ok_or_else(|| self.malformed(col, format!("'{raw}' is not a duration"))),
        }
    }

    pub fn malformed(&self, col: usize, message: impl Into<String>) -> Error {
        Error::malformed(
            self.table,
            self.row_number(),
            format!("column {}: {}", column_letter(col), message.into()),
        )
    }
}

/// Spreadsheet column letter for a zero-based index.
pub fn column_letter(mut col: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (col % 26) as u8) as char);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    letters.iter().rev().collect()
}

/// Parses raw date-time text with the configured `chrono` layouts.
#[derive(Debug, Clone)]
pub struct TimestampParser {
    formats: Vec<String>,
}

impl TimestampParser {
    pub fn new(formats: &[String]) -> Self {
        Self {
            formats: formats.to_vec(),
        }
    }

    pub fn parse(&self, raw: &str) -> Option<NaiveDateTime> {
        let trimmed = raw.trim();
        self.formats
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(trimmed, f).ok())
    }
}

// ── Transport statistics ────────────────────────────────────────────────

/// One transport event row.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub id: String,
    pub process_type: String,
    pub status: String,
    pub location: String,
    pub subtype: String,
    /// Raw timestamp text as imported.
    pub timestamp: String,
    /// Parsed timestamp; `None` only when the raw field is empty.
    pub at: Option<NaiveDateTime>,
}

impl TransportEvent {
    pub fn time(&self) -> Option<ClockTime> {
        self.at.map(|at| ClockTime(at.time()))
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.at.map(|at| at.date())
    }
}

/// Read every non-blank row of the transport statistics table.
pub fn read_transport_events(
    name: &str,
    table: &Table,
    parser: &TimestampParser,
) -> Result<Vec<TransportEvent>> {
    use transport_col::*;

    let mut events = Vec::with_capacity(table.rows.len());
    for (index, row) in table.rows.iter().enumerate() {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        let reader = RowReader::new(name, index, row);
        let timestamp = reader.label(TIMESTAMP);
        let at = if timestamp.is_empty() {
            None
        } else {
            Some(parser.parse(&timestamp).ok_or_else(|| {
                reader.malformed(TIMESTAMP, format!("unrecognized timestamp '{timestamp}'"))
            })?)
        };
        events.push(TransportEvent {
            id: reader.label(ID),
            process_type: reader.label(PROCESS_TYPE),
            status: reader.label(STATUS),
            location: reader.label(LOCATION),
            subtype: reader.label(SUBTYPE),
            timestamp,
            at,
        });
    }
    Ok(events)
}

// ── Order-status change log ─────────────────────────────────────────────

/// One order-status change.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderStatusChange {
    pub batch_key: String,
    pub status_label: String,
    pub location_label: String,
    pub pallet_quantity: Option<f64>,
    pub colli_quantity: Option<f64>,
    /// Kept as imported; only ever copied through.
    pub changed_at: Cell,
}

pub fn read_status_changes(name: &str, table: &Table) -> Result<Vec<OrderStatusChange>> {
    use change_col::*;

    let mut changes = Vec::with_capacity(table.rows.len());
    for (index, row) in table.rows.iter().enumerate() {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        let reader = RowReader::new(name, index, row);
        changes.push(OrderStatusChange {
            batch_key: reader.label(BATCH_KEY),
            status_label: reader.label(STATUS_LABEL),
            location_label: reader.label(LOCATION_LABEL),
            pallet_quantity: reader.number(PALLET_QUANTITY)?,
            colli_quantity: reader.number(COLLI_QUANTITY)?,
            changed_at: reader.cell(CHANGED_AT).clone(),
        });
    }
    Ok(changes)
}

// ── Order monitor snapshot ──────────────────────────────────────────────

/// One order monitor row.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderMonitorRow {
    pub batch_key: String,
    pub status: String,
    pub order_id: String,
    pub date_code: String,
    /// Parsed `recorded_at`; unparseable or empty values sort last.
    pub recorded_at: Option<NaiveDateTime>,
    pub location_label: String,
    pub flag: Cell,
    /// 1-based sheet row, for error context downstream.
    pub row_number: usize,
}

pub fn read_order_monitor(
    name: &str,
    table: &Table,
    parser: &TimestampParser,
) -> Result<Vec<OrderMonitorRow>> {
    use monitor_col::*;

    let mut rows = Vec::with_capacity(table.rows.len());
    for (index, row) in table.rows.iter().enumerate() {
        if row.iter().all(Cell::is_empty) {
            continue;
        }
        let reader = RowReader::new(name, index, row);
        rows.push(OrderMonitorRow {
            batch_key: reader.label(BATCH_KEY),
            status: reader.label(STATUS),
            order_id: reader.label(ORDER_ID),
            date_code: reader.label(DATE_CODE),
            recorded_at: reader.text(RECORDED_AT).and_then(|raw| parser.parse(&raw)),
            location_label: reader.label(LOCATION_LABEL),
            flag: reader.cell(FLAG).clone(),
            row_number: reader.row_number(),
        });
    }
    Ok(rows)
}
