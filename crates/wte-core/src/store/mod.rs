//! Generic tabular store.
//!
//! Tables are header + grid of loosely typed cells, the shape a spreadsheet
//! range read returns. Every stage reads and writes whole named tables
//! through [`TabularStore`] and ends with [`TabularStore::flush`], which is
//! the commit barrier between stages.

mod file;
mod memory;

use std::ops::Range;

use serde::{Deserialize, Serialize};
use wte_common::{Error, Result};

pub use file::{JsonFileStore, LOCK_FILE_NAME, MANIFEST_FILE_NAME};
pub use memory::MemoryStore;

static EMPTY_CELL: Cell = Cell::Empty;

/// A single cell value.
///
/// Serialized untagged, so a grid file is a plain JSON array of arrays with
/// `null`, numbers and strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Empty, or text that is blank after trimming.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(_) => false,
            Cell::Text(s) => s.trim().is_empty(),
        }
    }

    /// Trimmed text content. Whole numbers render without a fraction so
    /// numeric ids compare equal to their text form.
    pub fn text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{n:.0}")),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
        }
    }

    /// Numeric content; `Ok(None)` when empty, `Err` when text is not a number.
    /// A decimal comma is accepted.
    pub fn number(&self) -> std::result::Result<Option<f64>, String> {
        match self {
            Cell::Empty => Ok(None),
            Cell::Number(n) => Ok(Some(*n)),
            Cell::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Ok(None);
                }
                trimmed
                    .replace(',', ".")
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| format!("'{trimmed}' is not a number"))
            }
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

/// A named table's contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    #[serde(default)]
    pub header: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<S: AsRef<str>>(header: &[S]) -> Self {
        Self {
            header: header.iter().map(|h| h.as_ref().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Cell>>) -> Self {
        self.rows = rows;
        self
    }

    /// Cell at `(row, col)`; out-of-range positions read as empty.
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY_CELL)
    }

    /// Number of leading rows up to and including the last row with any
    /// non-empty cell.
    pub fn populated_len(&self) -> usize {
        self.rows
            .iter()
            .rposition(|row| row.iter().any(|c| !c.is_empty()))
            .map_or(0, |idx| idx + 1)
    }

    /// Whether neither the header nor any row holds content.
    pub fn is_blank(&self) -> bool {
        self.header.iter().all(|h| h.trim().is_empty()) && self.populated_len() == 0
    }

    /// Append rows directly after the last populated row, dropping trailing
    /// blank rows. Returns the index of the first appended row.
    pub fn append_after_last_populated(&mut self, rows: Vec<Vec<Cell>>) -> usize {
        let start = self.populated_len();
        self.rows.truncate(start);
        self.rows.extend(rows);
        start
    }

    /// Empty the given column range in the header and every row; rows left
    /// without content are dropped.
    pub fn clear_columns(&mut self, columns: Range<usize>) {
        for idx in columns.clone() {
            if let Some(h) = self.header.get_mut(idx) {
                h.clear();
            }
        }
        for row in &mut self.rows {
            for idx in columns.clone() {
                if let Some(cell) = row.get_mut(idx) {
                    *cell = Cell::Empty;
                }
            }
        }
        self.rows.retain(|row| row.iter().any(|c| !c.is_empty()));
        if self.header.iter().all(|h| h.is_empty()) {
            self.header.clear();
        }
    }
}

/// Range-level access to named tables.
pub trait TabularStore {
    /// Names of all tables, sorted.
    fn table_names(&self) -> Vec<String>;

    fn has_table(&self, name: &str) -> bool;

    /// Create an empty table; returns `false` if it already existed.
    fn create_table(&mut self, name: &str) -> Result<bool>;

    /// Read a whole table. Fails with [`Error::MissingTable`] if absent.
    fn read_table(&self, name: &str) -> Result<Table>;

    /// Replace a table's contents. The table must exist.
    fn write_table(&mut self, name: &str, table: Table) -> Result<()>;

    /// Mark a table as the surface shown to operators.
    fn set_active(&mut self, name: &str) -> Result<()>;

    fn active(&self) -> Option<String>;

    /// Durably commit every write made so far.
    fn flush(&mut self) -> Result<()>;

    /// Append rows after the last populated row as one contiguous block,
    /// writing `header` first if the table has none. Returns the index of the
    /// first appended row.
    fn append_rows(&mut self, name: &str, header: &[String], rows: Vec<Vec<Cell>>) -> Result<usize> {
        let mut table = self.read_table(name)?;
        if table.header.iter().all(|h| h.trim().is_empty()) {
            table.header = header.to_vec();
        }
        let start = table.append_after_last_populated(rows);
        self.write_table(name, table)?;
        Ok(start)
    }

    /// Clear all contents, header included.
    fn clear_table(&mut self, name: &str) -> Result<()> {
        if !self.has_table(name) {
            return Err(missing(name));
        }
        self.write_table(name, Table::default())
    }

    /// Clear a column range, header included.
    fn clear_columns(&mut self, name: &str, columns: Range<usize>) -> Result<()> {
        let mut table = self.read_table(name)?;
        table.clear_columns(columns);
        self.write_table(name, table)
    }
}

pub(crate) fn missing(name: &str) -> Error {
    Error::MissingTable {
        table: name.to_string(),
    }
}
