//! Deduplicating append of aggregate rows into the overview table.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};
use wte_common::Result;

use crate::aggregate::KEY_COLUMN;
use crate::store::{Cell, TabularStore};

/// What one archival call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveOutcome {
    pub appended: usize,
    /// Rows whose key was already archived or repeated earlier in the batch.
    pub skipped_existing: usize,
    /// Rows without a key.
    pub skipped_empty: usize,
    /// Index of the first appended row, when anything was appended.
    pub first_row: Option<usize>,
}

impl ArchiveOutcome {
    pub fn skipped(&self) -> usize {
        self.skipped_existing + self.skipped_empty
    }
}

/// Appends rows whose key the overview does not hold yet.
#[derive(Debug, Clone)]
pub struct ArchivalDeduplicator {
    overview: String,
    key_column: usize,
}

impl ArchivalDeduplicator {
    pub fn new(overview: impl Into<String>) -> Self {
        Self {
            overview: overview.into(),
            key_column: KEY_COLUMN,
        }
    }

    /// Keep the rows to append, in input order. `known` is extended with
    /// every accepted key.
    pub fn select_new(
        &self,
        rows: Vec<Vec<Cell>>,
        known: &mut HashSet<String>,
    ) -> (Vec<Vec<Cell>>, ArchiveOutcome) {
        let mut outcome = ArchiveOutcome::default();
        let mut buffer = Vec::new();
        for row in rows {
            let key = row.get(self.key_column).and_then(Cell::text);
            match key {
                None => outcome.skipped_empty += 1,
                Some(key) if known.contains(&key) => {
                    debug!(batch_key = %key, "already archived");
                    outcome.skipped_existing += 1;
                }
                Some(key) => {
                    known.insert(key);
                    buffer.push(row);
                }
            }
        }
        outcome.appended = buffer.len();
        (buffer, outcome)
    }

    /// Merge `rows` into the overview as one contiguous append after its
    /// last populated row. `header` is written only into an empty overview.
    pub fn archive<S: TabularStore>(
        &self,
        store: &mut S,
        header: &[String],
        rows: Vec<Vec<Cell>>,
    ) -> Result<ArchiveOutcome> {
        let overview = store.read_table(&self.overview)?;
        let mut known: HashSet<String> = overview
            .rows
            .iter()
            .filter_map(|r| r.get(self.key_column).and_then(Cell::text))
            .collect();
        debug!(table = %self.overview, known = known.len(), "overview keys loaded");

        let (buffer, mut outcome) = self.select_new(rows, &mut known);
        if !buffer.is_empty() {
            let first = store.append_rows(&self.overview, header, buffer)?;
            outcome.first_row = Some(first);
        }
        info!(
            table = %self.overview,
            appended = outcome.appended,
            skipped_existing = outcome.skipped_existing,
            skipped_empty = outcome.skipped_empty,
            "archive merged"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Table};

    fn row(key: &str, marker: &str) -> Vec<Cell> {
        vec![Cell::from("3"), Cell::from("15/01/2026"), Cell::from(key), Cell::from(marker)]
    }

    fn header() -> Vec<String> {
        ["week", "date", "batch_key", "flag"].map(String::from).to_vec()
    }

    fn store_with(rows: Vec<Vec<Cell>>) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.insert("Overview", Table::new(&header()).with_rows(rows));
        store
    }

    #[test]
    fn skips_known_empty_and_repeated_keys() {
        let mut store = store_with(vec![row("B1", "old")]);
        let dedup = ArchivalDeduplicator::new("Overview");
        let outcome = dedup
            .archive(
                &mut store,
                &header(),
                vec![
                    row("B1", "new"),
                    row("", "blank"),
                    row("B2", "first"),
                    row("B2", "second"),
                    row("B3", "x"),
                ],
            )
            .unwrap();
        assert_eq!(outcome.appended, 2);
        assert_eq!(outcome.skipped_existing, 2);
        assert_eq!(outcome.skipped_empty, 1);
        assert_eq!(outcome.first_row, Some(1));

        let table = store.read_table("Overview").unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.cell(0, 3), &Cell::from("old"));
        assert_eq!(table.cell(1, 3), &Cell::from("first"));
        assert_eq!(table.cell(2, 2), &Cell::from("B3"));
    }

    #[test]
    fn appends_after_last_populated_row() {
        let mut store = store_with(vec![row("B1", "a"), vec![Cell::Empty; 4], vec![]]);
        let outcome = ArchivalDeduplicator::new("Overview")
            .archive(&mut store, &header(), vec![row("B2", "b")])
            .unwrap();
        assert_eq!(outcome.first_row, Some(1));
        assert_eq!(store.read_table("Overview").unwrap().rows.len(), 2);
    }

    #[test]
    fn nothing_new_leaves_overview_untouched() {
        let mut store = store_with(vec![row("B1", "a")]);
        let before = store.read_table("Overview").unwrap();
        let outcome = ArchivalDeduplicator::new("Overview")
            .archive(&mut store, &header(), vec![row("B1", "again")])
            .unwrap();
        assert_eq!(outcome.appended, 0);
        assert_eq!(outcome.first_row, None);
        assert_eq!(store.read_table("Overview").unwrap(), before);
    }

    #[test]
    fn numeric_keys_match_text_keys() {
        let mut store = store_with(vec![vec![
            Cell::Empty,
            Cell::Empty,
            Cell::Number(4711.0),
        ]]);
        let outcome = ArchivalDeduplicator::new("Overview")
            .archive(&mut store, &header(), vec![row("4711", "dup")])
            .unwrap();
        assert_eq!(outcome.skipped_existing, 1);
    }
}
