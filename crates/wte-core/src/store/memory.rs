//! In-memory store for tests and dry runs.

use std::collections::BTreeMap;

use wte_common::Result;

use super::{missing, Table, TabularStore};

/// Tables held in a map; `flush` only counts commits.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Table>,
    active: Option<String>,
    flushes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with the given tables.
    pub fn with_tables<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = (S, Table)>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(|(n, t)| (n.into(), t)).collect(),
            ..Self::default()
        }
    }

    /// Insert or replace a table without the existence check of `write_table`.
    pub fn insert(&mut self, name: impl Into<String>, table: Table) {
        self.tables.insert(name.into(), table);
    }

    /// Number of `flush` calls so far.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl TabularStore for MemoryStore {
    fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    fn create_table(&mut self, name: &str) -> Result<bool> {
        if self.tables.contains_key(name) {
            return Ok(false);
        }
        self.tables.insert(name.to_string(), Table::default());
        Ok(true)
    }

    fn read_table(&self, name: &str) -> Result<Table> {
        self.tables.get(name).cloned().ok_or_else(|| missing(name))
    }

    fn write_table(&mut self, name: &str, table: Table) -> Result<()> {
        match self.tables.get_mut(name) {
            Some(slot) => {
                *slot = table;
                Ok(())
            }
            None => Err(missing(name)),
        }
    }

    fn set_active(&mut self, name: &str) -> Result<()> {
        if !self.has_table(name) {
            return Err(missing(name));
        }
        self.active = Some(name.to_string());
        Ok(())
    }

    fn active(&self) -> Option<String> {
        self.active.clone()
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Cell;
    use wte_common::Error;

    #[test]
    fn missing_tables_are_errors() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.read_table("TS"),
            Err(Error::MissingTable { ref table }) if table == "TS"
        ));
        assert!(store.write_table("TS", Table::default()).is_err());
        assert!(store.set_active("TS").is_err());
    }

    #[test]
    fn append_writes_header_once() {
        let mut store = MemoryStore::new();
        store.create_table("Overview").unwrap();
        let header = vec!["key".to_string()];
        let first = store
            .append_rows("Overview", &header, vec![vec![Cell::from("A")]])
            .unwrap();
        let second = store
            .append_rows("Overview", &header, vec![vec![Cell::from("B")]])
            .unwrap();
        assert_eq!((first, second), (0, 1));
        let table = store.read_table("Overview").unwrap();
        assert_eq!(table.header, header);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn create_is_idempotent() {
        let mut store = MemoryStore::new();
        assert!(store.create_table("AF").unwrap());
        assert!(!store.create_table("AF").unwrap());
        assert_eq!(store.table_names(), vec!["AF"]);
    }
}
