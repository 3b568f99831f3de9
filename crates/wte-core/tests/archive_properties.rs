//! Property-based tests for overview archival.
//!
//! Validates:
//! - Archiving the same aggregate rows twice appends nothing the second time
//! - Overview keys stay unique whatever the batch order or duplication
//! - Rows are appended in input order after existing content

use std::collections::HashSet;

use proptest::prelude::*;
use wte_core::aggregate::KEY_COLUMN;
use wte_core::archive::ArchivalDeduplicator;
use wte_core::store::{Cell, MemoryStore, Table, TabularStore};

const OVERVIEW: &str = "Übersicht";

fn header() -> Vec<String> {
    vec!["week".into(), "date".into(), "batch_key".into(), "flag".into()]
}

fn row(key: &str, marker: usize) -> Vec<Cell> {
    vec![
        Cell::from(3.0),
        Cell::from("15/01/2026"),
        Cell::from(key),
        Cell::from(marker as f64),
    ]
}

fn keys_strategy() -> impl Strategy<Value = Vec<Option<String>>> {
    prop::collection::vec(
        prop_oneof![
            4 => "[A-D][0-9]".prop_map(Some),
            1 => Just(None),
        ],
        0..40,
    )
}

fn rows_for(keys: &[Option<String>]) -> Vec<Vec<Cell>> {
    keys.iter()
        .enumerate()
        .map(|(i, k)| row(k.as_deref().unwrap_or(""), i))
        .collect()
}

fn store() -> MemoryStore {
    let mut store = MemoryStore::new();
    store.insert(OVERVIEW, Table::default());
    store
}

fn overview_keys(store: &MemoryStore) -> Vec<String> {
    store
        .read_table(OVERVIEW)
        .unwrap()
        .rows
        .iter()
        .filter_map(|r| r.get(KEY_COLUMN).and_then(Cell::text))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn second_archive_is_a_no_op(keys in keys_strategy()) {
        let mut store = store();
        let dedup = ArchivalDeduplicator::new(OVERVIEW);
        dedup.archive(&mut store, &header(), rows_for(&keys)).unwrap();
        let before = store.read_table(OVERVIEW).unwrap();

        let again = dedup.archive(&mut store, &header(), rows_for(&keys)).unwrap();
        prop_assert_eq!(again.appended, 0);
        prop_assert_eq!(again.first_row, None);
        prop_assert_eq!(store.read_table(OVERVIEW).unwrap(), before);
    }

    #[test]
    fn overview_keys_are_unique(first in keys_strategy(), second in keys_strategy()) {
        let mut store = store();
        let dedup = ArchivalDeduplicator::new(OVERVIEW);
        dedup.archive(&mut store, &header(), rows_for(&first)).unwrap();
        dedup.archive(&mut store, &header(), rows_for(&second)).unwrap();

        let keys = overview_keys(&store);
        let distinct: HashSet<&String> = keys.iter().collect();
        prop_assert_eq!(distinct.len(), keys.len());

        let expected: HashSet<String> = first.iter().chain(&second).flatten().cloned().collect();
        prop_assert_eq!(distinct.len(), expected.len());
    }

    #[test]
    fn outcome_accounts_for_every_row(keys in keys_strategy()) {
        let mut store = store();
        let outcome = ArchivalDeduplicator::new(OVERVIEW)
            .archive(&mut store, &header(), rows_for(&keys))
            .unwrap();
        prop_assert_eq!(outcome.appended + outcome.skipped(), keys.len());
        prop_assert_eq!(outcome.skipped_empty, keys.iter().filter(|k| k.is_none()).count());
    }

    #[test]
    fn first_occurrence_wins_in_input_order(keys in keys_strategy()) {
        let mut store = store();
        ArchivalDeduplicator::new(OVERVIEW)
            .archive(&mut store, &header(), rows_for(&keys))
            .unwrap();

        let mut seen = HashSet::new();
        let expected: Vec<String> = keys
            .iter()
            .flatten()
            .filter(|k| seen.insert((*k).clone()))
            .cloned()
            .collect();
        prop_assert_eq!(overview_keys(&store), expected);
    }
}
