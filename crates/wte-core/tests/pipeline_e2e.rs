//! End-to-end pipeline runs against an on-disk store.
//!
//! Validates:
//! - A full run turns one raw import into one overview row
//! - Window, throughput, pallet and counter values of that row
//! - Cleanup leaves the raw and staging tables empty
//! - Re-importing the same batch archives nothing new
//! - A store reopened from disk keeps the overview

mod common;

use common::{load_import, monitor_row, shipment_events, single_batch_import};
use tempfile::tempdir;
use wte_common::{RunId, Span};
use wte_config::PipelineConfig;
use wte_core::overview::read_overview;
use wte_core::pipeline::{Pipeline, Stage};
use wte_core::store::{JsonFileStore, TabularStore};
use wte_core::ExitCode;

#[test]
fn single_batch_run_produces_one_overview_row() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::default();
    let mut store = JsonFileStore::open(dir.path()).unwrap();
    load_import(&mut store, &config, single_batch_import());

    let report = Pipeline::new(&mut store, &config, RunId::new()).run_all().unwrap();
    assert_eq!(report.prepare.shipments_completed, 1);
    assert_eq!(report.prepare.shipments_created, 1);
    assert_eq!(report.prepare.pallet_finalizations, 1);
    assert_eq!(report.prepare.order_flags, 1);
    assert_eq!(report.analyze.rows, 1);
    assert_eq!(report.archive.appended, 1);

    let rows = read_overview(&store, &config).unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.batch_key, "B1");
    assert_eq!(row.week, Some(3));
    assert_eq!(row.duration, Some(Span::from_millis(45 * 60_000)));
    assert_eq!(row.colli_total, Some(20.0));
    assert_eq!(row.per_colli_duration, Some(Span::from_millis(135_000)));
    assert!((row.throughput_rate.unwrap() - 20.0 / 45.0).abs() < 1e-9);
    assert_eq!(row.pallet_quantity, Some(2.0));
    assert_eq!(row.per_pallet_duration, Some(Span::from_millis(1_350_000)));
    assert_eq!(row.shift_flag, Some(1));
    assert_eq!(row.counters[0], Some(3));
    assert!(row.counters[1..].iter().all(|c| *c == Some(0)));
}

#[test]
fn cleanup_empties_inputs_and_staging() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::default();
    let mut store = JsonFileStore::open(dir.path()).unwrap();
    load_import(&mut store, &config, single_batch_import());
    Pipeline::new(&mut store, &config, RunId::new()).run_all().unwrap();

    let tables = &config.tables;
    for name in tables.staging() {
        assert!(store.read_table(name).unwrap().is_blank(), "{name} not cleared");
    }
    assert!(store.read_table(&tables.status_changes).unwrap().is_blank());
    assert!(store.read_table(&tables.order_monitor).unwrap().is_blank());
    assert!(store.read_table(&tables.transport_events).unwrap().is_blank());
    assert_eq!(store.active().as_deref(), Some(tables.overview_yearly.as_str()));
}

#[test]
fn reimporting_the_same_batch_appends_nothing() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::default();
    let mut store = JsonFileStore::open(dir.path()).unwrap();

    load_import(&mut store, &config, single_batch_import());
    Pipeline::new(&mut store, &config, RunId::new()).run_all().unwrap();

    load_import(&mut store, &config, single_batch_import());
    let second = Pipeline::new(&mut store, &config, RunId::new()).run_all().unwrap();
    assert_eq!(second.archive.appended, 0);
    assert_eq!(second.archive.skipped_existing, 1);
    assert_eq!(read_overview(&store, &config).unwrap().len(), 1);

    // Nothing left to import at all.
    let third = Pipeline::new(&mut store, &config, RunId::new()).run_all().unwrap();
    assert_eq!(third.analyze.rows, 0);
    assert_eq!(third.archive.appended, 0);
}

#[test]
fn new_batch_in_a_later_import_is_appended_after_existing_rows() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::default();
    let mut store = JsonFileStore::open(dir.path()).unwrap();

    load_import(&mut store, &config, single_batch_import());
    Pipeline::new(&mut store, &config, RunId::new()).run_all().unwrap();

    let (mut transport, mut changes, mut monitor) = single_batch_import();
    transport.extend(shipment_events("4002", "11:00:00", "11:30:00"));
    changes.push(common::finalization("B2", 1.0, 30.0, "11:40:00"));
    monitor.push(monitor_row("B2", "4002", "12:00:00", ""));
    load_import(&mut store, &config, (transport, changes, monitor));

    let report = Pipeline::new(&mut store, &config, RunId::new()).run_all().unwrap();
    assert_eq!(report.archive.appended, 1);
    assert_eq!(report.archive.skipped_existing, 1);
    assert_eq!(report.archive.first_row, Some(1));

    let keys: Vec<String> = read_overview(&store, &config)
        .unwrap()
        .into_iter()
        .map(|r| r.batch_key)
        .collect();
    assert_eq!(keys, ["B1", "B2"]);
}

#[test]
fn overview_survives_reopen() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::default();
    {
        let mut store = JsonFileStore::open(dir.path()).unwrap();
        load_import(&mut store, &config, single_batch_import());
        Pipeline::new(&mut store, &config, RunId::new()).run_all().unwrap();
    }
    let store = JsonFileStore::open(dir.path()).unwrap();
    let rows = read_overview(&store, &config).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].counters[0], Some(3));
}

#[test]
fn malformed_date_code_fails_prepare_without_touching_staging() {
    let dir = tempdir().unwrap();
    let config = PipelineConfig::default();
    let mut store = JsonFileStore::open(dir.path()).unwrap();

    let (transport, changes, mut monitor) = single_batch_import();
    monitor[0][5] = "soon".into();
    load_import(&mut store, &config, (transport, changes, monitor));

    let err = Pipeline::new(&mut store, &config, RunId::new())
        .prepare()
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Prepare);
    assert_eq!(ExitCode::from(&err), ExitCode::InputError);
    assert!(err.to_string().contains("row 2"), "{err}");
    assert!(store
        .read_table(&config.tables.order_flags)
        .unwrap()
        .is_blank());
}
