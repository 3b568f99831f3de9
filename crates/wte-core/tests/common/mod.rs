//! Shared raw-import fixtures for the integration tests.

#![allow(dead_code)]

use wte_config::PipelineConfig;
use wte_core::pipeline::ensure_tables;
use wte_core::store::{Cell, Table, TabularStore};

pub const DAY: &str = "15.01.2026";

fn row(values: &[&str]) -> Vec<Cell> {
    values.iter().map(|v| Cell::from(*v)).collect()
}

fn at(time: &str) -> String {
    format!("{DAY} {time}")
}

/// A shipment created at `released` and completed at `ended`.
pub fn shipment_events(order_id: &str, released: &str, ended: &str) -> Vec<Vec<Cell>> {
    vec![
        row(&[
            order_id,
            "Versand Karton",
            "Transportrequest erstellt",
            "",
            "PACK",
            "",
            &at(released),
        ]),
        row(&[
            order_id,
            "Versand Karton",
            "Transportrequest erledigt",
            "",
            "PACK",
            "PALAP1",
            &at(ended),
        ]),
    ]
}

/// A started outlet container transport from `location`/`subtype`.
pub fn container_event(id: &str, location: &str, subtype: &str, time: &str) -> Vec<Cell> {
    row(&[
        id,
        "Outletbehälter",
        "Transportrequest gestartet",
        "",
        location,
        subtype,
        &at(time),
    ])
}

/// One outlet monitor row in the 24-column import layout.
pub fn monitor_row(batch_key: &str, order_id: &str, recorded_at: &str, flag: &str) -> Vec<Cell> {
    let mut cells = vec![Cell::Empty; 24];
    cells[0] = Cell::from(batch_key);
    cells[1] = Cell::from("Open");
    cells[2] = Cell::from(order_id);
    cells[5] = Cell::from(DAY);
    cells[6] = Cell::from(at(recorded_at));
    cells[18] = Cell::from("OUTLET");
    cells[23] = Cell::from(flag);
    cells
}

/// Finalization start at the outlet with pallet and colli quantities.
pub fn finalization(batch_key: &str, pallets: f64, colli: f64, time: &str) -> Vec<Cell> {
    vec![
        Cell::from(batch_key),
        Cell::from("Finalisierung gestartet"),
        Cell::from("OUTLET"),
        Cell::from(pallets),
        Cell::from(colli),
        Cell::from(at(time)),
    ]
}

/// Batch B1: window 08:30-09:15, 20 colli on 2 pallets, three distinct
/// AKL_G/ZU outlet transports inside the window and one exactly at its start.
pub fn single_batch_import() -> (Vec<Vec<Cell>>, Vec<Vec<Cell>>, Vec<Vec<Cell>>) {
    let mut transport = shipment_events("4001", "08:30:00", "09:15:00");
    transport.push(container_event("E1", "AKL_G", "ZU", "08:40:00"));
    transport.push(container_event("E2", "AKL_G", "ZU", "08:50:00"));
    transport.push(container_event("E3", "AKL_G", "ZU", "09:00:00"));
    transport.push(container_event("E1", "AKL_G", "ZU", "09:05:00"));
    transport.push(container_event("E4", "AKL_G", "ZU", "08:30:00"));

    let changes = vec![finalization("B1", 2.0, 20.0, "09:20:00")];
    let monitor = vec![monitor_row("B1", "4001", "10:00:00", "X")];
    (transport, changes, monitor)
}

/// Create every table and load one raw import.
pub fn load_import<S: TabularStore>(
    store: &mut S,
    config: &PipelineConfig,
    (transport, changes, monitor): (Vec<Vec<Cell>>, Vec<Vec<Cell>>, Vec<Vec<Cell>>),
) {
    ensure_tables(store, config).unwrap();
    let tables = &config.tables;
    store
        .write_table(
            &tables.transport_events,
            Table::new(&["id", "process_type", "status", "", "location", "subtype", "timestamp"])
                .with_rows(transport),
        )
        .unwrap();
    store
        .write_table(
            &tables.status_changes,
            Table::new(&["batch", "status", "location", "pallets", "colli", "changed_at"])
                .with_rows(changes),
        )
        .unwrap();
    store
        .write_table(&tables.order_monitor, Table::new(&["batch"]).with_rows(monitor))
        .unwrap();
    store.flush().unwrap();
}
