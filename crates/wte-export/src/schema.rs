//! Arrow schema for the overview table.
//!
//! Times of day are `Time32(Second)`, dates `Date32`, and signed spans are
//! `Int64` milliseconds with an `_ms` suffix. Every metric column is
//! nullable: an absent metric stays null, never zero.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, Date32Array, Float64Array, Int32Array, Int64Array, StringArray, Time32SecondArray,
    UInt64Array, UInt8Array,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::Serialize;

use crate::writer::WriteError;

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// One archived overview row, in export form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewRecord {
    pub week: Option<u32>,
    pub date: Option<NaiveDate>,
    pub batch_key: String,
    pub flag: Option<String>,
    pub window_start: Option<NaiveTime>,
    pub window_end: Option<NaiveTime>,
    pub duration_ms: Option<i64>,
    pub colli_total: Option<f64>,
    pub per_colli_duration_ms: Option<i64>,
    pub throughput_rate: Option<f64>,
    pub pallet_quantity: Option<f64>,
    pub per_pallet_duration_ms: Option<i64>,
    pub shift_flag: Option<u8>,
    /// One value per counter column, in layout order.
    pub counters: Vec<Option<u64>>,
}

/// Schema with one `UInt64` column per counter name.
pub fn overview_schema(counter_names: &[String]) -> Arc<Schema> {
    let time = DataType::Time32(TimeUnit::Second);
    let mut fields = vec![
        Field::new("week", DataType::Int32, true),
        Field::new("date", DataType::Date32, true),
        Field::new("batch_key", DataType::Utf8, false),
        Field::new("flag", DataType::Utf8, true),
        Field::new("window_start", time.clone(), true),
        Field::new("window_end", time, true),
        Field::new("duration_ms", DataType::Int64, true),
        Field::new("colli_total", DataType::Float64, true),
        Field::new("per_colli_duration_ms", DataType::Int64, true),
        Field::new("throughput_rate", DataType::Float64, true),
        Field::new("pallet_quantity", DataType::Float64, true),
        Field::new("per_pallet_duration_ms", DataType::Int64, true),
        Field::new("shift_flag", DataType::UInt8, true),
    ];
    fields.extend(
        counter_names
            .iter()
            .map(|name| Field::new(name.as_str(), DataType::UInt64, true)),
    );
    Arc::new(Schema::new(fields))
}

/// Build one record batch from overview records.
pub fn overview_to_batch(
    records: &[OverviewRecord],
    counter_names: &[String],
) -> Result<RecordBatch, WriteError> {
    if let Some(bad) = records.iter().find(|r| r.counters.len() != counter_names.len()) {
        return Err(WriteError::Shape(format!(
            "row '{}' has {} counters, layout has {}",
            bad.batch_key,
            bad.counters.len(),
            counter_names.len()
        )));
    }

    let schema = overview_schema(counter_names);
    let seconds = |t: Option<NaiveTime>| t.map(|t| t.num_seconds_from_midnight() as i32);

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(Int32Array::from(
            records.iter().map(|r| r.week.map(|w| w as i32)).collect::<Vec<_>>(),
        )),
        Arc::new(Date32Array::from(
            records
                .iter()
                .map(|r| r.date.map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE))
                .collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            records.iter().map(|r| Some(r.batch_key.as_str())).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(
            records.iter().map(|r| r.flag.as_deref()).collect::<Vec<_>>(),
        )),
        Arc::new(Time32SecondArray::from(
            records.iter().map(|r| seconds(r.window_start)).collect::<Vec<_>>(),
        )),
        Arc::new(Time32SecondArray::from(
            records.iter().map(|r| seconds(r.window_end)).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(
            records.iter().map(|r| r.duration_ms).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.colli_total).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(
            records.iter().map(|r| r.per_colli_duration_ms).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.throughput_rate).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            records.iter().map(|r| r.pallet_quantity).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(
            records.iter().map(|r| r.per_pallet_duration_ms).collect::<Vec<_>>(),
        )),
        Arc::new(UInt8Array::from(
            records.iter().map(|r| r.shift_flag).collect::<Vec<_>>(),
        )),
    ];
    for idx in 0..counter_names.len() {
        columns.push(Arc::new(UInt64Array::from(
            records.iter().map(|r| r.counters[idx]).collect::<Vec<_>>(),
        )));
    }

    Ok(RecordBatch::try_new(schema, columns)?)
}
