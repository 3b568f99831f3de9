//! Distinct-count counter definitions.
//!
//! Each counter counts distinct transport event ids inside a batch window
//! that satisfy every one of its equality filters at once. A filter left as
//! `None` does not constrain that column. Bound inclusivity is per counter
//! and differs across the nine defaults; keep it as configured.

use chrono::NaiveTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Number of counter columns in the aggregate layout.
pub const COUNTER_COUNT: usize = 9;

const STARTED: &str = "Transportrequest gestartet";
const OUTLET_CONTAINER: &str = "Outletbehälter";
const SHIPPING_CARTON: &str = "Versandkarton";

/// One windowed distinct-count query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CounterSpec {
    /// Column name in the aggregate and overview tables.
    pub name: String,

    /// Required container/process type (column B).
    #[serde(default)]
    pub process_type: Option<String>,

    /// Required lifecycle status (column C).
    #[serde(default)]
    pub status: Option<String>,

    /// Required source location (column E).
    #[serde(default)]
    pub location: Option<String>,

    /// Required subtype (column F).
    #[serde(default)]
    pub subtype: Option<String>,

    /// Whether an event exactly at the window start counts.
    #[serde(default)]
    pub inclusive_low: bool,

    /// Whether an event exactly at the window end counts.
    #[serde(default)]
    pub inclusive_high: bool,
}

impl CounterSpec {
    fn exclusive(name: &str) -> Self {
        Self {
            name: name.to_string(),
            process_type: Some(OUTLET_CONTAINER.to_string()),
            status: Some(STARTED.to_string()),
            location: None,
            subtype: None,
            inclusive_low: false,
            inclusive_high: false,
        }
    }

    fn inclusive(name: &str) -> Self {
        Self {
            inclusive_low: true,
            inclusive_high: true,
            ..Self::exclusive(name)
        }
    }

    fn location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }

    fn subtype(mut self, subtype: &str) -> Self {
        self.subtype = Some(subtype.to_string());
        self
    }

    fn process_type(mut self, process_type: Option<&str>) -> Self {
        self.process_type = process_type.map(str::to_string);
        self
    }

    /// Whether `time` falls inside `[start, end]` under this counter's bounds.
    pub fn window_admits(&self, time: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
        let above = if self.inclusive_low {
            time >= start
        } else {
            time > start
        };
        let below = if self.inclusive_high {
            time <= end
        } else {
            time < end
        };
        above && below
    }
}

/// The nine counters of the overview layout, in column order.
pub fn default_counters() -> [CounterSpec; COUNTER_COUNT] {
    [
        CounterSpec::exclusive("outlet_akl_g_zu")
            .location("AKL_G")
            .subtype("ZU"),
        CounterSpec::exclusive("outlet_pall_vd")
            .location("PALL")
            .subtype("VD"),
        CounterSpec::exclusive("outlet_akl_pallpzu")
            .location("AKL")
            .subtype("PALLPZU"),
        CounterSpec::exclusive("outlet_akl_g_ol")
            .location("AKL G")
            .subtype("OL"),
        CounterSpec::exclusive("outlet_gs_akl")
            .location("GS")
            .subtype("AKL"),
        CounterSpec::exclusive("outlet_to_akl").subtype("AKL"),
        CounterSpec::inclusive("outlet_from_akl_g").location("AKL G"),
        CounterSpec::inclusive("carton_from_akl")
            .location("AKL")
            .process_type(Some(SHIPPING_CARTON)),
        CounterSpec::inclusive("any_from_akl_g")
            .location("AKL G")
            .process_type(None),
    ]
}
