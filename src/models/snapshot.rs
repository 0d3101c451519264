use log::warn;
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::models::ute_models::AgreementInfo;

// --------------------------------------------------------------------------------------------------------------
// Snapshot keys, grouped by the pipeline stage that writes them. Each stage owns a disjoint set.

pub const KEY_SERVICE_AGREEMENT_ID:       &str = "serviceAgreementId";
pub const KEY_CONTRACTED_TARIFF:          &str = "contractedTariff";
pub const KEY_CONTRACTED_VOLTAGE:         &str = "contractedVoltage";
pub const KEY_CONTRACTED_POWER_ON_PEAK:   &str = "contractedPowerOnPeak";
pub const KEY_CONTRACTED_POWER_ON_VALLEY: &str = "contractedPowerOnValley";
pub const KEY_CONTRACTED_POWER_ON_FLAT:   &str = "contractedPowerOnFlat";

pub const KEY_PEAK_TIME:                  &str = "peakTime";

pub const KEY_LATEST_INVOICE:             &str = "latestInvoice";
pub const KEY_MONTH_CHARGES:              &str = "monthCharges";

pub const KEY_MONTH_CONSUMPTION:          &str = "monthConsumption";

pub const KEY_CURRENT:                    &str = "current";
pub const KEY_VOLTAGE:                    &str = "voltage";
pub const KEY_POWER:                      &str = "power";
pub const KEY_ENERGY:                     &str = "energy";

// --------------------------------------------------------------------------------------------------------------

/// Flat, insertion-ordered record assembled by one refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AccountSnapshot {
    fields: Map<String, Value>,
}

impl AccountSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the fields produced by one pipeline stage. Keys written by an earlier stage win.
    pub fn merge(&mut self, stage: impl SnapshotFields) {
        for (key, value) in stage.snapshot_fields() {
            if self.fields.contains_key(key) {
                warn!("[UTE] Snapshot key '{}' already set by an earlier stage; keeping the first value", key);
                continue;
            }
            self.fields.insert(key.to_string(), value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// --------------------------------------------------------------------------------------------------------------

/// Anything a pipeline stage produces that can be flattened into snapshot fields.
/// Returning an empty list is how a stage says "no data".
pub trait SnapshotFields {
    fn snapshot_fields(self) -> Vec<(&'static str, Value)>;
}

impl<T: SnapshotFields> SnapshotFields for Option<T> {
    fn snapshot_fields(self) -> Vec<(&'static str, Value)> {
        self.map(SnapshotFields::snapshot_fields).unwrap_or_default()
    }
}

impl SnapshotFields for AgreementInfo {
    fn snapshot_fields(self) -> Vec<(&'static str, Value)> {
        vec![
            (KEY_SERVICE_AGREEMENT_ID,       json!(self.service_agreement_id)),
            (KEY_CONTRACTED_TARIFF,          json!(self.contracted_tariff)),
            (KEY_CONTRACTED_VOLTAGE,         json!(self.contracted_voltage)),
            (KEY_CONTRACTED_POWER_ON_PEAK,   json!(self.contracted_power_on_peak)),
            (KEY_CONTRACTED_POWER_ON_VALLEY, json!(self.contracted_power_on_valley)),
            (KEY_CONTRACTED_POWER_ON_FLAT,   json!(self.contracted_power_on_flat)),
        ]
    }
}

/// Identifier of the on-peak window selected for the account.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakWindow(pub String);

impl SnapshotFields for PeakWindow {
    fn snapshot_fields(self) -> Vec<(&'static str, Value)> {
        vec![(KEY_PEAK_TIME, json!(self.0))]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatestInvoice {
    /// "{month abbreviation} {year}", e.g. "Jun 2023".
    pub label:   String,
    pub charges: f64,
}

impl SnapshotFields for LatestInvoice {
    fn snapshot_fields(self) -> Vec<(&'static str, Value)> {
        vec![
            (KEY_LATEST_INVOICE, json!(self.label)),
            (KEY_MONTH_CHARGES,  json!(self.charges)),
        ]
    }
}

/// Consumption of the latest month, kWh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthConsumption(pub f64);

impl SnapshotFields for MonthConsumption {
    fn snapshot_fields(self) -> Vec<(&'static str, Value)> {
        vec![(KEY_MONTH_CONSUMPTION, json!(self.0))]
    }
}

/// Live meter values. Every field is optional: a reading that never became available is all `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LiveReading {
    pub current_a:  Option<f64>,
    pub voltage_v:  Option<f64>,
    pub power_w:    Option<f64>,
    pub energy_kwh: Option<f64>,
}

impl LiveReading {
    pub fn is_empty(&self) -> bool {
        self.current_a.is_none() && self.voltage_v.is_none()
    }
}

impl SnapshotFields for LiveReading {
    fn snapshot_fields(self) -> Vec<(&'static str, Value)> {
        [
            (KEY_CURRENT, self.current_a),
            (KEY_VOLTAGE, self.voltage_v),
            (KEY_POWER,   self.power_w),
            (KEY_ENERGY,  self.energy_kwh),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, json!(v))))
        .collect()
    }
}

// --------------------------------------------------------------------------------------------------------------
