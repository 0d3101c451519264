use serde_json::Value;

use crate::models::snapshot::*;

// --------------------------------------------------------------------------------------------------------------
// Static metadata the host can cache: one device per account, one sensor description per snapshot key.

pub const MANUFACTURER:      &str = "UTE";
pub const MODEL:             &str = "UTE Energy account";
pub const DOCUMENTATION_URL: &str = "https://www.ute.com.uy/clientes/autoservicio";

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    pub model:             &'static str,
    pub manufacturer:      &'static str,
    /// Stable identity: the account service point id.
    pub identity:          String,
    pub documentation_url: &'static str,
}

impl DeviceDescriptor {
    pub fn for_account(account_service_point_id: &str) -> Self {
        Self {
            model:             MODEL,
            manufacturer:      MANUFACTURER,
            identity:          account_service_point_id.to_string(),
            documentation_url: DOCUMENTATION_URL,
        }
    }
}

// --------------------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorCategory {
    Agreement,
    Billing,
    Consumption,
    Live,
}

#[derive(Debug, Clone, Copy)]
pub struct SensorDescription {
    pub key:      &'static str,
    pub name:     &'static str,
    pub unit:     Option<&'static str>,
    pub category: SensorCategory,
}

pub const SENSOR_TYPES: &[SensorDescription] = &[
    SensorDescription { key: KEY_SERVICE_AGREEMENT_ID,       name: "Agreement",                  unit: None,        category: SensorCategory::Agreement },
    SensorDescription { key: KEY_CONTRACTED_TARIFF,          name: "Contracted tariff",          unit: None,        category: SensorCategory::Agreement },
    SensorDescription { key: KEY_CONTRACTED_VOLTAGE,         name: "Contracted voltage",         unit: Some("V"),   category: SensorCategory::Agreement },
    SensorDescription { key: KEY_CONTRACTED_POWER_ON_PEAK,   name: "Contracted power on peak",   unit: Some("kW"),  category: SensorCategory::Agreement },
    SensorDescription { key: KEY_CONTRACTED_POWER_ON_VALLEY, name: "Contracted power on valley", unit: Some("kW"),  category: SensorCategory::Agreement },
    SensorDescription { key: KEY_CONTRACTED_POWER_ON_FLAT,   name: "Contracted power on flat",   unit: Some("kW"),  category: SensorCategory::Agreement },
    SensorDescription { key: KEY_PEAK_TIME,                  name: "Peak time",                  unit: None,        category: SensorCategory::Agreement },
    SensorDescription { key: KEY_LATEST_INVOICE,             name: "Latest month invoice",       unit: None,        category: SensorCategory::Billing },
    SensorDescription { key: KEY_MONTH_CHARGES,              name: "Latest month charges",       unit: Some("UYU"), category: SensorCategory::Billing },
    SensorDescription { key: KEY_MONTH_CONSUMPTION,          name: "Latest month consumption",   unit: Some("kWh"), category: SensorCategory::Consumption },
    SensorDescription { key: KEY_CURRENT,                    name: "Current",                    unit: Some("A"),   category: SensorCategory::Live },
    SensorDescription { key: KEY_VOLTAGE,                    name: "Voltage",                    unit: Some("V"),   category: SensorCategory::Live },
    SensorDescription { key: KEY_POWER,                      name: "Power",                      unit: Some("W"),   category: SensorCategory::Live },
    SensorDescription { key: KEY_ENERGY,                     name: "Energy",                     unit: Some("kWh"), category: SensorCategory::Live },
];

pub fn describe(key: &str) -> Option<&'static SensorDescription> {
    SENSOR_TYPES.iter().find(|d| d.key == key)
}

/// Render one snapshot field for display, e.g. "Latest month charges: 2150.5 UYU".
pub fn render_field(key: &str, value: &Value) -> String {
    let shown = match value {
        Value::String(s) => s.clone(),
        other            => other.to_string(),
    };
    match describe(key) {
        Some(SensorDescription { name, unit: Some(unit), .. }) => format!("{}: {} {}", name, shown, unit),
        Some(SensorDescription { name, unit: None, .. })       => format!("{}: {}", name, shown),
        None                                                    => format!("{}: {}", key, shown),
    }
}

// --------------------------------------------------------------------------------------------------------------
