use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// --------------------------------------------------------------------------------------------------------------
// The UTE mobile API returns identifiers and amounts either as a number or a string depending on the
// endpoint. Both field kinds go through one scalar that accepts either shape.

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
}

/// Parse a meter or amount value. Decimal commas are accepted; NaN and infinities are not.
pub fn parse_amount(text: &str) -> Option<f64> {
    text.trim().replace(',', ".").parse::<f64>().ok().filter(|v| v.is_finite())
}

fn deserialize_to_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(text)     => text,
        Scalar::Integer(value) => value.to_string(),
        Scalar::Float(value)   => value.to_string(),
    })
}

fn deserialize_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Scalar::deserialize(deserializer)? {
        Scalar::Text(text)     => parse_amount(&text)
            .ok_or_else(|| de::Error::custom(format!("'{}' is not a finite number", text))),
        Scalar::Integer(value) => Ok(value as f64),
        Scalar::Float(value)   => Ok(value),
    }
}

// --------------------------------------------------------------------------------------------------------------
// Response envelope shared by every endpoint except `v1/token`, which answers with the bare token text.
//
//   {"success": true, "data": <payload>, "errors": [{"text": "..."}]}

#[derive(Deserialize, Debug)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub success: bool,
    pub data:    Option<T>,
    pub errors:  Option<Vec<ApiMessage>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ApiMessage {
    pub text: Option<String>,
}

impl<T> ApiResponse<T> {
    /// All error texts reported by the server, joined for logging.
    pub fn error_text(&self) -> String {
        self.errors
            .iter()
            .flatten()
            .filter_map(|e| e.text.as_deref())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

// --------------------------------------------------------------------------------------------------------------

/// One electricity supply point from GET v1/accounts.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Account {
    #[serde(rename = "accountServicePointId", deserialize_with = "deserialize_to_string")]
    pub service_point_id: String,
    #[serde(rename = "servicePointAddress", default)]
    pub address:          String,
    #[serde(rename = "accountId", default, deserialize_with = "deserialize_to_string")]
    pub account_id:       String,
}

/// Payload of GET v1/accounts/{id}. Only the agreement block is consumed.
#[derive(Deserialize, Debug)]
pub struct AccountDetails {
    #[serde(rename = "agreementInfo")]
    pub agreement_info: Option<AgreementInfo>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgreementInfo {
    #[serde(deserialize_with = "deserialize_to_string")]
    pub service_agreement_id:       String,
    #[serde(deserialize_with = "deserialize_to_string")]
    pub contracted_tariff:          String,   // e.g. "TRT" (triple), "TRD" (double), "TRS" (simple)
    #[serde(deserialize_with = "deserialize_to_string")]
    pub contracted_voltage:         String,
    #[serde(deserialize_with = "deserialize_to_f64")]
    pub contracted_power_on_peak:   f64,      // kW
    #[serde(deserialize_with = "deserialize_to_f64")]
    pub contracted_power_on_valley: f64,      // kW
    #[serde(deserialize_with = "deserialize_to_f64")]
    pub contracted_power_on_flat:   f64,      // kW
}

/// Payload of GET v1/peak/{id}.
#[derive(Deserialize, Debug)]
pub struct PeakTime {
    #[serde(rename = "peakTimeId")]
    pub id: Option<Value>,
}

impl PeakTime {
    /// The peak window identifier as text, if the server sent one.
    pub fn id_text(&self) -> Option<String> {
        match self.id.as_ref()? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n)                  => Some(n.to_string()),
            _                                 => None,
        }
    }
}

/// One entry of GET v1/invoices/{id}/1/36.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Invoice {
    pub year:         i32,
    pub month:        u32,
    #[serde(rename = "totalAmount", deserialize_with = "deserialize_to_f64")]
    pub total_amount: f64,    // UYU
}

/// Payload of GET v1/chart/{id}.
#[derive(Deserialize, Debug, Default)]
pub struct ConsumptionChart {
    #[serde(default)]
    pub series: Vec<ConsumptionSeries>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ConsumptionSeries {
    #[serde(rename = "activeConsumption", default)]
    pub active_consumption: Vec<ConsumptionEntry>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ConsumptionEntry {
    pub id:       i64,
    #[serde(rename = "consumptionCategory")]
    pub category: i64,
    #[serde(deserialize_with = "deserialize_to_f64")]
    pub value:    f64,    // kWh
}

/// Payload of GET v1/device/{id}/lastReading/30.
#[derive(Deserialize, Debug, Default)]
pub struct LastReading {
    #[serde(default)]
    pub readings: Vec<MeterReading>,
}

/// A single `{attribute, value}` pair reported by the smart meter.
#[derive(Deserialize, Debug, Clone)]
pub struct MeterReading {
    #[serde(rename = "tipoLecturaMGMI")]
    pub attribute: String,    // "I1" = current, "V1" = voltage
    #[serde(rename = "valor", deserialize_with = "deserialize_to_string")]
    pub value:     String,
}

// --------------------------------------------------------------------------------------------------------------
// Request bodies

#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct TokenRequest<'a> {
    pub email:        &'a str,
    pub phone_number: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct RegisterRequest<'a> {
    pub user_id:      u32,
    pub name:         &'a str,
    pub email:        &'a str,
    pub phone_number: &'a str,
    pub is_validated: bool,
    pub is_banned:    bool,
    pub unique_id:    Option<&'a str>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct ValidateCodeRequest<'a> {
    pub validation_code: &'a str,
}

/// POST v1/misc/behaviour: ask the server whether a named feature applies to an account.
#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct BehaviourRequest<'a> {
    pub name:                     &'a str,
    pub account_service_point_id: &'a str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct ReadingRequest<'a> {
    pub account_service_point_id: &'a str,
}

// --------------------------------------------------------------------------------------------------------------
