//! Shared fixtures for the UTE client integration tests.
#![allow(dead_code)]

use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ute_energy::{ClientOptions, ReadingOptions, UteClient};

pub const EMAIL:   &str = "user@example.com.uy";
pub const PHONE:   &str = "59899123456";
pub const ACCOUNT: &str = "123456";
pub const TOKEN:   &str = "test-service-token";

pub fn bearer() -> String {
    format!("Bearer {}", TOKEN)
}

pub fn api_path(endpoint: &str) -> String {
    format!("/api/{}", endpoint)
}

pub fn options(server: &MockServer) -> ClientOptions {
    ClientOptions {
        base_url: format!("{}/api", server.uri()),
        reading:  ReadingOptions {
            max_iterations: 3,
            sleep_interval: Duration::ZERO,
            sync_interval:  None,
        },
    }
}

pub fn client(server: &MockServer) -> UteClient {
    UteClient::new(EMAIL, PHONE, options(server)).expect("valid test credentials")
}

pub fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": data, "errors": []}))
}

pub fn not_ok() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(json!({"success": false, "data": null, "errors": [{"text": "not available"}]}))
}

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(api_path("v1/token")))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKEN))
        .mount(server)
        .await;
}

// --------------------------------------------------------------------------------------------------------------
// Account pipeline fixtures

pub fn agreement() -> Value {
    json!({
        "accountServicePointId": ACCOUNT,
        "agreementInfo": {
            "serviceAgreementId": 987654,
            "contractedTariff": "TRT",
            "contractedVoltage": "230",
            "contractedPowerOnPeak": 6.6,
            "contractedPowerOnValley": 6.6,
            "contractedPowerOnFlat": 4.4
        }
    })
}

pub fn invoices() -> Value {
    json!([
        {"year": 2023, "month": 1, "totalAmount": 1500.0},
        {"year": 2023, "month": 6, "totalAmount": 2150.5}
    ])
}

pub fn chart() -> Value {
    json!({
        "series": [{
            "activeConsumption": [
                {"id": 0, "consumptionCategory": 0, "value": 5},
                {"id": 1, "consumptionCategory": 3, "value": 10},
                {"id": 2, "consumptionCategory": 0, "value": 312.5}
            ]
        }]
    })
}

pub fn last_reading() -> Value {
    json!({
        "readings": [
            {"tipoLecturaMGMI": "I1", "valor": "2.5"},
            {"tipoLecturaMGMI": "V1", "valor": "230"}
        ]
    })
}

/// Which optional branches of the pipeline the mocked server enables.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub peak_available:    bool,
    pub reading_supported: bool,
    pub reading_ready:     bool,
}

impl Default for Scenario {
    fn default() -> Self {
        Self { peak_available: true, reading_supported: true, reading_ready: true }
    }
}

/// Mount every endpoint of the account pipeline. Data endpoints require the bearer token.
pub async fn mount_pipeline(server: &MockServer, scenario: Scenario) {
    Mock::given(method("GET"))
        .and(path(api_path(&format!("v1/accounts/{}", ACCOUNT))))
        .and(header("Authorization", bearer().as_str()))
        .respond_with(ok(agreement()))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(api_path("v1/misc/behaviour")))
        .and(header("Authorization", bearer().as_str()))
        .respond_with(if scenario.peak_available { ok(json!(null)) } else { not_ok() })
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(api_path(&format!("v1/peak/{}", ACCOUNT))))
        .and(header("Authorization", bearer().as_str()))
        .respond_with(ok(json!({"peakTimeId": 2})))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(api_path(&format!("v1/invoices/{}/1/36", ACCOUNT))))
        .and(header("Authorization", bearer().as_str()))
        .respond_with(ok(invoices()))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(api_path(&format!("v1/chart/{}", ACCOUNT))))
        .and(header("Authorization", bearer().as_str()))
        .respond_with(ok(chart()))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(api_path("v1/device/readingRequest")))
        .and(header("Authorization", bearer().as_str()))
        .respond_with(if scenario.reading_supported { ok(json!(null)) } else { not_ok() })
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(api_path(&format!("v1/device/{}/lastReading/30", ACCOUNT))))
        .and(header("Authorization", bearer().as_str()))
        .respond_with(if scenario.reading_ready { ok(last_reading()) } else { not_ok() })
        .mount(server)
        .await;
}
