//! Integration tests for the authentication lifecycle against a wiremock server:
//! - token acquisition and reuse
//! - failed-login bookkeeping and session reset
//! - SMS challenge and account listing

mod common;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ute_energy::handlers::ute::session::MAX_FAILED_LOGINS;
use ute_energy::{UteClient, UteError};

use common::*;

// =============================================================================
// Construction
// =============================================================================

#[test]
fn construction_validates_credentials() {
    assert!(UteClient::new(EMAIL, PHONE, Default::default()).is_ok());

    for (email, phone) in [("", PHONE), (EMAIL, "5989912345"), (EMAIL, "09899123456"), (EMAIL, "598991234567")] {
        let err = UteClient::new(email, phone, Default::default()).unwrap_err();
        assert!(matches!(err, UteError::CredentialsInvalid(_)), "{:?}/{:?} gave {:?}", email, phone, err);
    }
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn login_sends_credentials_with_mobile_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/token")))
        .and(header("X-Client-Type", "Android"))
        .and(header("User-Agent", "okhttp/3.8.1"))
        .and(header("Content-Type", "application/json; charset=utf-8"))
        .and(body_json(json!({"Email": EMAIL, "PhoneNumber": PHONE})))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKEN))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    assert!(client.login().await.unwrap());
    assert!(client.is_authenticated());
    assert_eq!(client.failed_logins(), 0);
    assert_eq!(client.session_generation(), Some(1));
}

#[tokio::test]
async fn login_is_idempotent_while_authenticated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/token")))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKEN))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    assert!(client.login().await.unwrap());
    assert!(client.login().await.unwrap());
    // expect(1) is verified when the server is dropped.
}

#[tokio::test]
async fn login_with_empty_token_is_a_counted_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/token")))
        .respond_with(ResponseTemplate::new(200).set_body_string(""))
        .mount(&server)
        .await;

    let mut client = client(&server);
    assert!(!client.login().await.unwrap());
    assert!(!client.is_authenticated());
    assert_eq!(client.failed_logins(), 1);
}

#[tokio::test]
async fn login_403_is_access_denied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/token")))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut client = client(&server);
    let err = client.login().await.unwrap_err();
    assert!(matches!(err, UteError::AccessDenied { status: 403 }));
    assert_eq!(client.failed_logins(), 1);
}

#[tokio::test]
async fn login_500_is_api_error_with_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/token")))
        .respond_with(ResponseTemplate::new(500).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let mut client = client(&server);
    match client.login().await.unwrap_err() {
        UteError::Api { status, reason, body } => {
            assert_eq!(status, 500);
            assert_eq!(reason, "Internal Server Error");
            assert_eq!(body, "maintenance");
        }
        other => panic!("expected Api error, got {:?}", other),
    }
}

#[tokio::test]
async fn eleventh_failed_login_resets_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/token")))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut client = client(&server);
    for attempt in 1..=MAX_FAILED_LOGINS {
        assert!(client.login().await.is_err());
        assert_eq!(client.failed_logins(), attempt);
        assert_eq!(client.session_generation(), Some(1), "no reset before the threshold");
    }

    assert!(client.login().await.is_err());
    assert_eq!(client.failed_logins(), MAX_FAILED_LOGINS + 1);
    assert_eq!(client.session_generation(), Some(2));

    // The counter survives the reset, so every further failure rebuilds the session again.
    assert!(client.login().await.is_err());
    assert_eq!(client.session_generation(), Some(3));
}

#[tokio::test]
async fn successful_login_clears_the_failure_counter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/token")))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(3)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_token(&server).await;

    let mut client = client(&server);
    for _ in 0..3 {
        assert!(client.login().await.is_err());
    }
    assert_eq!(client.failed_logins(), 3);

    assert!(client.login().await.unwrap());
    assert_eq!(client.failed_logins(), 0);
    assert_eq!(client.session_generation(), Some(1));
}

#[tokio::test]
async fn invalidated_token_triggers_a_new_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/token")))
        .respond_with(ResponseTemplate::new(200).set_body_string(TOKEN))
        .expect(2)
        .mount(&server)
        .await;

    let mut client = client(&server);
    assert!(client.login().await.unwrap());
    client.invalidate_token();
    assert!(!client.is_authenticated());
    assert!(client.login().await.unwrap());
}

// =============================================================================
// SMS challenge
// =============================================================================

#[tokio::test]
async fn request_auth_code_returns_raw_content() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/users/register")))
        .and(body_json(json!({
            "UserId": 0,
            "Name": EMAIL,
            "Email": EMAIL,
            "PhoneNumber": PHONE,
            "IsValidated": false,
            "IsBanned": false,
            "UniqueId": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": "SMS sent"})))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    client.login().await.unwrap();
    let content = client.request_auth_code().await.unwrap();
    assert_eq!(content["data"], "SMS sent");
}

#[tokio::test]
async fn validate_auth_code_needs_success_flag() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/users/validate")))
        .and(body_json(json!({"ValidationCode": "1234"})))
        .respond_with(ok(json!(null)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/users/validate")))
        .and(body_json(json!({"ValidationCode": "9999"})))
        .respond_with(not_ok())
        .mount(&server)
        .await;

    let mut client = client(&server);
    client.login().await.unwrap();
    assert!(client.validate_auth_code("1234").await.unwrap());
    assert!(!client.validate_auth_code("9999").await.unwrap());
}

#[tokio::test]
async fn validate_auth_code_403_is_access_denied() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/users/validate")))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let mut client = client(&server);
    let err = client.validate_auth_code("1234").await.unwrap_err();
    assert!(matches!(err, UteError::AccessDenied { status: 403 }));
}

#[tokio::test]
async fn request_auth_code_403_is_access_denied() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("POST"))
        .and(path(api_path("v1/users/register")))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    client.login().await.unwrap();
    let err = client.request_auth_code().await.unwrap_err();
    assert!(matches!(err, UteError::AccessDenied { status: 403 }));
}

// =============================================================================
// Accounts
// =============================================================================

#[tokio::test]
async fn request_accounts_lists_service_points() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path(api_path("v1/accounts")))
        .and(header("Authorization", bearer().as_str()))
        .respond_with(ok(json!([
            {"accountServicePointId": 123456, "servicePointAddress": "Av. 18 de Julio 1234", "accountId": "A-1"},
            {"accountServicePointId": "654321", "servicePointAddress": "Rambla 55", "accountId": 2}
        ])))
        .mount(&server)
        .await;

    let mut client = client(&server);
    client.login().await.unwrap();
    let accounts = client.request_accounts().await.unwrap();
    assert_eq!(accounts.len(), 2);
    assert_eq!(accounts[0].service_point_id, "123456");
    assert_eq!(accounts[0].address, "Av. 18 de Julio 1234");
    assert_eq!(accounts[1].account_id, "2");
}

#[tokio::test]
async fn empty_account_list_is_an_error() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path(api_path("v1/accounts")))
        .respond_with(ok(json!([])))
        .mount(&server)
        .await;

    let mut client = client(&server);
    client.login().await.unwrap();
    let err = client.request_accounts().await.unwrap_err();
    assert!(matches!(err, UteError::MalformedResponse(_)));
}

#[tokio::test]
async fn request_accounts_403_is_access_denied() {
    let server = MockServer::start().await;
    mount_token(&server).await;
    Mock::given(method("GET"))
        .and(path(api_path("v1/accounts")))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    client.login().await.unwrap();
    let err = client.request_accounts().await.unwrap_err();
    assert!(matches!(err, UteError::AccessDenied { status: 403 }));
}
