use log::{debug, trace, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, AUTHORIZATION, CONNECTION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, UteError};
use crate::models::ute_models::ApiResponse;

// --------------------------------------------------------------------------------------------------------------
// UTE mobile-app API ("rocme") - undocumented, reverse engineered from the Android app.
//
// Auth:  POST v1/token            body {"Email", "PhoneNumber"}  -> bare token text
//        POST v1/users/register   starts the SMS challenge
//        POST v1/users/validate   body {"ValidationCode"}
// Data:  every other endpoint answers {"success": bool, "data": ..., "errors": [...]}
// --------------------------------------------------------------------------------------------------------------

pub const BASE_URL:   &str = "https://rocme.ute.com.uy/api";
pub const TOKEN_TYPE: &str = "Bearer";

pub const ENDPOINT_TOKEN:           &str = "v1/token";
pub const ENDPOINT_REGISTER:        &str = "v1/users/register";
pub const ENDPOINT_VALIDATE:        &str = "v1/users/validate";
pub const ENDPOINT_ACCOUNTS:        &str = "v1/accounts";
pub const ENDPOINT_BEHAVIOUR:       &str = "v1/misc/behaviour";
pub const ENDPOINT_READING_REQUEST: &str = "v1/device/readingRequest";

pub fn account_endpoint(account_id: &str) -> String {
    format!("{}/{}", ENDPOINT_ACCOUNTS, account_id)
}

pub fn peak_endpoint(account_id: &str) -> String {
    format!("v1/peak/{}", account_id)
}

/// Invoices of the last 36 months, first page.
pub fn invoices_endpoint(account_id: &str) -> String {
    format!("v1/invoices/{}/1/36", account_id)
}

pub fn chart_endpoint(account_id: &str) -> String {
    format!("v1/chart/{}", account_id)
}

/// Readings of the last 30 minutes.
pub fn last_reading_endpoint(account_id: &str) -> String {
    format!("v1/device/{}/lastReading/30", account_id)
}

// --------------------------------------------------------------------------------------------------------------
// Fixed header set of the Android app. `Host` is derived from the URL by reqwest.

const CLIENT_TYPE_HEADER: &str = "x-client-type";
const CLIENT_TYPE:        &str = "Android";
const USER_AGENT:         &str = "okhttp/3.8.1";
const CONTENT_TYPE_JSON:  &str = "application/json; charset=utf-8";

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(CLIENT_TYPE_HEADER), HeaderValue::from_static(CLIENT_TYPE));
    headers.insert(CONTENT_TYPE,    HeaderValue::from_static(CONTENT_TYPE_JSON));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
    headers.insert(CONNECTION,      HeaderValue::from_static("keep-alive"));
    headers.insert(ACCEPT,          HeaderValue::from_static("*/*"));
    headers
}

// --------------------------------------------------------------------------------------------------------------

/// One transport handle plus the bearer token obtained on it.
/// `generation` numbers the handles created by a client so that a reset is observable.
#[derive(Debug)]
pub struct ApiSession {
    client:     Client,
    base_url:   String,
    generation: u64,
    token:      Option<String>,
}

impl ApiSession {
    pub fn open(base_url: &str, generation: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(default_headers())
            .build()?;
        debug!("[UTE] Opened HTTP session #{} to {}", generation, base_url);
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            generation,
            token: None,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    pub fn clear_token(&mut self) {
        self.token = None;
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("{} {}", TOKEN_TYPE, token)),
            None        => request,
        }
    }

    /// GET `path`; anything but HTTP 200 is turned into an error.
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = self.url(path);
        debug!("[UTE] GET {}", url);
        let response = self.authorize(self.client.get(&url)).send().await?;
        check_status(response, path).await
    }

    /// POST `body` as JSON to `path`; anything but HTTP 200 is turned into an error.
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Response> {
        let url = self.url(path);
        debug!("[UTE] POST {}", url);
        let request = self.client
            .post(&url)
            .header(CONTENT_TYPE, CONTENT_TYPE_JSON)
            .json(body);
        let response = self.authorize(request).send().await?;
        check_status(response, path).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>> {
        let response = self.get(path).await?;
        decode(response, path).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<ApiResponse<T>> {
        let response = self.post(path, body).await?;
        decode(response, path).await
    }
}

// --------------------------------------------------------------------------------------------------------------

/// 200 passes, 401/403 means access denied, everything else is a generic API failure.
async fn check_status(response: Response, path: &str) -> Result<Response> {
    let status = response.status();
    match status {
        StatusCode::OK => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!("[UTE] Access denied on '{}' (HTTP {})", path, status.as_u16());
            Err(UteError::AccessDenied { status: status.as_u16() })
        }
        _ => {
            let reason = status.canonical_reason().unwrap_or_default().to_string();
            let body   = response.text().await.unwrap_or_default();
            debug!(
                "[UTE] '{}' returned status '{}', reason: {}, content: {}",
                path, status.as_u16(), reason, body
            );
            Err(UteError::Api { status: status.as_u16(), reason, body })
        }
    }
}

/// Read the body as text first so it can be traced, then parse it.
pub async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T> {
    let body = response.text().await?;
    trace!("[UTE] '{}' response: {}", path, body);
    serde_json::from_str(&body)
        .map_err(|e| UteError::malformed(format!("'{}': {}", path, e)))
}

// --------------------------------------------------------------------------------------------------------------
