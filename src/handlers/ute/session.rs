use log::{debug, error, info, warn};
use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::error::{Result, UteError};
use crate::handlers::ute::api::{
    ApiSession, BASE_URL, ENDPOINT_ACCOUNTS, ENDPOINT_REGISTER, ENDPOINT_TOKEN, ENDPOINT_VALIDATE, decode,
};
use crate::models::ute_models::{Account, RegisterRequest, TokenRequest, ValidateCodeRequest};

// --------------------------------------------------------------------------------------------------------------

pub const PHONE_LENGTH: usize = 11;
pub const PHONE_PREFIX: &str  = "598";

/// Consecutive failed logins tolerated before the HTTP session is thrown away and rebuilt.
pub const MAX_FAILED_LOGINS: u32 = 10;

/// Email must be non-empty; phone must be 11 characters starting with the Uruguayan prefix "598".
pub fn validate_credentials(email: &str, phone: &str) -> bool {
    !email.is_empty() && phone.chars().count() == PHONE_LENGTH && phone.starts_with(PHONE_PREFIX)
}

// --------------------------------------------------------------------------------------------------------------

#[derive(Clone)]
pub struct Credentials {
    email: String,
    phone: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, phone: impl Into<String>) -> Result<Self> {
        let email = email.into();
        let phone = phone.into();
        if !validate_credentials(&email, &phone) {
            return Err(UteError::CredentialsInvalid(format!(
                "email must not be empty and phone must be {} digits starting with {}",
                PHONE_LENGTH, PHONE_PREFIX
            )));
        }
        Ok(Self { email, phone })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }
}

// Keep the phone number out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("phone", &format!("{}********", PHONE_PREFIX))
            .finish()
    }
}

// --------------------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ReadingOptions {
    /// Polls of the last-reading endpoint before giving up on the live values.
    pub max_iterations: u32,
    /// Pause between two polls.
    pub sleep_interval: Duration,
    /// When set, live power is integrated over this interval into `energy`.
    pub sync_interval:  Option<Duration>,
}

impl Default for ReadingOptions {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            sleep_interval: Duration::from_secs(5),
            sync_interval:  None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    pub base_url: String,
    pub reading:  ReadingOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            reading:  ReadingOptions::default(),
        }
    }
}

// --------------------------------------------------------------------------------------------------------------

/// Client for one UTE user. Owns the HTTP session and the bearer token; the data retrieval
/// pipeline lives in `reader.rs`.
///
/// Session lifecycle: the session is opened lazily by the first call that needs it. A token makes it
/// authenticated. Every failed login clears the token; past `MAX_FAILED_LOGINS` consecutive failures the
/// session itself is rebuilt on each further failure. The counter only returns to zero on a successful login.
#[derive(Debug)]
pub struct UteClient {
    pub(crate) credentials: Credentials,
    pub(crate) options:     ClientOptions,
    pub(crate) session:     Option<ApiSession>,
    failed_logins:          u32,
    sessions_opened:        u64,
}

impl UteClient {
    pub fn new(email: impl Into<String>, phone: impl Into<String>, options: ClientOptions) -> Result<Self> {
        Ok(Self {
            credentials:     Credentials::new(email, phone)?,
            options,
            session:         None,
            failed_logins:   0,
            sessions_opened: 0,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.as_ref().and_then(ApiSession::token).is_some()
    }

    pub fn failed_logins(&self) -> u32 {
        self.failed_logins
    }

    /// Number of the current HTTP session, `None` before the first login attempt.
    pub fn session_generation(&self) -> Option<u64> {
        self.session.as_ref().map(ApiSession::generation)
    }

    /// Drop the token so that the next `login()` asks for a new one.
    pub fn invalidate_token(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.clear_token();
        }
    }

    fn open_session(&mut self) -> Result<ApiSession> {
        self.sessions_opened += 1;
        ApiSession::open(&self.options.base_url, self.sessions_opened)
    }

    fn reset_session(&mut self) -> Result<()> {
        let session = self.open_session()?;
        self.session = Some(session);
        Ok(())
    }

    /// The open session, or a fresh one when none exists yet.
    fn session_mut(&mut self) -> Result<&mut ApiSession> {
        let session = match self.session.take() {
            Some(session) => session,
            None          => self.open_session()?,
        };
        Ok(self.session.insert(session))
    }

    /// The open session for calls that only make sense after a login. Without one the call is
    /// reported as unauthorised, as the server would.
    pub(crate) fn session(&self) -> Result<&ApiSession> {
        self.session.as_ref().ok_or_else(|| {
            warn!("[UTE] No session yet - call login() first");
            UteError::AccessDenied { status: StatusCode::UNAUTHORIZED.as_u16() }
        })
    }

    // ----------------------------------------------------------------------------------------------------------

    /// Obtain a bearer token. Returns immediately while a token is held.
    ///
    /// `Ok(false)` means the server accepted the request but sent an empty token. Errors propagate after
    /// the failure has been counted.
    pub async fn login(&mut self) -> Result<bool> {
        if self.is_authenticated() {
            return Ok(true);
        }

        debug!("[UTE] Logging in with email {}", self.credentials.email);

        match self.login_request().await {
            Ok(true) => {
                self.failed_logins = 0;
                info!("[UTE] Login successful");
                Ok(true)
            }
            Ok(false) => {
                self.record_failed_login();
                warn!("[UTE] Login returned an empty token (attempt {})", self.failed_logins);
                Ok(false)
            }
            Err(e) => {
                self.record_failed_login();
                info!("[UTE] Error logging on to the UTE API ({}): {}", self.failed_logins, e);
                Err(e)
            }
        }
    }

    async fn login_request(&mut self) -> Result<bool> {
        let credentials = self.credentials.clone();
        let session = self.session_mut()?;

        let payload = TokenRequest { email: credentials.email(), phone_number: credentials.phone() };
        let response = session.post(ENDPOINT_TOKEN, &payload).await?;

        let body  = response.text().await?;
        let token = body.trim().trim_matches('"');
        if token.is_empty() {
            return Ok(false);
        }

        debug!("[UTE] Service token received ({} chars)", token.len());
        session.set_token(token.to_string());
        Ok(true)
    }

    fn record_failed_login(&mut self) {
        self.failed_logins += 1;
        self.invalidate_token();
        if self.failed_logins > MAX_FAILED_LOGINS {
            info!("[UTE] Repeated errors logging on to the UTE API. Resetting the HTTP session");
            if let Err(e) = self.reset_session() {
                error!("[UTE] Could not rebuild the HTTP session: {}", e);
            }
        }
    }

    // ----------------------------------------------------------------------------------------------------------

    /// Ask UTE to send an SMS verification code to the user's phone. Returns the raw response body.
    pub async fn request_auth_code(&mut self) -> Result<Value> {
        let credentials = self.credentials.clone();
        let session = self.session_mut()?;

        let payload = RegisterRequest {
            user_id:      0,
            name:         credentials.email(),
            email:        credentials.email(),
            phone_number: credentials.phone(),
            is_validated: false,
            is_banned:    false,
            unique_id:    None,
        };
        let response = session.post(ENDPOINT_REGISTER, &payload).await?;
        let content: Value = decode(response, ENDPOINT_REGISTER).await?;
        debug!("[UTE] Auth code requested, response: {}", content);
        Ok(content)
    }

    /// Submit the SMS code. Only a 200 response with `success: true` validates it.
    pub async fn validate_auth_code(&mut self, code: &str) -> Result<bool> {
        let session = self.session_mut()?;
        let response = session
            .post_json::<_, Value>(ENDPOINT_VALIDATE, &ValidateCodeRequest { validation_code: code })
            .await?;

        if response.success {
            info!("[UTE] Auth code validated");
        } else {
            warn!("[UTE] Auth code rejected: {}", response.error_text());
        }
        Ok(response.success)
    }

    /// All service points of the user. An absent or empty list is an error.
    pub async fn request_accounts(&self) -> Result<Vec<Account>> {
        let response = self.session()?.get_json::<Vec<Account>>(ENDPOINT_ACCOUNTS).await?;
        let accounts = response.data.unwrap_or_default();
        if accounts.is_empty() {
            return Err(UteError::malformed("account list is absent or empty"));
        }
        for (i, account) in accounts.iter().enumerate() {
            debug!("[UTE] Account #{}: {} ({})", i + 1, account.service_point_id, account.address);
        }
        Ok(accounts)
    }
}

// --------------------------------------------------------------------------------------------------------------
