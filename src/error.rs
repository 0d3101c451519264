use thiserror::Error;

// --------------------------------------------------------------------------------------------------------------

/// Every failure the UTE client can report. The set is closed: callers match on it to decide
/// between re-authentication (`AccessDenied`), waiting for the next tick (`Api`, `Transport`)
/// and giving up on the call (`CredentialsInvalid`, `MalformedResponse`).
#[derive(Debug, Error)]
pub enum UteError {
    /// Local validation of email/phone failed. No request was sent.
    #[error("invalid credentials: {0}")]
    CredentialsInvalid(String),

    /// HTTP 401 or 403 from any endpoint.
    #[error("access denied by the UTE API (HTTP {status})")]
    AccessDenied { status: u16 },

    /// Any other non-200 status.
    #[error("UTE API request failed (HTTP {status} {reason}): {body}")]
    Api {
        status: u16,
        reason: String,
        body:   String,
    },

    /// A 200 response without the fields we need, or with a body that is not valid JSON.
    #[error("malformed UTE API response: {0}")]
    MalformedResponse(String),

    /// Connection, TLS or timeout failure before any HTTP status was received.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl UteError {
    /// Errors worth retrying on the next scheduled refresh.
    pub fn is_transient(&self) -> bool {
        matches!(self, UteError::Api { .. } | UteError::Transport(_))
    }

    pub fn malformed(what: impl Into<String>) -> Self {
        UteError::MalformedResponse(what.into())
    }
}

pub type Result<T, E = UteError> = std::result::Result<T, E>;

// --------------------------------------------------------------------------------------------------------------
