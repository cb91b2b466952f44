//! Error types for authenticated requests

use std::fmt;
use std::sync::Arc;

/// Errors surfaced to callers of the authenticated client.
///
/// `Clone` because a refresh failure is delivered to every caller that was
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    #[error("authorization failed and no refresh token is available")]
    NoRefreshToken,

    #[error("token refresh failed: {0}")]
    Refresh(session_auth::Error),

    #[error("token refresh abandoned before it settled")]
    RefreshAbandoned,

    #[error("login failed: {0}")]
    Login(session_auth::Error),

    #[error("credential store error: {0}")]
    Credential(session_auth::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl Error {
    /// Whether this error ended the session: credentials were cleared and
    /// the user was sent to the login entry point.
    ///
    /// `RefreshAbandoned` is not session loss; the stored credentials are
    /// left as they were.
    pub fn is_session_loss(&self) -> bool {
        matches!(self, Error::NoRefreshToken | Error::Refresh(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(TransportError(Arc::new(e)))
    }
}

/// A request that failed before any response arrived.
///
/// Keeps the typed `reqwest::Error` behind an `Arc` so `Error` stays
/// `Clone`. Two values are equal only when they share the same failure.
#[derive(Debug, Clone)]
pub struct TransportError(Arc<reqwest::Error>);

impl TransportError {
    pub fn inner(&self) -> &reqwest::Error {
        &self.0
    }

    pub fn is_timeout(&self) -> bool {
        self.0.is_timeout()
    }

    pub fn is_connect(&self) -> bool {
        self.0.is_connect()
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(self.0.as_ref())
    }
}

impl PartialEq for TransportError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TransportError {}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
