//! Error types for credential and token endpoint operations

/// Errors from credential storage and token endpoint calls.
///
/// Variants carry rendered messages rather than source errors so the type is
/// `Clone`: a single refresh failure is delivered to every parked caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for session-auth operations.
pub type Result<T> = std::result::Result<T, Error>;
