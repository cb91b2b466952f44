//! Token endpoint calls
//!
//! Two JSON interactions with the backend's JWT views:
//! 1. `token/`: obtain an access/refresh pair from username + password
//! 2. `token/refresh/`: exchange the refresh token for a new access token
//!
//! Both go straight through the given `reqwest::Client`, never through the
//! intercepting dispatcher, so a failing refresh cannot recurse into itself.

use std::time::Duration;

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{TOKEN_OBTAIN_PATH, TOKEN_REFRESH_PATH};
use crate::endpoint::join_url;
use crate::error::{Error, Result};

/// Response from `token/refresh/`.
///
/// `refresh` is only present when the backend rotates refresh tokens.
#[derive(Debug, Deserialize, Serialize)]
pub struct RefreshResponse {
    pub access: Secret<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<Secret<String>>,
}

/// Response from `token/`.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenPair {
    pub access: Secret<String>,
    pub refresh: Secret<String>,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Serialize)]
struct ObtainRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Exchange a refresh token for a new access token.
///
/// Any non-2xx status, transport failure or timeout is an error; the caller
/// treats every error as a refresh failure and does not retry.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
    timeout: Duration,
) -> Result<RefreshResponse> {
    let url = join_url(base_url, TOKEN_REFRESH_PATH);
    debug!(%url, "requesting token refresh");

    let response = client
        .post(&url)
        .json(&RefreshRequest { refresh })
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<RefreshResponse>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("invalid refresh response: {e}")))
}

/// Obtain a token pair with username and password.
pub async fn obtain_token_pair(
    client: &reqwest::Client,
    base_url: &str,
    username: &str,
    password: &str,
    timeout: Duration,
) -> Result<TokenPair> {
    let url = join_url(base_url, TOKEN_OBTAIN_PATH);
    debug!(%url, username, "requesting token pair");

    let response = client
        .post(&url)
        .json(&ObtainRequest { username, password })
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenPair>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("invalid token response: {e}")))
}
