//! Request dispatch with bearer token injection
//!
//! Joins the descriptor path onto the API base URL, attaches the stored
//! access token, applies the fixed timeout and sends. Responses come back
//! whatever their status; only transport failures are errors. The dispatcher
//! knows nothing about refresh; interception happens in `AuthClient`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use session_auth::{CredentialStore, join_url};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::request::{RequestDescriptor, bearer_value};

#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    store: Arc<CredentialStore>,
}

impl Dispatcher {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        store: Arc<CredentialStore>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
            store,
        }
    }

    /// Send one request.
    ///
    /// `Authorization` is overwritten with the stored access token when one
    /// exists; with no stored token the descriptor's headers go out as-is.
    #[instrument(skip_all, fields(request_id = %descriptor.id(), method = %descriptor.method, path = %descriptor.path))]
    pub async fn send(&self, descriptor: &RequestDescriptor) -> Result<reqwest::Response> {
        let url = join_url(&self.base_url, &descriptor.path);

        let mut headers = descriptor.headers.clone();
        if let Some(token) = self.store.access_token().await {
            headers.insert(AUTHORIZATION, bearer_value(&token)?);
        }

        let mut request = self
            .client
            .request(descriptor.method.clone(), &url)
            .headers(headers)
            .timeout(self.timeout);
        if let Some(body) = &descriptor.body {
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(|e| {
            warn!(error = %e, timeout = e.is_timeout(), "request failed before a response arrived");
            Error::from(e)
        })?;

        debug!(status = response.status().as_u16(), "response received");
        Ok(response)
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.store
    }
}
