//! Authenticated client façade
//!
//! Wires the dispatcher, the refresh coordinator and the session failure
//! handler around one credential store, and applies the 401 interception
//! rule to every call.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use session_auth::{
    CredentialPair, CredentialStore, DEFAULT_API_BASE_URL, DEFAULT_LOGIN_PATH, DEFAULT_TIMEOUT,
};
use tracing::{debug, info, instrument};

use crate::coordinator::{RefreshCoordinator, RefreshPhase};
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::request::RequestDescriptor;
use crate::session::{NavigationPort, SessionFailureHandler};

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    /// Applies to ordinary requests and to the refresh call alike.
    pub timeout: Duration,
    pub login_path: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
        }
    }
}

/// Cheap to clone; clones share the credential store and refresh state.
#[derive(Clone)]
pub struct AuthClient {
    dispatcher: Dispatcher,
    coordinator: Arc<RefreshCoordinator>,
}

impl AuthClient {
    pub fn new(
        options: ClientOptions,
        store: Arc<CredentialStore>,
        navigator: Arc<dyn NavigationPort>,
    ) -> Self {
        Self::with_http_client(reqwest::Client::new(), options, store, navigator)
    }

    pub fn with_http_client(
        http_client: reqwest::Client,
        options: ClientOptions,
        store: Arc<CredentialStore>,
        navigator: Arc<dyn NavigationPort>,
    ) -> Self {
        let session = SessionFailureHandler::new(store.clone(), navigator, options.login_path);
        let coordinator = RefreshCoordinator::new(
            http_client.clone(),
            options.base_url.clone(),
            options.timeout,
            store.clone(),
            session,
        );
        let dispatcher = Dispatcher::new(http_client, options.base_url, options.timeout, store);
        Self {
            dispatcher,
            coordinator: Arc::new(coordinator),
        }
    }

    /// Send a request, recovering once from an expired access token.
    ///
    /// Any status other than a first 401 is returned as-is, including a 401
    /// on the replay. Transport errors are never retried.
    #[instrument(skip_all, fields(request_id = %descriptor.id(), method = %descriptor.method, path = %descriptor.path))]
    pub async fn execute(&self, mut descriptor: RequestDescriptor) -> Result<reqwest::Response> {
        let response = self.dispatcher.send(&descriptor).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        if descriptor.already_retried() {
            debug!("authorization failed again after refresh, passing through");
            return Ok(response);
        }
        drop(response);

        let token = self.coordinator.recover(&mut descriptor).await?;
        descriptor.set_bearer(&token)?;
        debug!("replaying request with refreshed token");
        self.dispatcher.send(&descriptor).await
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        self.execute(RequestDescriptor::get(path)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        self.execute(RequestDescriptor::post(path).json(body)?)
            .await
    }

    /// GET and decode a JSON body; non-2xx becomes `Error::Status`.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.get(path).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Decode(e.to_string()))
    }

    /// Exchange username and password for a fresh credential pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let pair = session_auth::obtain_token_pair(
            self.dispatcher.http_client(),
            self.dispatcher.base_url(),
            username,
            password,
            self.dispatcher.timeout(),
        )
        .await
        .map_err(Error::Login)?;

        self.store()
            .set(CredentialPair {
                access_token: Some(pair.access),
                refresh_token: Some(pair.refresh),
            })
            .await
            .map_err(Error::Credential)?;
        info!(username, "logged in");
        Ok(())
    }

    /// Drop both tokens.
    pub async fn logout(&self) -> Result<()> {
        self.store().clear().await.map_err(Error::Credential)?;
        info!("logged out");
        Ok(())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.store().access_token().await.is_some()
    }

    pub fn phase(&self) -> RefreshPhase {
        self.coordinator.phase()
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        self.dispatcher.credential_store()
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }
}
