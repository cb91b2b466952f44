//! Session loss handling
//!
//! When the session cannot be recovered (no refresh token, or the refresh
//! call failed) the user has to sign in again. The handler drops any residual
//! access token and sends the user to the login entry point, carrying the
//! location they were on as a `redirect` return target.
//!
//! Navigation is behind `NavigationPort` so front ends decide what a redirect
//! means (browser location, terminal hint, recorded stub in tests).

use std::sync::Arc;

use session_auth::{CredentialStore, REDIRECT_PARAM};
use tracing::{debug, info, warn};

/// Navigation facility consumed on session loss.
pub trait NavigationPort: Send + Sync {
    /// Current location as path plus optional query, e.g. `/lancamentos?mes=3`.
    fn current_location(&self) -> String;

    /// Move to `target` (a path with query string).
    fn redirect(&self, target: &str);
}

pub struct SessionFailureHandler {
    store: Arc<CredentialStore>,
    navigator: Arc<dyn NavigationPort>,
    login_path: String,
}

impl SessionFailureHandler {
    pub fn new(
        store: Arc<CredentialStore>,
        navigator: Arc<dyn NavigationPort>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            store,
            navigator,
            login_path: login_path.into(),
        }
    }

    /// End the session seen from `current_path`.
    ///
    /// Idempotent: once on the login entry point the redirect is skipped, so
    /// repeated calls never loop. Returns whether a redirect was issued.
    pub async fn on_session_lost(&self, current_path: &str) -> bool {
        if let Err(e) = self.store.clear_access().await {
            warn!(error = %e, "failed to remove access token on session loss");
        }

        if is_login_location(current_path, &self.login_path) {
            debug!(current_path, "already on login entry point, skipping redirect");
            return false;
        }

        let target = login_redirect_target(&self.login_path, current_path);
        info!(%target, "session lost, redirecting to login");
        self.navigator.redirect(&target);
        true
    }

    pub fn navigator(&self) -> &Arc<dyn NavigationPort> {
        &self.navigator
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }
}

/// `<login_path>?redirect=<percent-encoded current location>`
pub fn login_redirect_target(login_path: &str, current_location: &str) -> String {
    format!(
        "{login_path}?{REDIRECT_PARAM}={}",
        urlencoding::encode(current_location)
    )
}

fn is_login_location(current_location: &str, login_path: &str) -> bool {
    let path = current_location
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let login = login_path.trim_end_matches('/');
    path == login || path.starts_with(&format!("{login}/"))
}
