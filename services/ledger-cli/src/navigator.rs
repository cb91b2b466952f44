//! Terminal stand-in for browser navigation
//!
//! A CLI has no address bar, so the "current location" is the API path the
//! running command is working on. A redirect to the login entry point is
//! surfaced to the user as a hint on stderr.

use std::sync::Mutex;

use auth_client::NavigationPort;
use tracing::warn;

pub struct TerminalNavigator {
    location: Mutex<String>,
}

impl TerminalNavigator {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: Mutex::new(location.into()),
        }
    }

    /// Record the path the current command is about to work on.
    pub fn visit(&self, location: impl Into<String>) {
        *self.lock() = location.into();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, String> {
        self.location
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl NavigationPort for TerminalNavigator {
    fn current_location(&self) -> String {
        self.lock().clone()
    }

    fn redirect(&self, target: &str) {
        warn!(%target, "session expired");
        eprintln!("session expired, sign in again with `ledger login <username>` ({target})");
        *self.lock() = target.to_string();
    }
}

/// Map an API path to the location shown to the user, always rooted at `/`.
pub fn location_for(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_follows_visits_and_redirects() {
        let nav = TerminalNavigator::new("/");
        nav.visit(location_for("grupos/meu/"));
        assert_eq!(nav.current_location(), "/grupos/meu/");

        nav.redirect("/login?redirect=%2Fgrupos%2Fmeu%2F");
        assert_eq!(nav.current_location(), "/login?redirect=%2Fgrupos%2Fmeu%2F");
    }

    #[test]
    fn location_is_rooted() {
        assert_eq!(location_for("users/me/"), "/users/me/");
        assert_eq!(location_for("/moradores/"), "/moradores/");
        assert_eq!(location_for(""), "/");
    }
}
