//! Single-flight access-token refresh
//!
//! The coordinator owns the refresh state machine:
//!
//! - `Idle` → a 401 arrives → the caller becomes the leader, flips the state to
//!   `Refreshing` and issues the one refresh call
//! - `Refreshing` → further 401s park a continuation in the `PendingQueue`
//!   instead of starting another refresh
//! - refresh settles → the queue is drained (resolve with the new token, or
//!   reject with the refresh error) and the state returns to `Idle` inside the
//!   same critical section, so no caller can enqueue after the drain
//!
//! The check-and-flip runs under a `std::sync::Mutex` that is never held
//! across an `.await`. If the leader's future is dropped mid-refresh, its
//! guard drains the queue with `RefreshAbandoned` so nobody waits forever.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use session_auth::CredentialStore;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::queue::PendingQueue;
use crate::request::RequestDescriptor;
use crate::session::SessionFailureHandler;

/// Observable refresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

impl RefreshPhase {
    /// Label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            RefreshPhase::Idle => "idle",
            RefreshPhase::Refreshing => "refreshing",
        }
    }
}

/// Invariant: `queue` is non-empty only while `in_flight` is true.
#[derive(Debug, Default)]
struct RefreshState {
    in_flight: bool,
    queue: PendingQueue,
}

/// What a caller does after the check-and-flip.
enum Role {
    Leader,
    Waiter(oneshot::Receiver<Result<String>>),
}

pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    http_client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    store: Arc<CredentialStore>,
    session: SessionFailureHandler,
}

impl RefreshCoordinator {
    /// `http_client` is used directly for the refresh call so it never passes
    /// back through 401 interception.
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        store: Arc<CredentialStore>,
        session: SessionFailureHandler,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::default()),
            http_client,
            base_url: base_url.into(),
            timeout,
            store,
            session,
        }
    }

    pub fn phase(&self) -> RefreshPhase {
        if self.lock().in_flight {
            RefreshPhase::Refreshing
        } else {
            RefreshPhase::Idle
        }
    }

    /// Number of callers parked behind the in-flight refresh.
    pub fn waiting(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn session(&self) -> &SessionFailureHandler {
        &self.session
    }

    /// Obtain a fresh access token for a request that just got a 401.
    ///
    /// Consumes the descriptor's single replay. The caller replays the
    /// request with the returned token; any error means the session is gone
    /// and the credentials have been cleared.
    pub async fn recover(&self, descriptor: &mut RequestDescriptor) -> Result<String> {
        let Some(refresh) = self.store.refresh_token().await else {
            warn!(request_id = %descriptor.id(), "authorization failed with no refresh token, ending session");
            metrics::counter!("auth_session_lost_total", "reason" => "no_refresh_token")
                .increment(1);
            if let Err(e) = self.store.clear().await {
                warn!(error = %e, "failed to clear credentials");
            }
            self.lose_session().await;
            return Err(Error::NoRefreshToken);
        };

        descriptor.mark_retried();

        match self.join_or_lead() {
            Role::Waiter(outcome) => {
                metrics::counter!("auth_refresh_waiters_total").increment(1);
                debug!(request_id = %descriptor.id(), "refresh in flight, waiting for it to settle");
                outcome.await.unwrap_or(Err(Error::RefreshAbandoned))
            }
            Role::Leader => self.lead_refresh(&refresh).await,
        }
    }

    /// Atomic check-and-flip: park behind an in-flight refresh, or start one.
    fn join_or_lead(&self) -> Role {
        let mut state = self.lock();
        if state.in_flight {
            let (tx, rx) = oneshot::channel();
            state.queue.enqueue(Box::new(move |outcome| {
                // Receiver gone means the waiting request was dropped
                let _ = tx.send(outcome);
            }));
            Role::Waiter(rx)
        } else {
            state.in_flight = true;
            Role::Leader
        }
    }

    async fn lead_refresh(&self, refresh: &str) -> Result<String> {
        let guard = InFlight {
            coordinator: self,
            settled: false,
        };
        info!("access token rejected, refreshing");

        let outcome = match session_auth::refresh_access_token(
            &self.http_client,
            &self.base_url,
            refresh,
            self.timeout,
        )
        .await
        {
            Ok(tokens) => {
                let access = tokens.access.expose().clone();
                let rotated = tokens.refresh.map(|r| r.expose().clone());
                self.store
                    .update(access.clone(), rotated)
                    .await
                    .map(|()| access)
                    .map_err(Error::Refresh)
            }
            Err(e) => Err(Error::Refresh(e)),
        };

        match outcome {
            Ok(access) => {
                let waiters = guard.resolve(&access);
                metrics::counter!("auth_refresh_total", "outcome" => "success").increment(1);
                info!(waiters, "token refresh succeeded");
                Ok(access)
            }
            Err(err) => {
                warn!(error = %err, "token refresh failed, ending session");
                if let Err(e) = self.store.clear().await {
                    warn!(error = %e, "failed to clear credentials");
                }
                let waiters = guard.reject(&err);
                metrics::counter!("auth_refresh_total", "outcome" => "failure").increment(1);
                metrics::counter!("auth_session_lost_total", "reason" => "refresh_failed")
                    .increment(1);
                debug!(waiters, "rejected parked requests");
                self.lose_session().await;
                Err(err)
            }
        }
    }

    async fn lose_session(&self) {
        let current = self.session.navigator().current_location();
        self.session.on_session_lost(&current).await;
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Leader's claim on the in-flight refresh. Settling drains the queue and
/// returns the state to idle; dropping it unsettled rejects the queue.
struct InFlight<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl InFlight<'_> {
    fn resolve(mut self, token: &str) -> usize {
        self.settled = true;
        let mut state = self.coordinator.lock();
        let count = state.queue.drain_and_resolve(token);
        state.in_flight = false;
        count
    }

    fn reject(mut self, error: &Error) -> usize {
        self.settled = true;
        let mut state = self.coordinator.lock();
        let count = state.queue.drain_and_reject(error);
        state.in_flight = false;
        count
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.coordinator.lock();
        let count = state.queue.drain_and_reject(&Error::RefreshAbandoned);
        state.in_flight = false;
        warn!(waiters = count, "refresh dropped before it settled");
    }
}
