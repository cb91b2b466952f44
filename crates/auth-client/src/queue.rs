//! Pending-request queue
//!
//! Callers that hit a 401 while a refresh is already in flight park a
//! continuation here. When the refresh settles the coordinator drains the
//! queue exactly once, front to back, either resolving every caller with the
//! new access token or rejecting every caller with the same error.
//!
//! The queue has no locking of its own; the coordinator only touches it while
//! holding its refresh-state mutex.

use std::collections::VecDeque;
use std::fmt;

use crate::error::Error;

/// A suspended caller's continuation: `Ok(new_access_token)` resolves it,
/// `Err(refresh_error)` rejects it.
pub type PendingCaller = Box<dyn FnOnce(Result<String, Error>) + Send>;

#[derive(Default)]
pub struct PendingQueue {
    callers: VecDeque<PendingCaller>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, caller: PendingCaller) {
        self.callers.push_back(caller);
    }

    pub fn len(&self) -> usize {
        self.callers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callers.is_empty()
    }

    /// Resolve every parked caller with `token` in arrival order.
    ///
    /// Returns how many callers were resolved.
    pub fn drain_and_resolve(&mut self, token: &str) -> usize {
        let callers = std::mem::take(&mut self.callers);
        let count = callers.len();
        for caller in callers {
            caller(Ok(token.to_string()));
        }
        count
    }

    /// Reject every parked caller with a clone of `error` in arrival order.
    ///
    /// Returns how many callers were rejected.
    pub fn drain_and_reject(&mut self, error: &Error) -> usize {
        let callers = std::mem::take(&mut self.callers);
        let count = callers.len();
        for caller in callers {
            caller(Err(error.clone()));
        }
        count
    }
}

impl fmt::Debug for PendingQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingQueue")
            .field("len", &self.callers.len())
            .finish()
    }
}
