//! Authenticated HTTP client with transparent access-token refresh
//!
//! Every application call goes through `AuthClient::execute`, which hands the
//! request to the `Dispatcher` (attaches `Authorization: Bearer <access>`) and
//! intercepts a 401 response by asking the `RefreshCoordinator` for a fresh
//! token. The coordinator runs at most one refresh call at a time; callers
//! that hit a 401 while it is in flight are parked in the `PendingQueue` and
//! replayed with the new token once it settles.
//!
//! Request lifecycle:
//! 1. Dispatcher sends the request with the stored access token
//! 2. Non-401 response or transport error → returned to the caller untouched
//! 3. 401 on a request already replayed once → returned untouched
//! 4. 401, first time → coordinator refreshes (or waits for the in-flight
//!    refresh) and the request is replayed once with the new token
//! 5. No refresh token, or refresh failure → credentials cleared, the
//!    `SessionFailureHandler` redirects to the login entry point, and every
//!    affected caller gets the same error

pub mod client;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod request;
pub mod session;

pub use client::{AuthClient, ClientOptions};
pub use coordinator::{RefreshCoordinator, RefreshPhase};
pub use dispatcher::Dispatcher;
pub use error::{Error, Result, TransportError};
pub use queue::{PendingCaller, PendingQueue};
pub use request::RequestDescriptor;
pub use session::{NavigationPort, SessionFailureHandler, login_redirect_target};
