//! Session credentials for the household-ledger API
//!
//! Owns the persistent credential pair (access + refresh token) and the two
//! token endpoint interactions the backend exposes. This crate knows nothing
//! about request interception; the refresh protocol lives in `auth-client`.
//!
//! Credential flow:
//! 1. `token::obtain_token_pair()` exchanges username/password for a pair
//! 2. Pair stored via `credentials::CredentialStore::set()`
//! 3. On an expired access token, `token::refresh_access_token()` is called
//!    exactly once per refresh cycle by the coordinator
//! 4. Result saved via `credentials::CredentialStore::update()`, or the store
//!    is cleared on session loss

pub mod constants;
pub mod credentials;
pub mod endpoint;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialPair, CredentialStore};
pub use endpoint::join_url;
pub use error::{Error, Result};
pub use token::{RefreshResponse, TokenPair, obtain_token_pair, refresh_access_token};
