//! Common types shared by the household-ledger crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
