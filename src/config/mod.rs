//! Process-wide configuration
//!
//! Thresholds and identities are loaded once at startup and never mutated
//! afterwards. The allow-list is exposed as an [`AccessPolicy`] value that
//! every entry point receives explicitly.

mod error;
mod types;

pub use error::{ConfigError, ConfigResult};
pub use types::{AccessPolicy, Principal, Settings};
