//! Intake service
//!
//! Dispatches inbound chat events from the operator, the relay and anyone
//! else. Every entry point consults the injected [`AccessPolicy`].
//!
//! [`AccessPolicy`]: crate::config::AccessPolicy

pub mod error;
pub mod handler;
pub mod progress;

pub use error::{BotError, BotResult};
pub use handler::IntakeBot;
pub use progress::ChatProgress;
