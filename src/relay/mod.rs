//! Relay handoff for large files
//!
//! Files above the direct-size ceiling are passed to a secondary relay
//! process over the chat transport. Control messages share the channel
//! with ordinary chat and are recognised by their `#upload_` prefix.
//!
//! Key pieces:
//! - [`RelayMessage`]: typed envelope with a pure wire codec
//! - [`RelayCoordinator`]: intake side, correlates completions to requests
//! - [`RelayAgent`]: relay side, downloads forwarded payloads into storage

pub mod agent;
pub mod codec;
pub mod coordinator;
pub mod types;

pub use agent::{RelayAgent, RelayContext};
pub use codec::{is_relay_control, CONTROL_PREFIX};
pub use coordinator::{RelayCoordinator, RelayResolution};
pub use types::{PendingRelayRequest, ProtocolError, RelayError, RelayMessage, RelayResult};
