//! Droplink: push files into a private, time-limited download area
//! through a chat interface.
//!
//! Small files are stored directly by the intake service. Files above the
//! direct-size ceiling are handed to a relay process over the same chat
//! transport, and the relay's completion is correlated back to the
//! requester. A background scheduler evicts expired files and watches the
//! log file for runaway growth.

pub mod bot;
pub mod config;
pub mod messages;
pub mod metrics;
pub mod monitor;
pub mod relay;
pub mod routing;
pub mod scheduler;
pub mod storage;
pub mod telemetry;
pub mod transport;
