//! Relay envelope, pending entries and errors

use crate::storage::StorageError;
use crate::transport::{ChatId, MessageId, TransportError};
use std::time::Instant;
use thiserror::Error;

/// Result type for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Malformed relay control text
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Not a relay control message")]
    NotControl,

    #[error("Unknown relay message tag: {0}")]
    UnknownTag(String),

    #[error("Missing field in {tag}: {field}")]
    MissingField {
        tag: &'static str,
        field: &'static str,
    },

    #[error("Requester id is not numeric: {0:?}")]
    InvalidRequester(String),
}

/// Typed relay control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMessage {
    /// Intake asks the relay to fetch the payload that follows as a reply
    UploadRequest {
        requester: ChatId,
        file_name: String,
        /// Human-readable size, informational only
        size: Option<String>,
    },

    /// Relay stored the file under `file_name`
    UploadDone { requester: ChatId, file_name: String },

    /// Relay could not store the file
    UploadError { requester: ChatId, reason: String },
}

impl RelayMessage {
    pub fn requester(&self) -> ChatId {
        match self {
            RelayMessage::UploadRequest { requester, .. }
            | RelayMessage::UploadDone { requester, .. }
            | RelayMessage::UploadError { requester, .. } => *requester,
        }
    }
}

/// An in-flight handoff waiting for the relay's answer
#[derive(Debug, Clone)]
pub struct PendingRelayRequest {
    /// Id the transport assigned to the upload request message
    pub correlation: MessageId,

    /// Who gets notified when the relay answers
    pub requester: ChatId,

    pub file_name: String,

    pub size_bytes: u64,

    pub started_at: Instant,
}
