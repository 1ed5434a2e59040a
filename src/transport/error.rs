use crate::transport::types::ChatId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Unknown recipient: {0}")]
    UnknownRecipient(ChatId),

    #[error("Mailbox closed: {0}")]
    Closed(ChatId),

    #[error("Payload not found: {0}")]
    PayloadNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;
