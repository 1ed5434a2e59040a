use crate::relay::RelayError;
use crate::storage::StorageError;
use crate::transport::TransportError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Relay error: {0}")]
    Relay(#[from] RelayError),
}

pub type BotResult<T> = Result<T, BotError>;
