use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid file name: {0:?}")]
    InvalidName(String),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;
