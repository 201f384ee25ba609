//! Error types for mbg-core

use thiserror::Error;

/// Main error type for mbg-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to load authentication state: {0}")]
    CredentialLoad(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for mbg-core
pub type Result<T> = std::result::Result<T, Error>;
