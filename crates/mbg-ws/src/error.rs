//! Error types for mbg-ws

use thiserror::Error;

/// Main error type for mbg-ws
#[derive(Error, Debug)]
pub enum WsError {
    #[error(transparent)]
    Core(#[from] mbg_core::Error),

    #[error(transparent)]
    Session(#[from] mbg_session::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for mbg-ws
pub type Result<T> = std::result::Result<T, WsError>;
