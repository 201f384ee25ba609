//! Error types for mbg-session

use thiserror::Error;

/// Main error type for mbg-session
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] mbg_core::Error),
}

/// Result type alias for mbg-session
pub type Result<T> = std::result::Result<T, Error>;
