//! Relay server errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to persist tracked wallets: {0}")]
    Persist(String),

    #[error("Server error: {0}")]
    Serve(String),
}
