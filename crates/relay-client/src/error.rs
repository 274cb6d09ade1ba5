//! Client errors.
//!
//! `Clone` so cached failures can be replayed to every caller.

use relay_types::DispatchType;
use std::time::Duration;
use thiserror::Error;

/// Message used when a request is issued without a live connection.
pub const NOT_CONNECTED: &str = "Not connected.";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Error carried in a response payload (raised in `throw_error` mode).
    #[error("{0}")]
    Remote(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection left the connected state while the request was in flight.
    #[error("connection lost before a response arrived")]
    Disconnected,

    #[error("{}", NOT_CONNECTED)]
    NotConnected,

    /// An identical request is already in flight.
    #[error("identical request already in flight")]
    Duplicate,

    #[error("{0} is not a request type")]
    NotARequest(DispatchType),

    #[error("codec error: {0}")]
    Codec(String),

    /// Listener removed before the response arrived.
    #[error("client closed")]
    Closed,
}

impl From<relay_types::CodecError> for ClientError {
    fn from(e: relay_types::CodecError) -> Self {
        ClientError::Codec(e.to_string())
    }
}
