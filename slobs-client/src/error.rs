//! Error types for the connection layer.

use thiserror::Error;

use crate::transport::TransportError;
use slobs_protocol::ProtocolError;

/// Main error type for connection operations
#[derive(Debug, Error)]
pub enum ClientError {
    // === Connection Errors ===

    /// Write or read failure on the underlying transport
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The connection is closed; the payload describes why
    #[error("connection closed ({0})")]
    Closed(String),

    // === Per-call Errors ===

    /// The remote side rejected the call
    #[error("remote error: {0}")]
    Remote(String),

    /// Envelope construction or classification failed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    // === Usage Errors ===

    /// `listen_events` was called more than once on this connection
    #[error("event listener already registered")]
    AlreadyListening,
}

/// Result type alias using ClientError
pub type Result<T> = std::result::Result<T, ClientError>;
