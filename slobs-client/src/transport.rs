//! Transport seam between the connection and the outside world.
//!
//! The connection never opens sockets itself. It consumes an established
//! duplex transport, split into a write half and a read half so that
//! concurrent writers and the single read loop can own their directions
//! independently. Message framing and byte-level encoding belong to the
//! transport implementation; this layer hands it structured envelopes and
//! receives raw messages back.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use slobs_protocol::RpcRequest;

/// Failure on the underlying duplex connection
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection ended, cleanly or because the peer went away
    #[error("connection closed")]
    Closed,

    /// I/O failure while reading or writing
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write half of a duplex transport.
#[async_trait]
pub trait TransportTx: Send {
    /// Serialize and write one envelope as a single wire message.
    async fn write(&mut self, envelope: &RpcRequest) -> Result<(), TransportError>;

    /// Close the underlying connection.
    ///
    /// After this returns, pending and future [`TransportRx::read_one`]
    /// calls on the paired read half must resolve with
    /// [`TransportError::Closed`] once buffered messages run out.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Read half of a duplex transport.
#[async_trait]
pub trait TransportRx: Send {
    /// Read the next complete raw message.
    ///
    /// Returns [`TransportError::Closed`] once the stream ends.
    async fn read_one(&mut self) -> Result<Bytes, TransportError>;
}

/// An established duplex transport, ready to be split into its two halves
pub trait Transport {
    type Tx: TransportTx + 'static;
    type Rx: TransportRx + 'static;

    fn split(self) -> (Self::Tx, Self::Rx);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(TransportError::Closed.to_string(), "connection closed");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
        let err: TransportError = io_err.into();
        assert!(matches!(err, TransportError::Io(_)));
        assert_eq!(err.to_string(), "transport I/O error: broken pipe");
    }
}
