//! slobs-client: connection multiplexer for the Streamlabs Desktop API
//!
//! Drives one persistent duplex connection to a Streamlabs Desktop
//! instance. Any number of tasks share the connection: requests carry
//! monotonically assigned correlation ids, a single background read loop
//! routes each reply to the caller that issued it, and pushed events are
//! handed to an optional listener. The byte transport is pluggable
//! through the [`Transport`] trait.

pub mod connection;
pub mod error;
pub mod transport;

// Re-export main types at crate root
pub use connection::{CallbackSink, Connection, ConnectionState, EventSink, SinkClosed};
pub use error::{ClientError, Result};
pub use transport::{Transport, TransportError, TransportRx, TransportTx};
