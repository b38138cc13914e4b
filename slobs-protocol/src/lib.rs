//! slobs-protocol: Wire envelope definitions for the Streamlabs Desktop API
//!
//! This crate defines the outbound request envelope, the classification that
//! splits inbound replies from pushed events, and the protocol error type.
//! It performs no I/O; the connection layer lives in `slobs-client`.

pub mod classify;
pub mod envelope;
pub mod error;

// Re-export main types at crate root
pub use classify::{classify, Inbound};
pub use envelope::{RequestParams, RpcRequest};
pub use error::ProtocolError;

/// JSON-RPC version stamped on every outbound envelope
pub const JSONRPC_VERSION: &str = "2.0";

/// Correlation id reserved for fire-and-forget notifications
pub const NO_REPLY_ID: u64 = 0;

/// Inner `_type` marker identifying pushed events
pub const EVENT_MARKER: &str = "EVENT";
