//! Connection multiplexer for a single duplex link.
//!
//! One background read loop demultiplexes the inbound stream into call
//! replies and pushed events, while any number of tasks issue calls and
//! notifications against the same connection.

mod client;
mod pending;
mod sink;

pub use client::{Connection, ConnectionState};
pub use sink::{CallbackSink, EventSink, SinkClosed};
