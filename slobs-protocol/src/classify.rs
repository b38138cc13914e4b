//! Inbound envelope classification.
//!
//! A single connection carries two kinds of traffic: replies to calls and
//! events pushed by the remote side. The two are not distinguished by their
//! outer shape but by the inner `result._type` marker, so classification
//! probes exactly the fields it needs and ignores everything else. Unknown
//! extra fields must never cause a message to be rejected.

use serde_json::Value;

use crate::error::ProtocolError;
use crate::{EVENT_MARKER, NO_REPLY_ID};

/// One classified inbound envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Unsolicited push from the remote side. The payload is the inner
    /// `result` object, forwarded verbatim.
    Event(Value),
    /// Successful reply to the call with this correlation id
    Reply { id: u64, result: Value },
    /// Remote-reported failure for the call with this correlation id
    Error { id: u64, message: String },
}

/// Classify one raw inbound message.
///
/// Probe order: the event marker first, then the correlation id, then
/// `error.message` before falling back to `result`. An event is an event
/// even when a top-level `id` happens to be present.
pub fn classify(raw: &[u8]) -> Result<Inbound, ProtocolError> {
    let mut envelope: Value = serde_json::from_slice(raw)?;

    let event = envelope
        .get_mut("result")
        .filter(|result| result.get("_type").and_then(Value::as_str) == Some(EVENT_MARKER))
        .map(Value::take);
    if let Some(payload) = event {
        return Ok(Inbound::Event(payload));
    }

    let id = envelope
        .get("id")
        .and_then(Value::as_u64)
        .filter(|&id| id != NO_REPLY_ID)
        .ok_or(ProtocolError::MissingId)?;

    // An `error` object without a string `message` is not treated as a
    // remote error; the envelope falls through to the result path.
    if let Some(message) = envelope.pointer("/error/message").and_then(Value::as_str) {
        return Ok(Inbound::Error {
            id,
            message: message.to_owned(),
        });
    }

    let result = envelope
        .get_mut("result")
        .map(Value::take)
        .unwrap_or(Value::Null);
    Ok(Inbound::Reply { id, result })
}
