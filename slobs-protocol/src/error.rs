//! Error type for envelope construction and classification.

use thiserror::Error;

/// Errors produced while building or classifying envelopes
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The inbound bytes are not well-formed JSON
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A non-event envelope carried no usable correlation id
    #[error("envelope carries no usable correlation id")]
    MissingId,

    /// A call was built with the id reserved for notifications
    #[error("correlation id 0 is reserved for notifications")]
    ReservedId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ProtocolError::ReservedId.to_string(),
            "correlation id 0 is reserved for notifications"
        );
        assert_eq!(
            ProtocolError::MissingId.to_string(),
            "envelope carries no usable correlation id"
        );
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let err: ProtocolError = json_err.into();
        assert!(matches!(err, ProtocolError::Malformed(_)));
        assert!(err.to_string().starts_with("malformed envelope"));
    }
}
