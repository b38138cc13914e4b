//! Outbound request envelopes.
//!
//! Every remote invocation, whether it expects a reply or not, is one
//! [`RpcRequest`] serialized as a single JSON object. Calls carry a
//! strictly-positive correlation id; notifications carry [`NO_REPLY_ID`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::{JSONRPC_VERSION, NO_REPLY_ID};

/// One outbound call or notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Always [`JSONRPC_VERSION`]
    pub jsonrpc: String,
    /// Correlation id; [`NO_REPLY_ID`] means no reply is expected
    pub id: u64,
    /// Remote operation name
    pub method: String,
    pub params: RequestParams,
}

/// Target of a request: the resource it addresses plus its arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    /// Opaque resource identifier; never interpreted by this layer
    pub resource: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    /// Wire hint asking the remote side for an abbreviated result encoding
    #[serde(rename = "compactMode", default, skip_serializing_if = "is_false")]
    pub compact: bool,
}

fn is_false(flag: &bool) -> bool {
    !flag
}

impl RpcRequest {
    /// Build a call envelope expecting a reply under `id`.
    ///
    /// Fails if `id` is [`NO_REPLY_ID`], which would make the reply
    /// unroutable.
    pub fn call(
        id: u64,
        method: impl Into<String>,
        resource: impl Into<String>,
        args: Vec<Value>,
        compact: bool,
    ) -> Result<Self, ProtocolError> {
        if id == NO_REPLY_ID {
            return Err(ProtocolError::ReservedId);
        }
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            method: method.into(),
            params: RequestParams {
                resource: resource.into(),
                args,
                compact,
            },
        })
    }

    /// Build a fire-and-forget notification envelope.
    pub fn notify(
        method: impl Into<String>,
        resource: impl Into<String>,
        args: Vec<Value>,
    ) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id: NO_REPLY_ID,
            method: method.into(),
            params: RequestParams {
                resource: resource.into(),
                args,
                compact: false,
            },
        }
    }

    /// True when this envelope expects no reply
    pub fn is_notification(&self) -> bool {
        self.id == NO_REPLY_ID
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_wire_shape() {
        let req = RpcRequest::call(
            4,
            "getModel",
            "ScenesService",
            vec![json!("scene-id")],
            false,
        )
        .unwrap();
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(
            wire,
            json!({
                "jsonrpc": "2.0",
                "id": 4,
                "method": "getModel",
                "params": {
                    "resource": "ScenesService",
                    "args": ["scene-id"]
                }
            })
        );
    }

    #[test]
    fn test_compact_mode_serialized_when_set() {
        let req = RpcRequest::call(9, "getSources", "SourcesService", vec![], true).unwrap();
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["params"]["compactMode"], json!(true));
    }

    #[test]
    fn test_compact_mode_omitted_when_false() {
        let req = RpcRequest::call(9, "getSources", "SourcesService", vec![], false).unwrap();
        let wire = serde_json::to_value(&req).unwrap();
        assert!(wire["params"].get("compactMode").is_none());
    }

    #[test]
    fn test_empty_args_omitted() {
        let req = RpcRequest::call(2, "getModel", "ScenesService", vec![], false).unwrap();
        let wire = serde_json::to_value(&req).unwrap();
        assert!(wire["params"].get("args").is_none());
    }

    #[test]
    fn test_call_rejects_reserved_id() {
        let err = RpcRequest::call(0, "getModel", "ScenesService", vec![], false).unwrap_err();
        assert!(matches!(err, ProtocolError::ReservedId));
    }

    #[test]
    fn test_notify_uses_sentinel_id() {
        let req = RpcRequest::notify("muteAll", "AudioService", vec![]);
        assert_eq!(req.id, NO_REPLY_ID);
        assert!(req.is_notification());
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["id"], json!(0));
    }

    #[test]
    fn test_call_is_not_notification() {
        let req = RpcRequest::call(1, "getModel", "ScenesService", vec![], false).unwrap();
        assert!(!req.is_notification());
    }

    #[test]
    fn test_params_parse_with_defaults() {
        // Older envelopes on disk or in fixtures may omit args and
        // compactMode entirely.
        let req: RpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "getModel",
            "params": { "resource": "ScenesService" }
        }))
        .unwrap();
        assert!(req.params.args.is_empty());
        assert!(!req.params.compact);
    }

    #[test]
    fn test_args_preserve_order() {
        let req = RpcRequest::call(
            5,
            "setVolume",
            "AudioService",
            vec![json!("source-1"), json!(0.5), json!(true)],
            false,
        )
        .unwrap();
        let wire = serde_json::to_value(&req).unwrap();
        assert_eq!(wire["params"]["args"], json!(["source-1", 0.5, true]));
    }
}
