//! Edge RPC envelope (spec.md §4.1). Args/result are opaque JSON — the
//! core dispatches on `path`+`method` only and never needs their shape
//! (spec.md §9 "Dynamic typing of RPC payloads").

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: String,
    pub path: String,
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: String,
    pub status: RpcStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl RpcRequest {
    /// Request ids carry the originating cloud instance id as a prefix so
    /// non-owning instances can drop responses that aren't theirs cheaply
    /// (spec.md §4.1 "Correlation").
    pub fn new_id(instance_id: &str) -> String {
        format!("{instance_id}-{}", uuid::Uuid::new_v4().simple())
    }

    pub fn instance_id_of(request_id: &str) -> Option<&str> {
        request_id.rsplit_once('-').map(|(instance, _)| instance)
    }
}

/// The single RPC this core actually dispatches for disconnects
/// (spec.md §4.2 step 2): `path="uspot", method="client_remove"`.
pub fn client_remove(instance_id: &str, mac: &str) -> RpcRequest {
    RpcRequest {
        id: RpcRequest::new_id(instance_id),
        path: "uspot".to_string(),
        method: "client_remove".to_string(),
        args: serde_json::json!({ "mac": mac }),
    }
}

/// `path="uspot", method="client_list"` used by router reconciliation
/// (spec.md §4.2 "Router reconciliation").
pub fn client_list(instance_id: &str) -> RpcRequest {
    RpcRequest {
        id: RpcRequest::new_id(instance_id),
        path: "uspot".to_string(),
        method: "client_list".to_string(),
        args: serde_json::json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_carries_instance_prefix() {
        let id = RpcRequest::new_id("inst1");
        assert!(id.starts_with("inst1-"));
        assert_eq!(RpcRequest::instance_id_of(&id), Some("inst1"));
    }

    #[test]
    fn client_remove_shape() {
        let req = client_remove("inst1", "80AFCAC67055");
        assert_eq!(req.path, "uspot");
        assert_eq!(req.method, "client_remove");
        assert_eq!(req.args["mac"], "80AFCAC67055");
    }

    #[test]
    fn envelope_roundtrips_through_json() {
        let resp = RpcResponse {
            id: "inst1-42".to_string(),
            status: RpcStatus::Success,
            result: Some(serde_json::json!({"ok": true})),
            error: None,
            stderr: None,
        };
        let encoded = serde_json::to_string(&resp).unwrap();
        let decoded: RpcResponse = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.id, resp.id);
        assert_eq!(decoded.status, RpcStatus::Success);
    }
}
