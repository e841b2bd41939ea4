// hbus-protocol: wire types for the three client-facing surfaces exposed by
// services/hbus-webd.
//
// - The UI websocket (`GET /ws`) carries small untagged frames keyed by
//   object id, intended for a browser dashboard that doesn't know object
//   names, only the numeric ids it was handed in the page it rendered.
// - The API websocket (`GET /api/v1/ws`) carries named, correlated
//   request/response frames for programmatic clients.
// - The long-poll HTTP surface (`GET`/`POST /api/v1/object/{name}`) is
//   plain JSON bodies plus an `ETag`/`If-None-Match` header pair; its only
//   wire type here is the error envelope, since success bodies are just
//   the object's `Value` encoded via `hbus_core::ConversionRegistry::to_json`.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// UI websocket (`GET /ws`)
// ---------------------------------------------------------------------------

/// Server -> UI client: a value push for a subscribed object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiPush {
    pub id: u64,
    pub v: serde_json::Value,
}

/// UI client -> server. Two shapes share the wire, discriminated by which
/// of `v`/`sub` is present: a write carries `v`, a subscription request
/// carries `sub: true`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum UiIncoming {
    Write { id: u64, v: serde_json::Value },
    Subscribe { id: u64, sub: bool },
}

// ---------------------------------------------------------------------------
// API websocket (`GET /api/v1/ws`)
// ---------------------------------------------------------------------------

/// The three actions an API websocket client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiAction {
    Subscribe,
    Get,
    Post,
}

/// Client -> server request frame.
///
/// `handle` is an opaque client-chosen correlation token, echoed back
/// unchanged on the matching response so a client with several requests
/// in flight can match them up; `value` is only meaningful for `post`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiRequest {
    pub name: String,
    pub action: ApiAction,
    #[serde(default)]
    pub handle: Option<serde_json::Value>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

/// Server -> client response frame. `value` is only populated for `get`
/// responses and for the initial value delivered on a successful
/// `subscribe`; later pushes to a subscription reuse this same shape with
/// `status` 200.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub name: String,
    pub action: ApiAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<serde_json::Value>,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

/// Server -> client error frame, used both on the API websocket and (with
/// `name`/`action`/`handle` left `None`) as the body of a rejected
/// long-poll HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    pub status: u16,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ApiAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<serde_json::Value>,
}

impl ApiError {
    pub fn plain(status: u16, error: impl Into<String>) -> Self {
        ApiError {
            status,
            error: error.into(),
            name: None,
            action: None,
            handle: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_incoming_write_and_subscribe_are_distinguished_by_shape() {
        let write: UiIncoming = serde_json::from_str(r#"{"id":1,"v":42}"#).unwrap();
        assert_eq!(
            write,
            UiIncoming::Write {
                id: 1,
                v: serde_json::json!(42)
            }
        );

        let sub: UiIncoming = serde_json::from_str(r#"{"id":1,"sub":true}"#).unwrap();
        assert_eq!(sub, UiIncoming::Subscribe { id: 1, sub: true });
    }

    #[test]
    fn api_request_action_round_trips_snake_case() {
        let req: ApiRequest =
            serde_json::from_str(r#"{"name":"kitchen.light","action":"subscribe"}"#).unwrap();
        assert_eq!(req.action, ApiAction::Subscribe);
        assert!(req.handle.is_none());
    }

    #[test]
    fn api_response_omits_absent_optional_fields() {
        let resp = ApiResponse {
            name: "kitchen.light".into(),
            action: ApiAction::Post,
            handle: None,
            status: 204,
            value: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("handle").is_none());
        assert!(json.get("value").is_none());
    }
}
