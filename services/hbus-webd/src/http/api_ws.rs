//! `GET /api/v1/ws`: the programmatic API websocket. Unlike the UI
//! websocket, frames are named and carry a client-chosen `handle` for
//! correlating responses against concurrent in-flight requests
//! (spec.md §6).

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use hbus_core::{ConversionRegistry, CoreResult, ObjectId, Origin, Subscribable, Value, ValueKind, Writable};
use hbus_protocol::{ApiAction, ApiError, ApiRequest, ApiResponse};
use tokio::sync::mpsc;

use crate::state::AppState;

pub async fn api_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Bridges pushes from a subscribed object into `ApiResponse` frames on
/// one API websocket connection, reusing the `subscribe` handle the
/// client asked for.
struct ApiWsSink {
    id: ObjectId,
    name: String,
    kind: ValueKind,
    handle: Option<serde_json::Value>,
    tx: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl Writable for ApiWsSink {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    async fn write(&self, value: Value, _origin: Origin) -> CoreResult<()> {
        let response = ApiResponse {
            name: self.name.clone(),
            action: ApiAction::Subscribe,
            handle: self.handle.clone(),
            status: 200,
            value: Some(ConversionRegistry::to_json(&value)),
        };
        if let Ok(text) = serde_json::to_string(&response) {
            let _ = self.tx.send(Message::Text(text));
        }
        Ok(())
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(Message::Text(text))) = receiver.next().await {
        let request: ApiRequest = match serde_json::from_str(&text) {
            Ok(req) => req,
            Err(err) => {
                let error = ApiError::plain(400, format!("malformed request: {err}"));
                send_json(&tx, &error);
                continue;
            }
        };
        handle_request(&state, &tx, request).await;
    }

    writer.abort();
}

fn send_json(tx: &mpsc::UnboundedSender<Message>, value: &impl serde::Serialize) {
    if let Ok(text) = serde_json::to_string(value) {
        let _ = tx.send(Message::Text(text));
    }
}

async fn handle_request(state: &AppState, tx: &mpsc::UnboundedSender<Message>, request: ApiRequest) {
    let ApiRequest { name, action, handle, value } = request;

    let Some(object) = state.object_by_name(&name).await else {
        send_json(tx, &ApiError { status: 404, error: format!("unknown object '{name}'"), name: Some(name), action: Some(action), handle });
        return;
    };

    match action {
        ApiAction::Subscribe => {
            let sink = Arc::new(ApiWsSink { id: ObjectId::new(), name: name.clone(), kind: object.kind(), handle: handle.clone(), tx: tx.clone() });
            object.subscribe(sink, None);
            let current = object.current().value.map(|v| ConversionRegistry::to_json(&v));
            send_json(tx, &ApiResponse { name, action, handle, status: 200, value: current });
        }
        ApiAction::Get => {
            let current = object.current();
            match current.value {
                Some(v) => send_json(tx, &ApiResponse { name, action, handle, status: 200, value: Some(ConversionRegistry::to_json(&v)) }),
                None => send_json(tx, &ApiError { status: 409, error: format!("object '{name}' has no value yet"), name: Some(name), action: Some(action), handle }),
            }
        }
        ApiAction::Post => {
            let Some(raw) = value else {
                send_json(tx, &ApiError { status: 422, error: "post requires a value".into(), name: Some(name), action: Some(action), handle });
                return;
            };
            let decoded = match ConversionRegistry::from_json(object.kind(), raw) {
                Ok(v) => v,
                Err(err) => {
                    send_json(tx, &ApiError { status: 422, error: err.to_string(), name: Some(name), action: Some(action), handle });
                    return;
                }
            };
            match object.write(decoded, Origin::root()).await {
                Ok(()) => send_json(tx, &ApiResponse { name, action, handle, status: 204, value: None }),
                Err(err) => send_json(tx, &ApiError { status: 500, error: err.to_string(), name: Some(name), action: Some(action), handle }),
            }
        }
    }
}
