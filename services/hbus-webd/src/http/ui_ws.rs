//! `GET /ws`: the user-interface websocket. Frames are small and keyed by
//! numeric object id rather than name, since the browser dashboard that
//! drives this endpoint is handed ids in the page it rendered rather
//! than looking objects up by name (spec.md §6).

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use hbus_core::{ConversionRegistry, CoreResult, ObjectId, Origin, Subscribable, Value, ValueKind, Writable};
use hbus_protocol::UiIncoming;
use tokio::sync::mpsc;

use crate::state::AppState;

pub async fn ui_ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Bridges pushes from a subscribed object back out to one websocket
/// connection, tagged with the numeric id the browser subscribed under.
struct WsSink {
    id: ObjectId,
    ui_id: u64,
    kind: ValueKind,
    tx: mpsc::UnboundedSender<Message>,
}

#[async_trait]
impl Writable for WsSink {
    fn id(&self) -> ObjectId {
        self.id
    }
    fn kind(&self) -> ValueKind {
        self.kind
    }
    async fn write(&self, value: Value, _origin: Origin) -> CoreResult<()> {
        let push = hbus_protocol::UiPush { id: self.ui_id, v: ConversionRegistry::to_json(&value) };
        if let Ok(text) = serde_json::to_string(&push) {
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

    while let Some(Ok(message)) = receiver.next().await {
        let Message::Text(text) = message else { continue };
        let Ok(incoming) = serde_json::from_str::<UiIncoming>(&text) else {
            tracing::debug!(frame = %text, "dropping malformed UI websocket frame");
            continue;
        };

        match incoming {
            UiIncoming::Subscribe { id, sub: true } => {
                let Some(object) = state.object_by_id(id).await else { continue };
                let sink = Arc::new(WsSink { id: ObjectId::new(), ui_id: id, kind: object.kind(), tx: tx.clone() });
                object.subscribe(sink, None);
                if let Some(value) = object.current().value {
                    let push = hbus_protocol::UiPush { id, v: ConversionRegistry::to_json(&value) };
                    if let Ok(text) = serde_json::to_string(&push) {
                        let _ = tx.send(Message::Text(text));
                    }
                }
            }
            UiIncoming::Subscribe { sub: false, .. } => {}
            UiIncoming::Write { id, v } => {
                let Some(object) = state.object_by_id(id).await else { continue };
                match ConversionRegistry::from_json(object.kind(), v) {
                    Ok(value) => {
                        if let Err(err) = object.write(value, Origin::root()).await {
                            tracing::warn!(error = %err, id, "UI websocket write failed");
                        }
                    }
                    Err(err) => tracing::debug!(error = %err, id, "UI websocket write had an undecodable value"),
                }
            }
        }
    }

    writer.abort();
}
