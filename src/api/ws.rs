use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::monitor::{StatusUpdate, StatusUpdateSender};

#[derive(Clone)]
pub struct WsState {
    pub status_tx: StatusUpdateSender,
}

/// Server message sent to clients
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum ServerMessage {
    /// Initial connection acknowledgment
    Connected { message: String },
    /// A route was just checked
    Status {
        route_id: i64,
        has_active_disruptions: bool,
        changed: bool,
        timestamp: String,
    },
}

impl From<StatusUpdate> for ServerMessage {
    fn from(update: StatusUpdate) -> Self {
        ServerMessage::Status {
            route_id: update.route_id,
            has_active_disruptions: update.has_active_disruptions,
            changed: update.changed,
            timestamp: update.timestamp,
        }
    }
}

/// WebSocket endpoint for route status updates
pub async fn ws_status(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, mut receiver) = socket.split();
    let mut status_rx = state.status_tx.subscribe();

    // Send connected message
    let connected_msg = ServerMessage::Connected {
        message: "Connected to route status updates.".to_string(),
    };
    if let Ok(json) = serde_json::to_string(&connected_msg) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    // Spawn task to forward broadcast updates to WebSocket
    let forward_task = tokio::spawn(async move {
        loop {
            match status_rx.recv().await {
                Ok(update) => {
                    let msg = ServerMessage::from(update);
                    if let Ok(json) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    });

    // Drain incoming messages until the client goes away
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Ping(_)) => {
                // Axum handles pong automatically
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // Cleanup
    forward_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_shape() {
        let msg = ServerMessage::from(StatusUpdate {
            route_id: 4,
            has_active_disruptions: true,
            changed: false,
            timestamp: "2025-06-23T08:00:00+00:00".to_string(),
        });

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["route_id"], 4);
        assert_eq!(json["has_active_disruptions"], true);
        assert_eq!(json["changed"], false);
    }

    #[test]
    fn test_connected_message_shape() {
        let msg = ServerMessage::Connected {
            message: "hi".to_string(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "connected");
    }
}
