//! Consumer WebSocket endpoint
//!
//! Accepts dashboard viewers on `/user`: subscribe/unsubscribe, command
//! submissions and panic resolutions inbound; snapshots, logins, status
//! changes, updates and panic state outbound.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::server::AppState;
use crate::broker::{BrokerEvent, BrokerHandle};
use crate::models::{ConsumerBound, ConsumerFrame};

use super::next_port;

/// WebSocket handler for consumer connections
pub async fn consumer_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_consumer_socket(socket, state.broker))
}

async fn handle_consumer_socket(socket: WebSocket, broker: BrokerHandle) {
    let port = next_port();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ConsumerBound>();

    if broker
        .send(BrokerEvent::ConsumerConnected { port, outbound: tx })
        .is_err()
    {
        return;
    }

    info!(port, "consumer websocket connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        debug!(port, "consumer websocket send failed");
                        break;
                    }
                }
                Err(e) => {
                    error!(port, "failed to serialize consumer frame: {}", e);
                }
            }
        }
    });

    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match ConsumerFrame::parse(&text) {
                Ok(frame) => {
                    if broker
                        .send(BrokerEvent::ConsumerFrame { port, frame })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    warn!(port, "dropped consumer frame: {}", e);
                }
            },
            Some(Ok(Message::Close(_))) => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(port, "consumer websocket error: {}", e);
                break;
            }
            None => break,
        }
    }

    let _ = broker.send(BrokerEvent::ConsumerClosed { port });

    send_task.abort();
    let _ = (&mut send_task).await;

    info!(port, "consumer websocket disconnected");
}
