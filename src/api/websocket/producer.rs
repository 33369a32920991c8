//! Producer WebSocket endpoint
//!
//! Accepts monitored processes on `/api`: login, status updates and channel
//! pushes inbound; command frames outbound.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::api::server::AppState;
use crate::broker::{BrokerEvent, BrokerHandle};
use crate::models::{CommandFrame, ProducerFrame};

use super::next_port;

/// WebSocket handler for producer connections
pub async fn producer_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_producer_socket(socket, state.broker))
}

async fn handle_producer_socket(socket: WebSocket, broker: BrokerHandle) {
    let port = next_port();
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<CommandFrame>();

    if broker
        .send(BrokerEvent::ProducerConnected { port, outbound: tx })
        .is_err()
    {
        return;
    }

    info!(port, "producer websocket connected");

    // Outbound path: fire-and-forget, a failed send only ends the task
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        debug!(port, "producer websocket send failed");
                        break;
                    }
                }
                Err(e) => {
                    error!(port, "failed to serialize command frame: {}", e);
                }
            }
        }
    });

    let mut reason = String::new();
    loop {
        match receiver.next().await {
            Some(Ok(Message::Text(text))) => match ProducerFrame::parse(&text) {
                Ok(mut frame) => {
                    frame.stamp(Utc::now());
                    if broker
                        .send(BrokerEvent::ProducerFrame { port, frame })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    warn!(port, "dropped producer frame: {}", e);
                }
            },
            Some(Ok(Message::Close(close))) => {
                if let Some(close) = close {
                    reason = close.reason.to_string();
                }
                break;
            }
            Some(Ok(_)) => {
                // Ping/pong handled by axum, binary frames ignored
            }
            Some(Err(e)) => {
                debug!(port, "producer websocket error: {}", e);
                break;
            }
            None => break,
        }
    }

    // Exactly one close notification per connection; the broker side is
    // idempotent regardless.
    let _ = broker.send(BrokerEvent::ProducerClosed { port, reason });

    send_task.abort();
    let _ = (&mut send_task).await;

    info!(port, "producer websocket disconnected");
}
