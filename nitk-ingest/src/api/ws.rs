//! WebSocket live result feed
//!
//! Each connection registers a channel subscriber with the broadcaster and
//! forwards every live payload as a text frame. Inbound frames are only
//! watched for close.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::broadcaster::ChannelSubscriber;
use crate::AppState;

/// GET /ws
pub async fn live_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let id = state
        .broadcaster
        .connect(Arc::new(ChannelSubscriber::new(tx)))
        .await;
    info!(%id, "Live subscriber connected");

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sender.send(Message::Text(message)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.broadcaster.disconnect(id).await;
    debug!(%id, "Live subscriber disconnected");
}
