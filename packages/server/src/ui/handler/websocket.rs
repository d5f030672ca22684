//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{
    domain::{ChatCommand, ConnectionId, Notification},
    infrastructure::dto::websocket::{ClientEvent, ServerEvent},
    ui::state::AppState,
};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that receives notifications from the rx channel and pushes them to the WebSocket sender.
///
/// Each notification is converted to its wire form (`ServerEvent`) here, so the
/// use cases never deal with JSON.
fn pusher_loop(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    mut sender: futures_util::stream::SplitSink<WebSocket, Message>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            let event = ServerEvent::from(notification);
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize '{}': {}", event.name(), e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    })
}

/// Decode one text frame into a validated command.
fn decode_command(text: &str) -> Option<ChatCommand> {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Dropping undecodable frame: {}", e);
            return None;
        }
    };
    match ChatCommand::try_from(event) {
        Ok(command) => Some(command),
        Err(e) => {
            tracing::warn!("Dropping payload: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::generate();
    let (sender, mut receiver) = socket.split();

    // Register this connection's outbound channel with the hub
    let (tx, rx) = mpsc::unbounded_channel();
    state.hub.connect(connection_id.clone(), tx).await;
    tracing::info!("Connection '{}' opened", connection_id);

    let connection_for_recv = connection_id.clone();
    let state_for_recv = state.clone();

    // Spawn a task to receive events from this client
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(e) => {
                    tracing::warn!("WebSocket error on '{}': {}", connection_for_recv, e);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    tracing::debug!("Received text from '{}': {}", connection_for_recv, text);
                    let Some(command) = decode_command(&text) else {
                        continue;
                    };
                    if let Err(e) = state_for_recv
                        .hub
                        .handle(&connection_for_recv, command)
                        .await
                    {
                        tracing::warn!("Rejected event from '{}': {}", connection_for_recv, e);
                    }
                }
                Message::Ping(_) => {
                    // Ping/pong is handled automatically by the WebSocket protocol
                    tracing::debug!("Received ping");
                }
                Message::Close(_) => {
                    tracing::info!("Connection '{}' requested close", connection_for_recv);
                    break;
                }
                _ => {}
            }
        }
    });

    // Spawn a task to deliver notifications to this client
    let mut send_task = pusher_loop(rx, sender);

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut recv_task => send_task.abort(),
        _ = &mut send_task => recv_task.abort(),
    };

    match state.hub.disconnect(&connection_id).await {
        Some(profile) => tracing::info!(
            "Connection '{}' closed, user '{}' went offline",
            connection_id,
            profile.id
        ),
        None => tracing::info!("Connection '{}' closed", connection_id),
    }
}
