//! Live WebSocket connection to the chat server.

use futures_util::{SinkExt, StreamExt};
use lounge_server::infrastructure::dto::websocket::{ClientEvent, ServerEvent};
use tokio::{net::TcpStream, sync::mpsc, sync::watch};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, http::StatusCode, protocol::Message},
};

use crate::{config::TransportConfig, error::TransportError};

use super::{emitter::EventEmitter, shutdown_requested};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a live session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The connection failed or the server closed it
    Lost,
    /// The transport was shut down locally
    Shutdown,
}

/// One handshake attempt bounded by the connect timeout
pub async fn handshake(config: &TransportConfig) -> Result<WsStream, TransportError> {
    match tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str())).await {
        Err(_) => Err(TransportError::Timeout(config.connect_timeout)),
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(tungstenite::Error::Http(response)))
            if response.status() == StatusCode::SERVICE_UNAVAILABLE =>
        {
            Err(TransportError::Unavailable)
        }
        Ok(Err(e)) => Err(TransportError::Handshake(e.to_string())),
    }
}

/// Handshake with a bounded number of attempts and a fixed delay.
///
/// A server reporting itself unavailable ends the attempts immediately.
pub async fn connect_with_retries(config: &TransportConfig) -> Result<WsStream, TransportError> {
    let attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        tracing::info!(
            "Attempting to connect to {} (attempt {}/{})",
            config.url,
            attempt,
            attempts
        );
        match handshake(config).await {
            Ok(stream) => return Ok(stream),
            Err(TransportError::Unavailable) => return Err(TransportError::Unavailable),
            Err(e) if attempt >= attempts => {
                return Err(TransportError::Exhausted {
                    attempts,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                tracing::warn!("Connection attempt {} failed: {}", attempt, e);
                tokio::time::sleep(config.retry_delay).await;
                attempt += 1;
            }
        }
    }
}

/// Decode one text frame
pub fn decode_event(text: &str) -> Result<ServerEvent, serde_json::Error> {
    serde_json::from_str(text)
}

/// Pump events both ways until the connection drops or `shutdown` fires
pub async fn run_session(
    stream: WsStream,
    mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
    emitter: EventEmitter,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    // Spawn a task to deliver incoming events
    let mut read_task = tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match decode_event(&text) {
                    Ok(event) => emitter.emit(event),
                    Err(e) => tracing::warn!("Dropping malformed server event: {}", e),
                },
                Ok(Message::Close(_)) => {
                    tracing::info!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket read error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    // Spawn a task to send outbound events
    let mut write_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("Failed to serialize '{}': {}", event.name(), e);
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(json.into())).await {
                tracing::warn!("Failed to send '{}': {}", event.name(), e);
                break;
            }
        }
        let _ = write.send(Message::Close(None)).await;
    });

    // If any one of the tasks completes, abort the other
    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
            SessionEnd::Lost
        }
        _ = &mut write_task => {
            read_task.abort();
            SessionEnd::Lost
        }
        _ = shutdown_requested(shutdown) => {
            read_task.abort();
            write_task.abort();
            SessionEnd::Shutdown
        }
    }
}
