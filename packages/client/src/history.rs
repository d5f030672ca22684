//! REST history store collaborator.
//!
//! Best-effort: callers log failures and carry on with what the transport
//! delivers.

use async_trait::async_trait;
use lounge_server::infrastructure::dto::{
    http::{MessagesResponse, PersistMessageBody, PersistMessageRequest},
    websocket::MessageDto,
};

use crate::error::PersistenceError;

/// Key-value history store keyed by room
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn fetch(&self, room_id: &str) -> Result<Vec<MessageDto>, PersistenceError>;

    async fn persist(&self, room_id: &str, message: &MessageDto) -> Result<(), PersistenceError>;
}

/// HistoryStore backed by `GET|POST {base}/api/messages`
pub struct HttpHistoryStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpHistoryStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Store next to the WebSocket endpoint `ws_url`
    pub fn for_ws_url(ws_url: &str) -> Self {
        Self::new(http_base_from_ws(ws_url))
    }

    fn messages_url(&self) -> String {
        format!("{}/api/messages", self.base_url)
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn fetch(&self, room_id: &str) -> Result<Vec<MessageDto>, PersistenceError> {
        let response = self
            .client
            .get(self.messages_url())
            .query(&[("roomId", room_id)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PersistenceError::Rejected(response.status().as_u16()));
        }
        let body: MessagesResponse = response.json().await?;
        Ok(body.messages)
    }

    async fn persist(&self, room_id: &str, message: &MessageDto) -> Result<(), PersistenceError> {
        let request = PersistMessageRequest {
            room_id: Some(room_id.to_string()),
            message: Some(PersistMessageBody {
                content: Some(message.content.clone()),
                sender: Some(message.sender.clone()),
                timestamp: Some(message.timestamp),
            }),
        };
        let response = self
            .client
            .post(self.messages_url())
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PersistenceError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// HistoryStore that keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHistoryStore;

#[async_trait]
impl HistoryStore for NoopHistoryStore {
    async fn fetch(&self, _room_id: &str) -> Result<Vec<MessageDto>, PersistenceError> {
        Ok(Vec::new())
    }

    async fn persist(&self, _room_id: &str, _message: &MessageDto) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// HTTP origin of a WebSocket endpoint: `ws://host:port/ws` → `http://host:port`
pub fn http_base_from_ws(ws_url: &str) -> String {
    let (scheme, rest) = match ws_url.split_once("://") {
        Some(("wss", rest)) => ("https", rest),
        Some(("ws", rest)) => ("http", rest),
        Some((scheme, rest)) => (scheme, rest),
        None => ("http", ws_url),
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    format!("{}://{}", scheme, authority)
}
