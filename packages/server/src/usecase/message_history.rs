//! UseCase: REST 履歴ストアの読み書き
//!
//! `GET /api/messages` と `POST /api/messages` の背後にあるユースケース。
//! WebSocket の Room ログとは独立した、Room ごとのキーバリューストア。

use std::sync::Arc;

use lounge_shared::time::Clock;

use crate::domain::{
    ChatMessage, HistoryRepository, MessageContent, MessageId, MessageSender, RoomId, Timestamp,
};

use super::error::HistoryError;

/// 履歴ストアのユースケース
pub struct MessageHistoryUseCase {
    history: Arc<dyn HistoryRepository>,
    clock: Arc<dyn Clock>,
}

impl MessageHistoryUseCase {
    pub fn new(history: Arc<dyn HistoryRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { history, clock }
    }

    /// Room の履歴を取得
    pub async fn fetch(&self, room_id: Option<String>) -> Result<Vec<ChatMessage>, HistoryError> {
        let room_id = room_id
            .filter(|id| !id.is_empty())
            .ok_or(HistoryError::MissingRoomId)?;
        let room_id =
            RoomId::new(room_id).map_err(|e| HistoryError::InvalidFormat(e.to_string()))?;
        Ok(self.history.fetch(&room_id).await)
    }

    /// メッセージを履歴に保存
    ///
    /// ID は常にサーバーが採番し、タイムスタンプは指定がなければ現在時刻。
    pub async fn persist(
        &self,
        room_id: Option<String>,
        content: Option<String>,
        sender: Option<MessageSender>,
        timestamp: Option<i64>,
    ) -> Result<ChatMessage, HistoryError> {
        let (Some(room_id), Some(content), Some(sender)) = (room_id, content, sender) else {
            return Err(HistoryError::InvalidFormat(
                "roomId, message.content and message.sender are required".to_string(),
            ));
        };
        let room_id =
            RoomId::new(room_id).map_err(|e| HistoryError::InvalidFormat(e.to_string()))?;
        let content =
            MessageContent::new(content).map_err(|e| HistoryError::InvalidFormat(e.to_string()))?;

        let message = ChatMessage {
            id: MessageId::generate(),
            room_id,
            content,
            sender,
            timestamp: Timestamp::new(timestamp.unwrap_or_else(|| self.clock.now_millis())),
        };
        self.history.append(message.clone()).await;
        tracing::debug!(
            "Persisted message '{}' to history of room '{}'",
            message.id.as_str(),
            message.room_id
        );
        Ok(message)
    }
}
