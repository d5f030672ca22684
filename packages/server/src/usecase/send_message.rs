//! UseCase: メッセージ送信処理
//!
//! ## 振る舞い
//!
//! - 存在しない Room への投稿は `InvalidRoom`
//! - 送信者は接続が名乗ったプロフィールを優先（食い違う場合はログを出して上書き）
//! - ID とタイムスタンプは Room が採番し、全メンバーと投稿した接続に配信

use std::sync::Arc;

use lounge_shared::time::Clock;

use crate::domain::{
    ChatMessage, ChatRepository, ConnectionId, MessageContent, MessagePusher, MessageSender,
    Notification, RoomId, Timestamp,
};

use super::error::SendMessageError;

/// メッセージ送信のユースケース
pub struct SendMessageUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn ChatRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
    /// タイムスタンプの採番に使う時計
    clock: Arc<dyn Clock>,
}

impl SendMessageUseCase {
    /// 新しい SendMessageUseCase を作成
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            clock,
        }
    }

    /// メッセージ送信を実行
    ///
    /// # Arguments
    ///
    /// * `connection_id` - 投稿した接続
    /// * `room_id` - 投稿先の Room
    /// * `content` - メッセージ内容（Domain Model）
    /// * `claimed_sender` - クライアントが申告した送信者
    ///
    /// # Returns
    ///
    /// * `Ok(ChatMessage)` - 記録されたメッセージ
    /// * `Err(SendMessageError)` - 送信失敗
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        content: MessageContent,
        claimed_sender: MessageSender,
    ) -> Result<ChatMessage, SendMessageError> {
        let sender = match self.repository.profile_of(connection_id).await {
            Some(profile) => {
                if profile.id != claimed_sender.id {
                    tracing::warn!(
                        "Connection '{}' claimed sender '{}' but announced '{}'; using the announced profile",
                        connection_id,
                        claimed_sender.id,
                        profile.id
                    );
                }
                profile.as_sender()
            }
            None => claimed_sender,
        };

        let message = self.post(room_id, content, sender).await?;

        // 投稿した接続がメンバーでなくてもエコーを返す
        let mut targets = self
            .repository
            .room_connections(room_id)
            .await
            .unwrap_or_default();
        if !targets.contains(connection_id) {
            targets.push(connection_id.clone());
        }
        if let Err(e) = self
            .message_pusher
            .broadcast(targets, Notification::NewMessage(message.clone()))
            .await
        {
            tracing::warn!("Failed to broadcast message: {}", e);
        }

        Ok(message)
    }

    /// 接続を介さずに投稿（システムメッセージなど）し、メンバーに配信
    pub async fn execute_as(
        &self,
        room_id: &RoomId,
        content: MessageContent,
        sender: MessageSender,
    ) -> Result<ChatMessage, SendMessageError> {
        let message = self.post(room_id, content, sender).await?;
        let targets = self
            .repository
            .room_connections(room_id)
            .await
            .unwrap_or_default();
        if let Err(e) = self
            .message_pusher
            .broadcast(targets, Notification::NewMessage(message.clone()))
            .await
        {
            tracing::warn!("Failed to broadcast message: {}", e);
        }
        Ok(message)
    }

    async fn post(
        &self,
        room_id: &RoomId,
        content: MessageContent,
        sender: MessageSender,
    ) -> Result<ChatMessage, SendMessageError> {
        let now = Timestamp::new(self.clock.now_millis());
        let message = self
            .repository
            .append_message(room_id, content, sender, now)
            .await
            .map_err(|_| SendMessageError::InvalidRoom(room_id.to_string()))?;
        tracing::debug!(
            "Message '{}' recorded in room '{}' at {}",
            message.id.as_str(),
            room_id,
            message.timestamp.value()
        );
        Ok(message)
    }
}
