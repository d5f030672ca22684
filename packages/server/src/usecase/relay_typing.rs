//! UseCase: 入力中インジケーターの中継
//!
//! 保存はしない。同じ Room の他のメンバーに `user_typing` を転送する
//! （送信した接続と送信ユーザー自身は除外）。未知の Room はログのみ。

use std::sync::Arc;

use crate::domain::{
    ChatRepository, ConnectionId, MessagePusher, Notification, RoomId, TypingUser,
};

/// 入力中インジケーター中継のユースケース
pub struct RelayTypingUseCase {
    repository: Arc<dyn ChatRepository>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl RelayTypingUseCase {
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// 中継を実行
    ///
    /// # Returns
    ///
    /// 通知を送った接続の一覧
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
        user: TypingUser,
        is_typing: bool,
    ) -> Vec<ConnectionId> {
        let user = match self.repository.profile_of(connection_id).await {
            Some(profile) => profile.as_typing_user(),
            None => user,
        };

        let targets = match self.repository.room_connections(room_id).await {
            Ok(connections) => connections,
            Err(e) => {
                tracing::debug!("Typing signal dropped: {}", e);
                return Vec::new();
            }
        };
        let own = self.repository.connection_of(&user.id).await;
        let targets: Vec<ConnectionId> = targets
            .into_iter()
            .filter(|c| c != connection_id && Some(c) != own.as_ref())
            .collect();

        let notification = Notification::UserTyping {
            room_id: room_id.clone(),
            user,
            is_typing,
        };
        if let Err(e) = self
            .message_pusher
            .broadcast(targets.clone(), notification)
            .await
        {
            tracing::warn!("Failed to relay typing signal: {}", e);
        }
        targets
    }
}
