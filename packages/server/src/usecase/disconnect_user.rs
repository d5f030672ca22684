//! UseCase: ユーザー切断処理
//!
//! 切断された接続を MessagePusher から外し、その接続がまだ Presence を
//! 所有していれば全ての Room から退出させる。各 Room の新しいメンバー一覧と
//! オンラインユーザー一覧をブロードキャストする。

use std::sync::Arc;

use crate::domain::{ChatRepository, ConnectionId, MessagePusher, Notification, UserProfile};

/// ユーザー切断のユースケース
pub struct DisconnectUserUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn ChatRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl DisconnectUserUseCase {
    /// 新しい DisconnectUserUseCase を作成
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// 切断を実行
    ///
    /// # Returns
    ///
    /// 削除したプロフィール（接続が再接続で置き換え済みの場合は `None`）
    pub async fn execute(&self, connection_id: &ConnectionId) -> Option<UserProfile> {
        // 1. MessagePusher から登録解除
        self.message_pusher.unregister_client(connection_id).await;

        // 2. Presence を削除（この接続が所有している場合のみ）
        let removed = self.repository.remove_presence(connection_id).await;

        if let Some(profile) = &removed {
            tracing::info!(
                "User '{}' disconnected (connection '{}')",
                profile.id,
                connection_id
            );

            // 3. 全ての Room から退出し、残りのメンバーに通知
            for outcome in self.repository.leave_all_rooms(&profile.id).await {
                let targets = self
                    .repository
                    .room_connections(&outcome.room_id)
                    .await
                    .unwrap_or_default();
                let notification = Notification::RoomUsers {
                    room_id: outcome.room_id,
                    users: outcome.roster,
                };
                if let Err(e) = self.message_pusher.broadcast(targets, notification).await {
                    tracing::warn!("Failed to broadcast roster after disconnect: {}", e);
                }
            }
        } else {
            tracing::debug!(
                "Connection '{}' closed without owning a presence entry",
                connection_id
            );
        }

        // 4. オンラインユーザー一覧をブロードキャスト
        let users = self.repository.active_users().await;
        let targets = self.message_pusher.registered_clients().await;
        if let Err(e) = self
            .message_pusher
            .broadcast(targets, Notification::ActiveUsers(users))
            .await
        {
            tracing::warn!("Failed to broadcast active users: {}", e);
        }

        removed
    }
}
