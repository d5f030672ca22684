//! UseCase: ユーザー接続（Presence 登録）処理
//!
//! - 接続の MessagePusher への登録
//! - `user_connected` によるプロフィールのバインド
//! - オンラインユーザー一覧（`active_users`）の全接続へのブロードキャスト

use std::sync::Arc;

use crate::domain::{
    ChatRepository, ConnectionId, MessagePusher, Notification, PusherChannel, UserProfile,
};

/// ユーザー接続のユースケース
pub struct ConnectUserUseCase {
    /// Repository（データアクセス層の抽象化）
    repository: Arc<dyn ChatRepository>,
    /// MessagePusher（メッセージ通知の抽象化）
    message_pusher: Arc<dyn MessagePusher>,
}

impl ConnectUserUseCase {
    /// 新しい ConnectUserUseCase を作成
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// 接続の通知チャネルを登録
    pub async fn register(&self, connection_id: ConnectionId, channel: PusherChannel) {
        self.message_pusher
            .register_client(connection_id, channel)
            .await;
    }

    /// プロフィールを接続にバインドし、オンライン一覧をブロードキャスト
    ///
    /// # Returns
    ///
    /// `active_users` を配信した接続の一覧
    pub async fn execute(
        &self,
        connection_id: ConnectionId,
        profile: UserProfile,
    ) -> Vec<ConnectionId> {
        let user_id = profile.id.clone();
        let change = self
            .repository
            .bind_presence(connection_id.clone(), profile)
            .await;

        if let Some(previous) = &change.replaced_connection {
            tracing::info!(
                "User '{}' rebound from connection '{}' to '{}'",
                user_id,
                previous,
                connection_id
            );
        } else {
            tracing::info!("User '{}' announced on connection '{}'", user_id, connection_id);
        }

        // プロフィール変更を参加中の Room に反映
        for room_id in change.refreshed_rooms {
            let (Ok(room), Ok(targets)) = (
                self.repository.get_room(&room_id).await,
                self.repository.room_connections(&room_id).await,
            ) else {
                continue;
            };
            let notification = Notification::RoomUsers {
                room_id,
                users: room.members,
            };
            if let Err(e) = self.message_pusher.broadcast(targets, notification).await {
                tracing::warn!("Failed to broadcast refreshed roster: {}", e);
            }
        }

        self.broadcast_active_users().await
    }

    /// オンラインユーザー一覧を登録中の全接続へ送信
    pub async fn broadcast_active_users(&self) -> Vec<ConnectionId> {
        let users = self.repository.active_users().await;
        let targets = self.message_pusher.registered_clients().await;
        if let Err(e) = self
            .message_pusher
            .broadcast(targets.clone(), Notification::ActiveUsers(users))
            .await
        {
            tracing::warn!("Failed to broadcast active users: {}", e);
        }
        targets
    }
}
