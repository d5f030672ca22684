//! UseCase: Room からの退出処理
//!
//! 退出は冪等。Room が存在すれば、更新後のメンバー一覧を残りのメンバーと
//! 退出した本人に送信する。未知の Room への退出は何もしない。

use std::sync::Arc;

use crate::domain::{ChatRepository, ConnectionId, MessagePusher, Notification, RoomId};

use super::error::LeaveRoomError;

/// Room 退出のユースケース
pub struct LeaveRoomUseCase {
    repository: Arc<dyn ChatRepository>,
    message_pusher: Arc<dyn MessagePusher>,
}

impl LeaveRoomUseCase {
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        message_pusher: Arc<dyn MessagePusher>,
    ) -> Self {
        Self {
            repository,
            message_pusher,
        }
    }

    /// Room からの退出を実行
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - メンバーから削除した
    /// * `Ok(false)` - メンバーではなかった（何もしない）
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<bool, LeaveRoomError> {
        let profile = self
            .repository
            .profile_of(connection_id)
            .await
            .ok_or_else(|| LeaveRoomError::NotAnnounced(connection_id.to_string()))?;

        let outcome = match self.repository.leave_room(room_id, &profile.id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!("Leave ignored: {}", e);
                return Ok(false);
            }
        };
        if outcome.removed {
            tracing::info!("User '{}' left room '{}'", profile.id, room_id);
        }

        let mut targets = self
            .repository
            .room_connections(room_id)
            .await
            .unwrap_or_default();
        if !targets.contains(connection_id) {
            targets.push(connection_id.clone());
        }
        let notification = Notification::RoomUsers {
            room_id: outcome.room_id,
            users: outcome.roster,
        };
        if let Err(e) = self.message_pusher.broadcast(targets, notification).await {
            tracing::warn!("Failed to broadcast room users: {}", e);
        }

        Ok(outcome.removed)
    }
}
