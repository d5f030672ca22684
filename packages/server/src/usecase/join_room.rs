//! UseCase: Room への参加処理
//!
//! ## 振る舞い
//!
//! - `user_connected` を送っていない接続からの join は拒否
//! - 未知の Room は自動作成（無効な場合は `InvalidRoom`）
//! - メンバーが増えた場合は全メンバーに `room_users` をブロードキャスト、
//!   重複 join の場合は参加者本人にだけ送信
//! - 参加者本人にだけ `room_history` を送信
//! - 新規参加時のみ、設定されていればシステムユーザーから歓迎メッセージを投稿

use std::sync::Arc;

use lounge_shared::time::Clock;

use crate::domain::{
    ChatRepository, ConnectionId, MessageContent, MessagePusher, MessageSender, Notification,
    RepositoryError, RoomId, Timestamp,
};

use super::error::JoinRoomError;

/// Room 参加のポリシー
#[derive(Debug, Clone)]
pub struct JoinPolicy {
    /// 未知の Room を自動作成するか
    pub auto_create_rooms: bool,
    /// 新規参加者への歓迎メッセージの送信者（`None` なら送らない）
    pub greeter: Option<MessageSender>,
}

impl Default for JoinPolicy {
    fn default() -> Self {
        Self {
            auto_create_rooms: true,
            greeter: None,
        }
    }
}

/// Room 参加のユースケース
pub struct JoinRoomUseCase {
    repository: Arc<dyn ChatRepository>,
    message_pusher: Arc<dyn MessagePusher>,
    clock: Arc<dyn Clock>,
    policy: JoinPolicy,
}

impl JoinRoomUseCase {
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        policy: JoinPolicy,
    ) -> Self {
        Self {
            repository,
            message_pusher,
            clock,
            policy,
        }
    }

    /// Room への参加を実行
    ///
    /// # Returns
    ///
    /// * `Ok(bool)` - 新規に参加した場合は `true`、既にメンバーだった場合は `false`
    /// * `Err(JoinRoomError)` - 参加失敗
    pub async fn execute(
        &self,
        connection_id: &ConnectionId,
        room_id: &RoomId,
    ) -> Result<bool, JoinRoomError> {
        let profile = self
            .repository
            .profile_of(connection_id)
            .await
            .ok_or_else(|| JoinRoomError::NotAnnounced(connection_id.to_string()))?;

        let outcome = self
            .repository
            .join_room(room_id, profile.clone(), self.policy.auto_create_rooms)
            .await
            .map_err(|e| match e {
                RepositoryError::RoomNotFound(id) => JoinRoomError::InvalidRoom(id),
                other => JoinRoomError::InvalidRoom(other.to_string()),
            })?;

        let roster = Notification::RoomUsers {
            room_id: outcome.room_id.clone(),
            users: outcome.roster,
        };
        if outcome.newly_joined {
            tracing::info!("User '{}' joined room '{}'", profile.id, room_id);
            let targets = self
                .repository
                .room_connections(room_id)
                .await
                .unwrap_or_default();
            if let Err(e) = self.message_pusher.broadcast(targets, roster).await {
                tracing::warn!("Failed to broadcast room users: {}", e);
            }
        } else {
            tracing::debug!("User '{}' re-joined room '{}'", profile.id, room_id);
            if let Err(e) = self.message_pusher.push_to(connection_id, roster).await {
                tracing::warn!("Failed to push room users to '{}': {}", connection_id, e);
            }
        }

        let history = Notification::RoomHistory {
            room_id: outcome.room_id.clone(),
            messages: outcome.history,
        };
        if let Err(e) = self.message_pusher.push_to(connection_id, history).await {
            tracing::warn!("Failed to push room history to '{}': {}", connection_id, e);
        }

        if outcome.newly_joined {
            self.greet(room_id, &outcome.room_name).await;
        }

        Ok(outcome.newly_joined)
    }

    async fn greet(&self, room_id: &RoomId, room_name: &str) {
        let Some(greeter) = &self.policy.greeter else {
            return;
        };
        let Ok(content) = MessageContent::new(format!("Welcome to {}!", room_name)) else {
            return;
        };
        let now = Timestamp::new(self.clock.now_millis());
        match self
            .repository
            .append_message(room_id, content, greeter.clone(), now)
            .await
        {
            Ok(message) => {
                let targets = self
                    .repository
                    .room_connections(room_id)
                    .await
                    .unwrap_or_default();
                if let Err(e) = self
                    .message_pusher
                    .broadcast(targets, Notification::NewMessage(message))
                    .await
                {
                    tracing::warn!("Failed to broadcast welcome message: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to record welcome message: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{UserId, UserProfile},
        infrastructure::{message_pusher::ChannelMessagePusher, repository::InMemoryChatRepository},
    };
    use lounge_shared::time::FixedClock;
    use tokio::sync::mpsc;

    struct Fixture {
        repository: Arc<InMemoryChatRepository>,
        pusher: Arc<ChannelMessagePusher>,
        usecase: JoinRoomUseCase,
    }

    fn create_test_fixture(policy: JoinPolicy) -> Fixture {
        let repository = Arc::new(InMemoryChatRepository::new());
        let pusher = Arc::new(ChannelMessagePusher::new());
        let usecase = JoinRoomUseCase::new(
            repository.clone(),
            pusher.clone(),
            Arc::new(FixedClock::new(1_000)),
            policy,
        );
        Fixture {
            repository,
            pusher,
            usecase,
        }
    }

    async fn announce(
        fixture: &Fixture,
        connection: &str,
        user: &str,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<Notification>) {
        let connection_id = ConnectionId::new(connection.to_string()).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        fixture
            .pusher
            .register_client(connection_id.clone(), tx)
            .await;
        let profile = UserProfile::new(
            UserId::new(user.to_string()).unwrap(),
            user.to_string(),
            String::new(),
            String::new(),
        );
        fixture
            .repository
            .bind_presence(connection_id.clone(), profile)
            .await;
        (connection_id, rx)
    }

    fn general() -> RoomId {
        RoomId::new("general".to_string()).unwrap()
    }

    fn roster_ids(notification: Option<Notification>) -> Vec<String> {
        match notification {
            Some(Notification::RoomUsers { users, .. }) => {
                users.into_iter().map(|u| u.id.into_string()).collect()
            }
            other => panic!("expected room users, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_join_broadcasts_roster_then_unicasts_history() {
        // テスト項目: A と B が順に参加すると両者に [A, B] が届き、履歴は参加者本人にだけ届く
        // given (前提条件):
        let fixture = create_test_fixture(JoinPolicy::default());
        let (conn_a, mut rx_a) = announce(&fixture, "conn-a", "alice").await;
        let (conn_b, mut rx_b) = announce(&fixture, "conn-b", "bob").await;

        // when (操作):
        fixture.usecase.execute(&conn_a, &general()).await.unwrap();
        fixture.usecase.execute(&conn_b, &general()).await.unwrap();

        // then (期待する結果):
        assert_eq!(roster_ids(rx_a.recv().await), vec!["alice"]);
        assert!(matches!(
            rx_a.recv().await,
            Some(Notification::RoomHistory { .. })
        ));
        assert_eq!(roster_ids(rx_a.recv().await), vec!["alice", "bob"]);
        assert_eq!(roster_ids(rx_b.recv().await), vec!["alice", "bob"]);
        assert!(matches!(
            rx_b.recv().await,
            Some(Notification::RoomHistory { .. })
        ));
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_duplicate_join_unicasts_roster() {
        // テスト項目: 重複 join ではメンバーは増えず、メンバー一覧は本人にだけ送られる
        // given (前提条件):
        let fixture = create_test_fixture(JoinPolicy::default());
        let (conn_a, mut rx_a) = announce(&fixture, "conn-a", "alice").await;
        let (conn_b, mut rx_b) = announce(&fixture, "conn-b", "bob").await;
        fixture.usecase.execute(&conn_a, &general()).await.unwrap();
        fixture.usecase.execute(&conn_b, &general()).await.unwrap();
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        // when (操作):
        let newly_joined = fixture.usecase.execute(&conn_b, &general()).await.unwrap();

        // then (期待する結果):
        assert!(!newly_joined);
        assert_eq!(roster_ids(rx_b.recv().await), vec!["alice", "bob"]);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_requires_announce() {
        // テスト項目: user_connected を送っていない接続の join は拒否される
        // given (前提条件):
        let fixture = create_test_fixture(JoinPolicy::default());
        let stranger = ConnectionId::new("conn-x".to_string()).unwrap();

        // when (操作):
        let result = fixture.usecase.execute(&stranger, &general()).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(JoinRoomError::NotAnnounced("conn-x".to_string()))
        );
    }

    #[tokio::test]
    async fn test_join_unknown_room_when_auto_create_disabled() {
        // テスト項目: 自動作成が無効な場合、未知の Room への参加は InvalidRoom
        // given (前提条件):
        let fixture = create_test_fixture(JoinPolicy {
            auto_create_rooms: false,
            greeter: None,
        });
        let (conn_a, _rx_a) = announce(&fixture, "conn-a", "alice").await;

        // when (操作):
        let result = fixture.usecase.execute(&conn_a, &general()).await;

        // then (期待する結果):
        assert_eq!(result, Err(JoinRoomError::InvalidRoom("general".to_string())));
    }

    #[tokio::test]
    async fn test_welcome_message_only_on_first_join() {
        // テスト項目: 歓迎メッセージは初回参加時のみ投稿される
        // given (前提条件):
        let greeter = MessageSender {
            id: UserId::new("system-1".to_string()).unwrap(),
            name: "System User".to_string(),
            avatar: String::new(),
        };
        let fixture = create_test_fixture(JoinPolicy {
            auto_create_rooms: true,
            greeter: Some(greeter),
        });
        let (conn_a, mut rx_a) = announce(&fixture, "conn-a", "alice").await;

        // when (操作):
        fixture.usecase.execute(&conn_a, &general()).await.unwrap();
        fixture.usecase.execute(&conn_a, &general()).await.unwrap();

        // then (期待する結果):
        let room = fixture.repository.get_room(&general()).await.unwrap();
        assert_eq!(room.messages.len(), 1);
        assert_eq!(room.messages[0].content.as_str(), "Welcome to General!");
        let _roster = rx_a.recv().await;
        let _history = rx_a.recv().await;
        match rx_a.recv().await {
            Some(Notification::NewMessage(message)) => {
                assert_eq!(message.sender.id.as_str(), "system-1");
                assert_eq!(message.timestamp.value(), 1_000);
            }
            other => panic!("unexpected notification: {:?}", other),
        }
    }
}
