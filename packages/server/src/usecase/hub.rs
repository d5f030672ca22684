//! ChatHub: 1 プロセス（またはシミュレーションのコンテキスト）あたり 1 つの状態の持ち主
//!
//! 各ユースケースを束ね、検証済みの `ChatCommand` を 1 つずつ処理する。
//! コマンド処理は非同期ロックで直列化されるため、同じ Room への追加と
//! 配信の順序が一致する。

use std::sync::Arc;

use lounge_shared::time::Clock;
use tokio::sync::Mutex;

use crate::domain::{
    ChatCommand, ChatMessage, ChatRepository, ConnectionId, MessageContent, MessagePusher,
    MessageSender, PusherChannel, RoomId, UserId, UserProfile,
};

use super::{
    connect_user::ConnectUserUseCase,
    disconnect_user::DisconnectUserUseCase,
    error::{DispatchError, SendMessageError},
    join_room::{JoinPolicy, JoinRoomUseCase},
    leave_room::LeaveRoomUseCase,
    relay_typing::RelayTypingUseCase,
    send_message::SendMessageUseCase,
};

/// Hub の振る舞いを切り替えるオプション
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// 未知の Room への join で Room を作成するか
    pub auto_create_rooms: bool,
    /// 新規参加者にシステムユーザーから歓迎メッセージを送るか
    pub greet_new_members: bool,
    /// システムメッセージの送信者
    pub system_sender: MessageSender,
}

impl HubOptions {
    /// Default sender of system messages.
    pub fn default_system_sender() -> MessageSender {
        MessageSender {
            id: UserId::system(),
            name: "System User".to_string(),
            avatar: String::new(),
        }
    }
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            auto_create_rooms: true,
            greet_new_members: false,
            system_sender: Self::default_system_sender(),
        }
    }
}

/// Presence / Room / Message の状態を持ち、コマンドを処理する Hub
pub struct ChatHub {
    connect_user: ConnectUserUseCase,
    disconnect_user: DisconnectUserUseCase,
    join_room: JoinRoomUseCase,
    leave_room: LeaveRoomUseCase,
    send_message: SendMessageUseCase,
    relay_typing: RelayTypingUseCase,
    options: HubOptions,
    dispatch_lock: Mutex<()>,
}

impl ChatHub {
    pub fn new(
        repository: Arc<dyn ChatRepository>,
        message_pusher: Arc<dyn MessagePusher>,
        clock: Arc<dyn Clock>,
        options: HubOptions,
    ) -> Self {
        let policy = JoinPolicy {
            auto_create_rooms: options.auto_create_rooms,
            greeter: options
                .greet_new_members
                .then(|| options.system_sender.clone()),
        };
        Self {
            connect_user: ConnectUserUseCase::new(repository.clone(), message_pusher.clone()),
            disconnect_user: DisconnectUserUseCase::new(
                repository.clone(),
                message_pusher.clone(),
            ),
            join_room: JoinRoomUseCase::new(
                repository.clone(),
                message_pusher.clone(),
                clock.clone(),
                policy,
            ),
            leave_room: LeaveRoomUseCase::new(repository.clone(), message_pusher.clone()),
            send_message: SendMessageUseCase::new(
                repository.clone(),
                message_pusher.clone(),
                clock,
            ),
            relay_typing: RelayTypingUseCase::new(repository, message_pusher),
            options,
            dispatch_lock: Mutex::new(()),
        }
    }

    pub fn options(&self) -> &HubOptions {
        &self.options
    }

    /// 新しい接続の通知チャネルを登録
    pub async fn connect(&self, connection_id: ConnectionId, channel: PusherChannel) {
        let _guard = self.dispatch_lock.lock().await;
        self.connect_user.register(connection_id, channel).await;
    }

    /// コマンドを処理
    pub async fn handle(
        &self,
        connection_id: &ConnectionId,
        command: ChatCommand,
    ) -> Result<(), DispatchError> {
        let _guard = self.dispatch_lock.lock().await;
        tracing::debug!("Dispatching '{}' from '{}'", command.name(), connection_id);

        match command {
            ChatCommand::Announce(profile) => {
                self.connect_user.execute(connection_id.clone(), profile).await;
            }
            ChatCommand::JoinRoom(room_id) => {
                self.join_room.execute(connection_id, &room_id).await?;
            }
            ChatCommand::LeaveRoom(room_id) => {
                self.leave_room.execute(connection_id, &room_id).await?;
            }
            ChatCommand::SendMessage {
                room_id,
                content,
                sender,
            } => {
                self.send_message
                    .execute(connection_id, &room_id, content, sender)
                    .await?;
            }
            ChatCommand::Typing {
                room_id,
                user,
                is_typing,
            } => {
                self.relay_typing
                    .execute(connection_id, &room_id, user, is_typing)
                    .await;
            }
        }
        Ok(())
    }

    /// 接続の切断を処理
    pub async fn disconnect(&self, connection_id: &ConnectionId) -> Option<UserProfile> {
        let _guard = self.dispatch_lock.lock().await;
        self.disconnect_user.execute(connection_id).await
    }

    /// システムユーザーとして投稿
    pub async fn post_system_message(
        &self,
        room_id: &RoomId,
        content: MessageContent,
    ) -> Result<ChatMessage, SendMessageError> {
        let _guard = self.dispatch_lock.lock().await;
        self.send_message
            .execute_as(room_id, content, self.options.system_sender.clone())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{Notification, UserProfile},
        infrastructure::{message_pusher::ChannelMessagePusher, repository::InMemoryChatRepository},
        usecase::error::JoinRoomError,
    };
    use lounge_shared::time::FixedClock;
    use tokio::sync::mpsc;

    fn create_test_hub(options: HubOptions) -> (Arc<InMemoryChatRepository>, ChatHub) {
        let repository = Arc::new(InMemoryChatRepository::new());
        let hub = ChatHub::new(
            repository.clone(),
            Arc::new(ChannelMessagePusher::new()),
            Arc::new(FixedClock::new(1_000)),
            options,
        );
        (repository, hub)
    }

    async fn create_test_connection(
        hub: &ChatHub,
        connection: &str,
        user: &str,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<Notification>) {
        let connection_id = ConnectionId::new(connection.to_string()).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.connect(connection_id.clone(), tx).await;
        let profile = UserProfile::new(
            UserId::new(user.to_string()).unwrap(),
            user.to_string(),
            format!("{}@example.com", user),
            String::new(),
        );
        hub.handle(&connection_id, ChatCommand::Announce(profile))
            .await
            .unwrap();
        (connection_id, rx)
    }

    fn general() -> RoomId {
        RoomId::new("general".to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_repeated_joins_keep_single_roster_entry() {
        // テスト項目: 同じユーザーが何度 join してもメンバーは 1 人
        // given (前提条件):
        let (repository, hub) = create_test_hub(HubOptions::default());
        let (conn_a, _rx) = create_test_connection(&hub, "conn-a", "alice").await;

        // when (操作):
        for _ in 0..3 {
            hub.handle(&conn_a, ChatCommand::JoinRoom(general()))
                .await
                .unwrap();
        }

        // then (期待する結果):
        let room = repository.get_room(&general()).await.unwrap();
        assert_eq!(room.members.len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_then_reconnect_readds_without_duplicates() {
        // テスト項目: 切断で全ての Room と Presence から消え、再接続で重複なく戻る
        // given (前提条件):
        let (repository, hub) = create_test_hub(HubOptions::default());
        let (conn_a, _rx) = create_test_connection(&hub, "conn-a", "alice").await;
        hub.handle(&conn_a, ChatCommand::JoinRoom(general()))
            .await
            .unwrap();

        // when (操作):
        hub.disconnect(&conn_a).await;
        let after_disconnect = repository.get_room(&general()).await.unwrap();
        let presence_after_disconnect = repository.active_users().await;
        let (conn_a2, _rx2) = create_test_connection(&hub, "conn-a2", "alice").await;
        hub.handle(&conn_a2, ChatCommand::JoinRoom(general()))
            .await
            .unwrap();

        // then (期待する結果):
        assert!(after_disconnect.members.is_empty());
        assert!(presence_after_disconnect.is_empty());
        assert_eq!(repository.get_room(&general()).await.unwrap().members.len(), 1);
        assert_eq!(repository.active_users().await.len(), 1);
    }

    #[tokio::test]
    async fn test_join_unknown_room_rejected_without_auto_create() {
        // テスト項目: 自動作成が無効な Hub では未知の Room への join が InvalidRoom になる
        // given (前提条件):
        let (_repository, hub) = create_test_hub(HubOptions {
            auto_create_rooms: false,
            ..HubOptions::default()
        });
        let (conn_a, _rx) = create_test_connection(&hub, "conn-a", "alice").await;

        // when (操作):
        let result = hub
            .handle(&conn_a, ChatCommand::JoinRoom(general()))
            .await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(DispatchError::Join(JoinRoomError::InvalidRoom(
                "general".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn test_post_system_message_reaches_members() {
        // テスト項目: システムメッセージは Room のメンバーに配信される
        // given (前提条件):
        let (_repository, hub) = create_test_hub(HubOptions::default());
        let (conn_a, mut rx) = create_test_connection(&hub, "conn-a", "alice").await;
        hub.handle(&conn_a, ChatCommand::JoinRoom(general()))
            .await
            .unwrap();
        while rx.try_recv().is_ok() {}

        // when (操作):
        let message = hub
            .post_system_message(
                &general(),
                MessageContent::new("maintenance at noon".to_string()).unwrap(),
            )
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(message.sender.id.as_str(), "system-1");
        assert_eq!(rx.recv().await, Some(Notification::NewMessage(message)));
    }
}
