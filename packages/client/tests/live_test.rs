//! Integration tests against a live server on an ephemeral port.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use lounge_client::{
    auth::StaticAuthProvider,
    config::{SessionConfig, TransportConfig},
    error::PersistenceError,
    history::HistoryStore,
    session::{ChatSession, ChatView},
    transport::{Transport, state::TransportMode},
};
use lounge_server::{
    infrastructure::{
        dto::websocket::{MessageDto, MessageSenderDto, UserProfileDto},
        message_pusher::ChannelMessagePusher,
        repository::{InMemoryChatRepository, InMemoryHistoryRepository},
    },
    ui::Server,
    usecase::{ChatHub, GetRoomDetailUseCase, GetRoomsUseCase, HubOptions, MessageHistoryUseCase},
};
use lounge_shared::time::{SystemClock, get_utc_timestamp};
use tokio::{net::TcpListener, sync::oneshot};

const WAIT: Duration = Duration::from_secs(3);

/// Helper struct to manage the server lifecycle
struct TestServer {
    port: u16,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let repository = Arc::new(InMemoryChatRepository::new());
        let clock = Arc::new(SystemClock);
        let hub = Arc::new(ChatHub::new(
            repository.clone(),
            Arc::new(ChannelMessagePusher::new()),
            clock.clone(),
            HubOptions::default(),
        ));
        let server = Server::new(
            hub,
            Arc::new(GetRoomsUseCase::new(repository.clone())),
            Arc::new(GetRoomDetailUseCase::new(repository)),
            Arc::new(MessageHistoryUseCase::new(
                Arc::new(InMemoryHistoryRepository::new()),
                clock,
            )),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async {
                let _ = rx.await;
            };
            if let Err(e) = server.run_with_listener(listener, shutdown).await {
                eprintln!("server error: {}", e);
            }
        });

        TestServer {
            port,
            shutdown: Some(tx),
        }
    }

    fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/ws", self.port)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// History store keeping everything in memory and counting calls
#[derive(Default)]
struct RecordingHistoryStore {
    archived: Vec<MessageDto>,
    persisted: Mutex<Vec<MessageDto>>,
    fetches: Mutex<Vec<String>>,
}

#[async_trait]
impl HistoryStore for RecordingHistoryStore {
    async fn fetch(&self, room_id: &str) -> Result<Vec<MessageDto>, PersistenceError> {
        self.fetches.lock().unwrap().push(room_id.to_string());
        let persisted = self.persisted.lock().unwrap().clone();
        Ok(self
            .archived
            .iter()
            .cloned()
            .chain(persisted)
            .filter(|m| m.room_id == room_id)
            .collect())
    }

    async fn persist(&self, _room_id: &str, message: &MessageDto) -> Result<(), PersistenceError> {
        self.persisted.lock().unwrap().push(message.clone());
        Ok(())
    }
}

fn create_test_profile(id: &str) -> UserProfileDto {
    UserProfileDto {
        id: id.to_string(),
        name: id.to_uppercase(),
        email: String::new(),
        avatar: String::new(),
        current_room: None,
    }
}

fn create_archived_message() -> MessageDto {
    MessageDto {
        id: "msg-archived".to_string(),
        room_id: "general".to_string(),
        content: "from the archive".to_string(),
        sender: MessageSenderDto {
            id: "carol".to_string(),
            name: "CAROL".to_string(),
            avatar: String::new(),
        },
        timestamp: get_utc_timestamp() - 600_000,
    }
}

async fn wait_for_view(session: &ChatSession, check: impl FnMut(&ChatView) -> bool) {
    let mut view = session.watch();
    tokio::time::timeout(WAIT, view.wait_for(check))
        .await
        .expect("view did not reach the expected state")
        .unwrap();
}

#[tokio::test]
async fn test_live_session_uses_history_store_and_deduplicates() {
    // テスト項目: サーバー接続時は履歴ストアから読み込み・保存し、同じメッセージは一度だけ表示される
    // given (前提条件):
    let server = TestServer::start().await;
    let history = Arc::new(RecordingHistoryStore {
        archived: vec![create_archived_message()],
        ..RecordingHistoryStore::default()
    });
    let config = TransportConfig {
        url: server.ws_url(),
        max_attempts: 1,
        ..TransportConfig::default()
    };
    let session = ChatSession::start(
        Transport::connect(config, None),
        &StaticAuthProvider::new(create_test_profile("alice")),
        history.clone(),
        SessionConfig::default(),
    )
    .await
    .unwrap();
    tokio::time::timeout(WAIT, session.transport().connected())
        .await
        .unwrap();
    assert_eq!(session.mode(), TransportMode::Live);

    // when (操作):
    session.join_room("general").await;
    wait_for_view(&session, |view| {
        view.room_users.iter().any(|u| u.id == "alice")
            && view.messages.iter().any(|m| m.id == "msg-archived")
    })
    .await;
    session.send_message("general", "hi").await;
    wait_for_view(&session, |view| {
        view.messages.iter().any(|m| m.content == "hi")
    })
    .await;
    // Rejoin: the server history and the store both carry "hi"
    session.join_room("general").await;
    wait_for_view(&session, |view| {
        view.messages.iter().any(|m| m.content == "hi")
    })
    .await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // then (期待する結果):
    let his = session
        .messages()
        .into_iter()
        .filter(|m| m.content == "hi")
        .count();
    assert_eq!(his, 1);
    assert_eq!(*history.fetches.lock().unwrap(), vec!["general", "general"]);
    assert_eq!(history.persisted.lock().unwrap().len(), 1);
    let archived_first = session.messages()[0].id == "msg-archived";
    assert!(archived_first);

    session.close().await;
}

#[tokio::test]
async fn test_join_before_connect_still_loads_history() {
    // テスト項目: 接続確立前に入室しても、ライブ接続になった時点で履歴ストアから読み込まれる
    // given (前提条件):
    let server = TestServer::start().await;
    let history = Arc::new(RecordingHistoryStore {
        archived: vec![create_archived_message()],
        ..RecordingHistoryStore::default()
    });
    let config = TransportConfig {
        url: server.ws_url(),
        max_attempts: 1,
        ..TransportConfig::default()
    };
    let session = ChatSession::start(
        Transport::connect(config, None),
        &StaticAuthProvider::new(create_test_profile("alice")),
        history.clone(),
        SessionConfig::default(),
    )
    .await
    .unwrap();

    // when (操作):
    session.join_room("general").await;

    // then (期待する結果):
    wait_for_view(&session, |view| {
        view.messages.iter().any(|m| m.id == "msg-archived")
            && view.room_users.iter().any(|u| u.id == "alice")
    })
    .await;
    assert_eq!(session.mode(), TransportMode::Live);
    assert_eq!(*history.fetches.lock().unwrap(), vec!["general"]);

    session.close().await;
}

#[tokio::test]
async fn test_live_sessions_see_each_other() {
    // テスト項目: 同じ部屋に入った 2 つのクライアントが互いを名簿とオンライン一覧で確認できる
    // given (前提条件):
    let server = TestServer::start().await;
    let connect = |id: &str| {
        let config = TransportConfig {
            url: server.ws_url(),
            max_attempts: 1,
            ..TransportConfig::default()
        };
        let profile = create_test_profile(id);
        async move {
            ChatSession::start(
                Transport::connect(config, None),
                &StaticAuthProvider::new(profile),
                Arc::new(RecordingHistoryStore::default()),
                SessionConfig::default(),
            )
            .await
            .unwrap()
        }
    };
    let alice = connect("alice").await;
    alice.join_room("random").await;

    // when (操作):
    let bob = connect("bob").await;
    bob.join_room("random").await;

    // then (期待する結果):
    wait_for_view(&alice, |view| view.room_users.len() == 2).await;
    wait_for_view(&bob, |view| {
        view.active_users.iter().any(|u| u.id == "alice")
            && view.active_users.iter().any(|u| u.id == "bob")
    })
    .await;

    alice.close().await;
    bob.close().await;
}
