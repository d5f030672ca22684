//! Integration tests: the server runs on an ephemeral port and is driven by
//! tokio-tungstenite clients.

use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use lounge_server::{
    infrastructure::{
        dto::websocket::{
            ClientEvent, MessageDto, MessageSenderDto, SendMessagePayload, ServerEvent,
            TypingPayload, TypingUserDto, UserProfileDto,
        },
        message_pusher::ChannelMessagePusher,
        repository::{InMemoryChatRepository, InMemoryHistoryRepository},
    },
    ui::Server,
    usecase::{ChatHub, GetRoomDetailUseCase, GetRoomsUseCase, HubOptions, MessageHistoryUseCase},
};
use lounge_shared::time::SystemClock;
use tokio::{net::TcpListener, sync::oneshot};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

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

    fn http_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn profile(id: &str) -> UserProfileDto {
    UserProfileDto {
        id: id.to_string(),
        name: id.to_uppercase(),
        email: format!("{}@example.com", id),
        avatar: String::new(),
        current_room: None,
    }
}

async fn send(socket: &mut Socket, event: ClientEvent) {
    let json = serde_json::to_string(&event).unwrap();
    socket.send(Message::Text(json.into())).await.unwrap();
}

/// Connect, announce and join `room`
async fn connect_and_join(server: &TestServer, user: &str, room: &str) -> Socket {
    let (mut socket, _) = connect_async(server.ws_url()).await.unwrap();
    send(&mut socket, ClientEvent::UserConnected(profile(user))).await;
    send(&mut socket, ClientEvent::JoinRoom(room.to_string())).await;
    socket
}

/// Read events until one named `name` arrives
async fn expect_event(socket: &mut Socket, name: &str) -> ServerEvent {
    let result = tokio::time::timeout(RECV_TIMEOUT, async {
        while let Some(frame) = socket.next().await {
            if let Ok(Message::Text(text)) = frame {
                let event: ServerEvent = serde_json::from_str(&text).unwrap();
                if event.name() == name {
                    return Some(event);
                }
            }
        }
        None
    })
    .await;
    match result {
        Ok(Some(event)) => event,
        _ => panic!("did not receive '{}' in time", name),
    }
}

/// Assert nothing named `name` arrives within a short window
async fn expect_silence(socket: &mut Socket, name: &str) {
    let result = tokio::time::timeout(Duration::from_millis(300), async {
        while let Some(frame) = socket.next().await {
            if let Ok(Message::Text(text)) = frame {
                let event: ServerEvent = serde_json::from_str(&text).unwrap();
                if event.name() == name {
                    return event;
                }
            }
        }
        std::future::pending().await
    })
    .await;
    if let Ok(event) = result {
        panic!("unexpected event: {:?}", event);
    }
}

fn roster_ids(event: ServerEvent) -> Vec<String> {
    match event {
        ServerEvent::RoomUsers(users) => users.into_iter().map(|u| u.id).collect(),
        other => panic!("expected room_users, got {:?}", other),
    }
}

fn message(event: ServerEvent) -> MessageDto {
    match event {
        ServerEvent::NewMessage(message) => message,
        other => panic!("expected new_message, got {:?}", other),
    }
}

#[tokio::test]
async fn test_join_send_leave_scenario() {
    // テスト項目: A と B が general に参加し、A の "hello" が両者に届き、B の退出が両者に通知される
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = connect_and_join(&server, "alice", "general").await;
    assert_eq!(roster_ids(expect_event(&mut alice, "room_users").await), vec!["alice"]);
    expect_event(&mut alice, "room_history").await;

    // when (操作): B が参加
    let mut bob = connect_and_join(&server, "bob", "general").await;

    // then (期待する結果):
    assert_eq!(
        roster_ids(expect_event(&mut alice, "room_users").await),
        vec!["alice", "bob"]
    );
    assert_eq!(
        roster_ids(expect_event(&mut bob, "room_users").await),
        vec!["alice", "bob"]
    );

    // when (操作): A が "hello" を送信
    send(
        &mut alice,
        ClientEvent::SendMessage(SendMessagePayload {
            room_id: "general".to_string(),
            content: "hello".to_string(),
            sender: MessageSenderDto {
                id: "alice".to_string(),
                name: "ALICE".to_string(),
                avatar: String::new(),
            },
        }),
    )
    .await;

    // then (期待する結果):
    let at_alice = message(expect_event(&mut alice, "new_message").await);
    let at_bob = message(expect_event(&mut bob, "new_message").await);
    assert_eq!(at_alice, at_bob);
    assert_eq!(at_alice.content, "hello");
    assert_eq!(at_alice.sender.id, "alice");
    assert!(at_alice.id.starts_with("msg-"));
    assert!(at_alice.timestamp > 0);
    expect_silence(&mut bob, "new_message").await;

    // when (操作): B が退出
    send(&mut bob, ClientEvent::LeaveRoom("general".to_string())).await;

    // then (期待する結果):
    assert_eq!(roster_ids(expect_event(&mut alice, "room_users").await), vec!["alice"]);
    assert_eq!(roster_ids(expect_event(&mut bob, "room_users").await), vec!["alice"]);
}

#[tokio::test]
async fn test_typing_is_relayed_to_others_only() {
    // テスト項目: 入力中の通知は他のメンバーにだけ届く
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = connect_and_join(&server, "alice", "general").await;
    expect_event(&mut alice, "room_history").await;
    let mut bob = connect_and_join(&server, "bob", "general").await;
    expect_event(&mut bob, "room_history").await;

    // when (操作):
    send(
        &mut alice,
        ClientEvent::Typing(TypingPayload {
            room_id: "general".to_string(),
            user: TypingUserDto {
                id: "alice".to_string(),
                name: "ALICE".to_string(),
            },
            is_typing: true,
        }),
    )
    .await;

    // then (期待する結果):
    match expect_event(&mut bob, "user_typing").await {
        ServerEvent::UserTyping(payload) => {
            assert_eq!(payload.user.id, "alice");
            assert!(payload.is_typing);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    expect_silence(&mut alice, "user_typing").await;
}

#[tokio::test]
async fn test_disconnect_updates_rosters_and_presence() {
    // テスト項目: 切断したユーザーはメンバー一覧とオンライン一覧から消える
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = connect_and_join(&server, "alice", "general").await;
    expect_event(&mut alice, "room_history").await;
    let bob = connect_and_join(&server, "bob", "general").await;
    assert_eq!(
        roster_ids(expect_event(&mut alice, "room_users").await),
        vec!["alice", "bob"]
    );

    // when (操作):
    drop(bob);

    // then (期待する結果):
    assert_eq!(roster_ids(expect_event(&mut alice, "room_users").await), vec!["alice"]);
    match expect_event(&mut alice, "active_users").await {
        ServerEvent::ActiveUsers(users) => {
            let ids: Vec<String> = users.into_iter().map(|u| u.id).collect();
            assert_eq!(ids, vec!["alice"]);
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_payload_is_not_broadcast() {
    // テスト項目: 必須フィールドのないメッセージは誰にも配信されない
    // given (前提条件):
    let server = TestServer::start().await;
    let mut alice = connect_and_join(&server, "alice", "general").await;
    expect_event(&mut alice, "room_history").await;

    // when (操作):
    alice
        .send(Message::Text(
            r#"{"event":"send_message","data":{"roomId":"general","content":"hi"}}"#.into(),
        ))
        .await
        .unwrap();

    // then (期待する結果):
    expect_silence(&mut alice, "new_message").await;
}

#[tokio::test]
async fn test_http_endpoints() {
    // テスト項目: ヘルスチェック、ルーム一覧、履歴ストアの HTTP エンドポイント
    // given (前提条件):
    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let mut alice = connect_and_join(&server, "alice", "general").await;
    expect_event(&mut alice, "room_history").await;

    // when (操作) / then (期待する結果):
    let health = client.get(server.http_url("/api/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);

    let rooms: serde_json::Value = client
        .get(server.http_url("/api/rooms"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rooms[0]["id"], "general");
    assert_eq!(rooms[0]["members"][0], "alice");

    let missing = client
        .get(server.http_url("/api/rooms/nowhere"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    let no_room = client
        .get(server.http_url("/api/messages"))
        .send()
        .await
        .unwrap();
    assert_eq!(no_room.status(), 400);

    let invalid = client
        .post(server.http_url("/api/messages"))
        .json(&serde_json::json!({"roomId": "general", "message": {"content": "hi"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), 400);

    let created = client
        .post(server.http_url("/api/messages"))
        .json(&serde_json::json!({
            "roomId": "general",
            "message": {"content": "hi", "sender": {"id": "alice", "name": "ALICE"}}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), 201);

    let history: serde_json::Value = client
        .get(server.http_url("/api/messages?roomId=general"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history["messages"][0]["content"], "hi");
    assert_eq!(history["messages"][0]["sender"]["id"], "alice");
}
