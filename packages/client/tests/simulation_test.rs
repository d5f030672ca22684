//! Integration tests: two client contexts without a server, sharing one
//! storage medium.

use std::{sync::Arc, time::Duration};

use lounge_client::{
    auth::StaticAuthProvider,
    config::{SessionConfig, SimulationConfig, TransportConfig},
    history::NoopHistoryStore,
    session::{ChatSession, ChatView},
    simulation::storage::{FileStorage, MemoryStorageMedium, SharedStorage},
    transport::{Transport, state::TransportMode},
};
use lounge_server::infrastructure::dto::websocket::UserProfileDto;

const WAIT: Duration = Duration::from_secs(3);

fn create_test_profile(id: &str) -> UserProfileDto {
    UserProfileDto {
        id: id.to_string(),
        name: id.to_uppercase(),
        email: format!("{}@example.com", id),
        avatar: String::new(),
        current_room: None,
    }
}

async fn create_test_session(medium: &MemoryStorageMedium, id: &str) -> ChatSession {
    create_test_session_on(Arc::new(medium.handle()), id).await
}

async fn create_test_session_on(storage: Arc<dyn SharedStorage>, id: &str) -> ChatSession {
    let config = TransportConfig {
        force_simulation: true,
        ..TransportConfig::default()
    };
    let simulation = SimulationConfig::new(id, storage);
    let session = ChatSession::start(
        Transport::connect(config, Some(simulation)),
        &StaticAuthProvider::new(create_test_profile(id)),
        Arc::new(NoopHistoryStore),
        SessionConfig::default(),
    )
    .await
    .unwrap();
    tokio::time::timeout(WAIT, session.transport().connected())
        .await
        .unwrap();
    session
}

async fn wait_for_view(session: &ChatSession, check: impl FnMut(&ChatView) -> bool) {
    let mut view = session.watch();
    tokio::time::timeout(WAIT, view.wait_for(check))
        .await
        .expect("view did not reach the expected state")
        .unwrap();
}

fn roster_ids(view: &ChatView) -> Vec<String> {
    view.room_users.iter().map(|u| u.id.clone()).collect()
}

#[tokio::test]
async fn test_two_contexts_converge_without_a_server() {
    // テスト項目: サーバーなしでも、同じ共有ストレージの 2 つのコンテキストが名簿とメッセージで収束する
    // given (前提条件):
    let medium = MemoryStorageMedium::new();
    let alice = create_test_session(&medium, "alice").await;
    alice.join_room("general").await;
    wait_for_view(&alice, |view| roster_ids(view) == vec!["alice"]).await;

    let bob = create_test_session(&medium, "bob").await;
    bob.join_room("general").await;
    wait_for_view(&bob, |view| roster_ids(view).len() == 2).await;

    // when (操作):
    bob.send_message("general", "hello").await;

    // then (期待する結果):
    assert_eq!(alice.mode(), TransportMode::Simulated);
    assert_eq!(bob.mode(), TransportMode::Simulated);
    wait_for_view(&alice, |view| {
        roster_ids(view).contains(&"bob".to_string())
            && view
                .messages
                .iter()
                .any(|m| m.content == "hello" && m.sender.id == "bob")
    })
    .await;
    wait_for_view(&alice, |view| {
        view.active_users.iter().any(|u| u.id == "bob")
    })
    .await;
    let hellos = alice
        .messages()
        .into_iter()
        .filter(|m| m.content == "hello")
        .count();
    assert_eq!(hellos, 1);

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn test_two_file_contexts_converge() {
    // テスト項目: 同じディレクトリを共有する 2 つのファイルストレージのコンテキストが名簿・在席・メッセージで収束する
    // given (前提条件):
    let dir = std::env::temp_dir().join(format!("lounge-sim-{}", uuid::Uuid::new_v4().simple()));
    let create_test_storage = || -> Arc<dyn SharedStorage> {
        Arc::new(
            FileStorage::open(&dir)
                .unwrap()
                .with_poll_interval(Duration::from_millis(20)),
        )
    };
    let alice = create_test_session_on(create_test_storage(), "alice").await;
    alice.join_room("general").await;
    wait_for_view(&alice, |view| roster_ids(view) == vec!["alice"]).await;

    // when (操作):
    let bob = create_test_session_on(create_test_storage(), "bob").await;
    bob.join_room("general").await;
    wait_for_view(&bob, |view| roster_ids(view).len() == 2).await;
    bob.send_message("general", "hello").await;

    // then (期待する結果):
    wait_for_view(&alice, |view| {
        roster_ids(view).contains(&"bob".to_string())
            && view.active_users.iter().any(|u| u.id == "bob")
            && view
                .messages
                .iter()
                .any(|m| m.content == "hello" && m.sender.id == "bob")
    })
    .await;
    assert_eq!(alice.mode(), TransportMode::Simulated);

    alice.close().await;
    bob.close().await;
    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_typing_reaches_the_other_context() {
    // テスト項目: 別コンテキストの入力中通知が届き、入力終了で消える
    // given (前提条件):
    let medium = MemoryStorageMedium::new();
    let alice = create_test_session(&medium, "alice").await;
    alice.join_room("general").await;
    wait_for_view(&alice, |view| !view.room_users.is_empty()).await;
    let bob = create_test_session(&medium, "bob").await;
    bob.join_room("general").await;
    wait_for_view(&alice, |view| roster_ids(view).len() == 2).await;

    // when (操作):
    bob.start_typing("general");
    wait_for_view(&alice, |view| {
        view.user_typing.as_ref().is_some_and(|u| u.id == "bob")
    })
    .await;
    bob.stop_typing("general");

    // then (期待する結果):
    wait_for_view(&alice, |view| view.user_typing.is_none()).await;
    assert_eq!(bob.user_typing(), None);

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn test_closing_a_context_removes_it_from_the_other() {
    // テスト項目: 片方のコンテキストを閉じると、もう片方の名簿とオンライン一覧から消える
    // given (前提条件):
    let medium = MemoryStorageMedium::new();
    let alice = create_test_session(&medium, "alice").await;
    alice.join_room("general").await;
    wait_for_view(&alice, |view| !view.room_users.is_empty()).await;
    let bob = create_test_session(&medium, "bob").await;
    bob.join_room("general").await;
    wait_for_view(&alice, |view| roster_ids(view).len() == 2).await;

    // when (操作):
    bob.close().await;

    // then (期待する結果):
    wait_for_view(&alice, |view| {
        roster_ids(view) == vec!["alice"] && !view.active_users.iter().any(|u| u.id == "bob")
    })
    .await;

    alice.close().await;
}
