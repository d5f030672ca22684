//! In-memory HistoryRepository 実装

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ChatMessage, HistoryRepository, RoomId};

/// Room ごとのメッセージ履歴を保持するストア
#[derive(Default)]
pub struct InMemoryHistoryRepository {
    messages: Mutex<HashMap<RoomId, Vec<ChatMessage>>>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn fetch(&self, room_id: &RoomId) -> Vec<ChatMessage> {
        let messages = self.messages.lock().await;
        messages.get(room_id).cloned().unwrap_or_default()
    }

    async fn append(&self, message: ChatMessage) {
        let mut messages = self.messages.lock().await;
        messages
            .entry(message.room_id.clone())
            .or_default()
            .push(message);
    }
}
