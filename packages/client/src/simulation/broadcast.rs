//! Cross-context broadcast channel.
//!
//! Envelopes are written as complete documents to the `chat_broadcast` key of
//! a [`SharedStorage`]. Subscribers in the same context receive every publish
//! through a tokio broadcast channel; other contexts read them from storage
//! change notifications.

use std::sync::{Arc, Mutex};

use lounge_shared::time::Clock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ChannelError;

use super::storage::{SharedStorage, StorageWatch};

/// Storage key carrying the last published envelope.
pub const BROADCAST_KEY: &str = "chat_broadcast";

const LOCAL_CAPACITY: usize = 256;

/// Envelope topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Complete presence list
    ActiveUsers,
    /// Complete roster of one room
    RoomUsers,
    /// One recorded message
    NewMessage,
    /// Typing signal of one user
    UserTyping,
    /// A context came online
    ContextConnected,
}

/// Sender block of an envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeSender {
    pub id: String,
}

/// Unit of cross-context propagation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub topic: Topic,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Unix milliseconds, strictly increasing per writer
    pub timestamp: i64,
    pub sender: EnvelopeSender,
}

impl Envelope {
    /// Decode the payload
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// Broadcast channel of one context
pub struct BroadcastChannel {
    identity: String,
    storage: Arc<dyn SharedStorage>,
    clock: Arc<dyn Clock>,
    local: broadcast::Sender<Envelope>,
    last_published: Mutex<i64>,
}

impl BroadcastChannel {
    pub fn new(
        identity: impl Into<String>,
        storage: Arc<dyn SharedStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (local, _) = broadcast::channel(LOCAL_CAPACITY);
        Self {
            identity: identity.into(),
            storage,
            clock,
            local,
            last_published: Mutex::new(i64::MIN),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    fn next_timestamp(&self) -> i64 {
        let mut last = self
            .last_published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let next = self.clock.now_millis().max(last.saturating_add(1));
        *last = next;
        next
    }

    /// Publish one envelope to every context
    pub async fn publish<T: Serialize + ?Sized>(
        &self,
        topic: Topic,
        room_id: Option<&str>,
        payload: &T,
    ) -> Result<Envelope, ChannelError> {
        let envelope = Envelope {
            topic,
            room_id: room_id.map(str::to_string),
            payload: serde_json::to_value(payload)?,
            timestamp: self.next_timestamp(),
            sender: EnvelopeSender {
                id: self.identity.clone(),
            },
        };
        let json = serde_json::to_string(&envelope)?;
        self.storage.set(BROADCAST_KEY, &json).await?;
        // No local subscriber is not an error.
        let _ = self.local.send(envelope.clone());
        tracing::debug!("Published {:?} envelope at {}", topic, envelope.timestamp);
        Ok(envelope)
    }

    /// Same-context subscription to one topic
    pub fn subscribe(&self, topic: Topic) -> TopicSubscription {
        TopicSubscription {
            topic,
            receiver: self.local.subscribe(),
        }
    }

    /// Same-context subscription to every topic
    pub fn subscribe_all(&self) -> broadcast::Receiver<Envelope> {
        self.local.subscribe()
    }

    /// Envelopes published by other contexts
    pub fn remote(&self) -> RemoteEnvelopes {
        RemoteEnvelopes {
            identity: self.identity.clone(),
            changes: self.storage.watch(BROADCAST_KEY),
            last_processed: i64::MIN,
        }
    }
}

/// Same-context subscription filtered by topic
pub struct TopicSubscription {
    topic: Topic,
    receiver: broadcast::Receiver<Envelope>,
}

impl TopicSubscription {
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) if envelope.topic == self.topic => return Some(envelope),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        "Local {:?} subscriber skipped {} envelopes",
                        self.topic,
                        skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Envelopes from other contexts, oldest-first, without own or stale ones
pub struct RemoteEnvelopes {
    identity: String,
    changes: StorageWatch,
    last_processed: i64,
}

impl RemoteEnvelopes {
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            let raw = self.changes.recv().await?;
            if let Some(envelope) = self.accept(&raw) {
                return Some(envelope);
            }
        }
    }

    fn accept(&mut self, raw: &str) -> Option<Envelope> {
        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Dropping unreadable envelope: {}", e);
                return None;
            }
        };
        if envelope.sender.id == self.identity {
            return None;
        }
        if envelope.timestamp < self.last_processed {
            tracing::debug!(
                "Dropping stale {:?} envelope from '{}'",
                envelope.topic,
                envelope.sender.id
            );
            return None;
        }
        self.last_processed = envelope.timestamp;
        Some(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::storage::MemoryStorageMedium;
    use lounge_shared::time::FixedClock;

    fn create_test_channel(
        medium: &MemoryStorageMedium,
        identity: &str,
        now: i64,
    ) -> BroadcastChannel {
        BroadcastChannel::new(
            identity,
            Arc::new(medium.handle()),
            Arc::new(FixedClock::new(now)),
        )
    }

    #[tokio::test]
    async fn test_publish_reaches_other_context() {
        // テスト項目: publish した封筒が他のコンテキストに届く
        // given (前提条件):
        let medium = MemoryStorageMedium::new();
        let a = create_test_channel(&medium, "ctx-a", 1_000);
        let b = create_test_channel(&medium, "ctx-b", 1_000);
        let mut remote = b.remote();

        // when (操作):
        a.publish(Topic::RoomUsers, Some("general"), &vec!["alice"])
            .await
            .unwrap();

        // then (期待する結果):
        let envelope = remote.recv().await.unwrap();
        assert_eq!(envelope.topic, Topic::RoomUsers);
        assert_eq!(envelope.room_id.as_deref(), Some("general"));
        assert_eq!(envelope.sender.id, "ctx-a");
        assert_eq!(envelope.decode::<Vec<String>>().unwrap(), vec!["alice"]);
    }

    #[tokio::test]
    async fn test_own_timestamps_strictly_increase() {
        // テスト項目: 同じ時刻に連続で publish しても封筒のタイムスタンプは単調増加
        // given (前提条件):
        let medium = MemoryStorageMedium::new();
        let a = create_test_channel(&medium, "ctx-a", 5_000);

        // when (操作):
        let first = a.publish(Topic::ActiveUsers, None, &()).await.unwrap();
        let second = a.publish(Topic::ActiveUsers, None, &()).await.unwrap();

        // then (期待する結果):
        assert_eq!(first.timestamp, 5_000);
        assert_eq!(second.timestamp, 5_001);
    }

    #[tokio::test]
    async fn test_local_subscribers_receive_by_topic() {
        // テスト項目: 同じコンテキストの購読者はトピックごとに受け取れる
        // given (前提条件):
        let medium = MemoryStorageMedium::new();
        let a = create_test_channel(&medium, "ctx-a", 1_000);
        let mut typing = a.subscribe(Topic::UserTyping);
        let mut all = a.subscribe_all();

        // when (操作):
        a.publish(Topic::ActiveUsers, None, &()).await.unwrap();
        a.publish(Topic::UserTyping, Some("general"), &()).await.unwrap();

        // then (期待する結果):
        assert_eq!(typing.recv().await.unwrap().topic, Topic::UserTyping);
        assert_eq!(all.recv().await.unwrap().topic, Topic::ActiveUsers);
        assert_eq!(all.recv().await.unwrap().topic, Topic::UserTyping);
    }

    #[test]
    fn test_remote_ignores_own_and_stale_envelopes() {
        // テスト項目: 自分の封筒と、最後に処理したものより古い封筒は無視される
        // given (前提条件):
        let medium = MemoryStorageMedium::new();
        let storage = medium.handle();
        let mut remote = RemoteEnvelopes {
            identity: "ctx-b".to_string(),
            changes: storage.watch(BROADCAST_KEY),
            last_processed: i64::MIN,
        };
        let envelope = |sender: &str, timestamp: i64| {
            serde_json::to_string(&Envelope {
                topic: Topic::NewMessage,
                room_id: Some("general".to_string()),
                payload: serde_json::Value::Null,
                timestamp,
                sender: EnvelopeSender {
                    id: sender.to_string(),
                },
            })
            .unwrap()
        };

        // when (操作):
        let newer = remote.accept(&envelope("ctx-a", 2_000));
        let older = remote.accept(&envelope("ctx-c", 1_500));
        let own = remote.accept(&envelope("ctx-b", 3_000));
        let same_time = remote.accept(&envelope("ctx-c", 2_000));

        // then (期待する結果):
        assert!(newer.is_some());
        assert!(older.is_none());
        assert!(own.is_none());
        assert!(same_time.is_some());
    }

    #[test]
    fn test_envelope_wire_format() {
        // テスト項目: 封筒は type / roomId / payload / timestamp / sender.id で表現される
        // given (前提条件):
        let json = r#"{"type":"user_typing","roomId":"general","payload":{"isTyping":true},"timestamp":42,"sender":{"id":"ctx-a"}}"#;

        // when (操作):
        let envelope: Envelope = serde_json::from_str(json).unwrap();

        // then (期待する結果):
        assert_eq!(envelope.topic, Topic::UserTyping);
        assert_eq!(envelope.room_id.as_deref(), Some("general"));
        assert_eq!(envelope.payload["isTyping"], true);
        assert_eq!(serde_json::to_string(&envelope).unwrap(), json);
    }
}
