//! Shared snapshot of the simulated backend state.
//!
//! Every context overwrites the whole snapshot after a local mutation. A
//! context that comes online restores from it.

use lounge_server::{
    domain::{ChatMessage, ChatRepository, RoomId, UserProfile},
    infrastructure::{
        dto::websocket::{MessageDto, UserProfileDto},
        repository::InMemoryChatRepository,
    },
};
use serde::{Deserialize, Serialize};

use crate::error::SimulationError;

use super::storage::SharedStorage;

/// Storage key of the snapshot.
pub const SNAPSHOT_KEY: &str = "shared_chat_state";

/// One room of the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub users: Vec<UserProfileDto>,
    #[serde(default)]
    pub messages: Vec<MessageDto>,
}

/// Complete simulated backend state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedSnapshot {
    #[serde(default)]
    pub active_users: Vec<UserProfileDto>,
    #[serde(default)]
    pub rooms: Vec<RoomSnapshot>,
}

/// Read the snapshot. An unreadable document counts as absent.
pub async fn load(storage: &dyn SharedStorage) -> Result<Option<SharedSnapshot>, SimulationError> {
    let Some(raw) = storage.get(SNAPSHOT_KEY).await? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) => {
            tracing::warn!("Ignoring unreadable shared snapshot: {}", e);
            Ok(None)
        }
    }
}

/// Overwrite the snapshot
pub async fn save(
    storage: &dyn SharedStorage,
    snapshot: &SharedSnapshot,
) -> Result<(), SimulationError> {
    let raw = serde_json::to_string(snapshot)?;
    storage.set(SNAPSHOT_KEY, &raw).await?;
    Ok(())
}

/// Capture the state of a repository
pub async fn capture(repository: &InMemoryChatRepository) -> SharedSnapshot {
    let active_users = repository
        .active_users()
        .await
        .into_iter()
        .map(UserProfileDto::from)
        .collect();
    let rooms = repository
        .list_rooms()
        .await
        .into_iter()
        .map(|room| RoomSnapshot {
            id: room.id.into_string(),
            name: room.name,
            users: room.members.into_iter().map(UserProfileDto::from).collect(),
            messages: room.messages.into_iter().map(MessageDto::from).collect(),
        })
        .collect();
    SharedSnapshot {
        active_users,
        rooms,
    }
}

fn profiles(dtos: Vec<UserProfileDto>) -> Vec<UserProfile> {
    dtos.into_iter()
        .filter_map(|dto| match UserProfile::try_from(dto) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("Skipping invalid profile in snapshot: {}", e);
                None
            }
        })
        .collect()
}

/// Load a snapshot into a repository. Invalid entries are skipped.
pub async fn restore(repository: &InMemoryChatRepository, snapshot: SharedSnapshot) {
    for room in snapshot.rooms {
        let room_id = match RoomId::new(room.id) {
            Ok(room_id) => room_id,
            Err(e) => {
                tracing::warn!("Skipping invalid room in snapshot: {}", e);
                continue;
            }
        };
        repository.ensure_room(room_id.clone(), Some(room.name)).await;
        repository
            .replace_members(&room_id, profiles(room.users))
            .await;
        for dto in room.messages {
            match ChatMessage::try_from(dto) {
                Ok(message) => {
                    if let Err(e) = repository.import_message(message).await {
                        tracing::warn!("Skipping message in snapshot: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Skipping invalid message in snapshot: {}", e),
            }
        }
    }
    repository
        .replace_presence(profiles(snapshot.active_users))
        .await;
}
