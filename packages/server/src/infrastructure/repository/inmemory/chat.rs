//! In-memory ChatRepository 実装
//!
//! Presence と Room の両方を 1 つの Mutex で保護する。
//! シミュレーション用のレプリカ操作（`replace_presence` / `replace_members` /
//! `import_message`）もここで提供する。

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{
    ChatMessage, ChatRepository, ConnectionId, DEFAULT_HISTORY_LIMIT, JoinOutcome, LeaveOutcome,
    MessageContent, MessageSender, PresenceChange, RepositoryError, Room, RoomId, Timestamp,
    UserId, UserProfile,
};

#[derive(Debug, Clone)]
struct PresenceEntry {
    connection_id: ConnectionId,
    profile: UserProfile,
}

#[derive(Debug, Default)]
struct ChatState {
    /// Announce order.
    presence: Vec<PresenceEntry>,
    rooms: BTreeMap<RoomId, Room>,
}

impl ChatState {
    fn entry_by_connection(&self, connection_id: &ConnectionId) -> Option<&PresenceEntry> {
        self.presence
            .iter()
            .find(|e| &e.connection_id == connection_id)
    }

    fn set_current_room(&mut self, user_id: &UserId, room: Option<RoomId>) {
        if let Some(entry) = self.presence.iter_mut().find(|e| &e.profile.id == user_id) {
            entry.profile.current_room = room;
        }
    }

    fn connections_for(&self, room: &Room) -> Vec<ConnectionId> {
        room.members
            .iter()
            .filter_map(|member| {
                self.presence
                    .iter()
                    .find(|e| e.profile.id == member.id)
                    .map(|e| e.connection_id.clone())
            })
            .collect()
    }
}

/// In-memory ChatRepository
pub struct InMemoryChatRepository {
    state: Mutex<ChatState>,
    history_limit: usize,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Repository whose rooms keep at most `history_limit` messages.
    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            state: Mutex::new(ChatState::default()),
            history_limit: history_limit.max(1),
        }
    }

    fn new_room(&self, room_id: RoomId, name: Option<String>) -> Room {
        let room = match name {
            Some(name) => Room::with_name(room_id, name),
            None => Room::new(room_id),
        };
        room.with_history_limit(self.history_limit)
    }

    /// Create a room unless it exists. Returns `true` when it was created.
    pub async fn ensure_room(&self, room_id: RoomId, name: Option<String>) -> bool {
        let mut state = self.state.lock().await;
        if state.rooms.contains_key(&room_id) {
            return false;
        }
        let room = self.new_room(room_id.clone(), name);
        state.rooms.insert(room_id, room);
        true
    }

    /// Insert a message recorded by another owner. Returns `false` when the
    /// message id is already held.
    pub async fn import_message(&self, message: ChatMessage) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let room = state
            .rooms
            .get_mut(&message.room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(message.room_id.to_string()))?;
        Ok(room.import_message(message))
    }

    /// Overwrite the presence list with a replicated slice.
    ///
    /// Users that already have a local binding keep their connection; the
    /// others are bound to a connection named after their user id.
    pub async fn replace_presence(&self, profiles: Vec<UserProfile>) {
        let mut state = self.state.lock().await;
        let mut presence: Vec<PresenceEntry> = Vec::with_capacity(profiles.len());
        for profile in profiles {
            if presence.iter().any(|e| e.profile.id == profile.id) {
                continue;
            }
            let existing = state
                .presence
                .iter()
                .find(|e| e.profile.id == profile.id)
                .map(|e| e.connection_id.clone());
            let connection_id = match existing {
                Some(id) => id,
                None => match ConnectionId::new(profile.id.as_str().to_string()) {
                    Ok(id) => id,
                    Err(_) => continue,
                },
            };
            presence.push(PresenceEntry {
                connection_id,
                profile,
            });
        }
        state.presence = presence;
    }

    /// Overwrite a room roster with a replicated slice, creating the room if needed.
    pub async fn replace_members(&self, room_id: &RoomId, members: Vec<UserProfile>) {
        let mut state = self.state.lock().await;
        if !state.rooms.contains_key(room_id) {
            let room = self.new_room(room_id.clone(), None);
            state.rooms.insert(room_id.clone(), room);
        }
        if let Some(room) = state.rooms.get_mut(room_id) {
            room.members.clear();
            for member in members {
                room.add_member(member);
            }
        }
    }
}

impl Default for InMemoryChatRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn bind_presence(
        &self,
        connection_id: ConnectionId,
        mut profile: UserProfile,
    ) -> PresenceChange {
        let mut state = self.state.lock().await;
        let mut change = PresenceChange::default();

        // 同じユーザーの既存バインドは置き換える
        if let Some(pos) = state.presence.iter().position(|e| e.profile.id == profile.id) {
            let previous = state.presence.remove(pos);
            profile.current_room = previous.profile.current_room.clone();
            if previous.connection_id != connection_id {
                change.replaced_connection = Some(previous.connection_id);
            }
        } else {
            profile.current_room = None;
        }
        // この接続が別ユーザーとして名乗っていた場合はそのバインドを外す
        state.presence.retain(|e| e.connection_id != connection_id);

        for room in state.rooms.values_mut() {
            if let Some(member) = room.members.iter_mut().find(|m| m.id == profile.id) {
                let refreshed = UserProfile {
                    current_room: member.current_room.clone(),
                    ..profile.clone()
                };
                if *member != refreshed {
                    *member = refreshed;
                    change.refreshed_rooms.push(room.id.clone());
                }
            }
        }

        state.presence.push(PresenceEntry {
            connection_id,
            profile,
        });
        change
    }

    async fn remove_presence(&self, connection_id: &ConnectionId) -> Option<UserProfile> {
        let mut state = self.state.lock().await;
        let pos = state
            .presence
            .iter()
            .position(|e| &e.connection_id == connection_id)?;
        Some(state.presence.remove(pos).profile)
    }

    async fn profile_of(&self, connection_id: &ConnectionId) -> Option<UserProfile> {
        let state = self.state.lock().await;
        state
            .entry_by_connection(connection_id)
            .map(|e| e.profile.clone())
    }

    async fn connection_of(&self, user_id: &UserId) -> Option<ConnectionId> {
        let state = self.state.lock().await;
        state
            .presence
            .iter()
            .find(|e| &e.profile.id == user_id)
            .map(|e| e.connection_id.clone())
    }

    async fn active_users(&self) -> Vec<UserProfile> {
        let state = self.state.lock().await;
        state.presence.iter().map(|e| e.profile.clone()).collect()
    }

    async fn join_room(
        &self,
        room_id: &RoomId,
        profile: UserProfile,
        create_if_missing: bool,
    ) -> Result<JoinOutcome, RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.rooms.contains_key(room_id) {
            if !create_if_missing {
                return Err(RepositoryError::RoomNotFound(room_id.to_string()));
            }
            let room = self.new_room(room_id.clone(), None);
            state.rooms.insert(room_id.clone(), room);
            tracing::debug!("Room '{}' created on first join", room_id);
        }

        state.set_current_room(&profile.id, Some(room_id.clone()));
        let member = UserProfile {
            current_room: Some(room_id.clone()),
            ..profile
        };
        let room = state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.to_string()))?;
        let newly_joined = room.add_member(member);

        Ok(JoinOutcome {
            room_id: room.id.clone(),
            room_name: room.name.clone(),
            roster: room.members.clone(),
            history: room.messages.clone(),
            newly_joined,
        })
    }

    async fn leave_room(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<LeaveOutcome, RepositoryError> {
        let mut state = self.state.lock().await;
        let room = state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.to_string()))?;
        let removed = room.remove_member(user_id);
        let roster = room.members.clone();

        let in_this_room = state
            .presence
            .iter()
            .any(|e| &e.profile.id == user_id && e.profile.current_room.as_ref() == Some(room_id));
        if in_this_room {
            state.set_current_room(user_id, None);
        }

        Ok(LeaveOutcome {
            room_id: room_id.clone(),
            roster,
            removed,
        })
    }

    async fn leave_all_rooms(&self, user_id: &UserId) -> Vec<LeaveOutcome> {
        let mut state = self.state.lock().await;
        let outcomes: Vec<LeaveOutcome> = state
            .rooms
            .values_mut()
            .filter_map(|room| {
                room.remove_member(user_id).then(|| LeaveOutcome {
                    room_id: room.id.clone(),
                    roster: room.members.clone(),
                    removed: true,
                })
            })
            .collect();
        state.set_current_room(user_id, None);
        outcomes
    }

    async fn append_message(
        &self,
        room_id: &RoomId,
        content: MessageContent,
        sender: MessageSender,
        now: Timestamp,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut state = self.state.lock().await;
        let room = state
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.to_string()))?;
        Ok(room.post(content, sender, now))
    }

    async fn room_connections(
        &self,
        room_id: &RoomId,
    ) -> Result<Vec<ConnectionId>, RepositoryError> {
        let state = self.state.lock().await;
        let room = state
            .rooms
            .get(room_id)
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.to_string()))?;
        Ok(state.connections_for(room))
    }

    async fn get_room(&self, room_id: &RoomId) -> Result<Room, RepositoryError> {
        let state = self.state.lock().await;
        state
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| RepositoryError::RoomNotFound(room_id.to_string()))
    }

    async fn list_rooms(&self) -> Vec<Room> {
        let state = self.state.lock().await;
        state.rooms.values().cloned().collect()
    }
}
