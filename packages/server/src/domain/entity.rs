//! Entity 定義
//!
//! - `UserProfile`: 接続中ユーザーのプロフィール
//! - `ChatMessage`: Room に記録されたメッセージ
//! - `Room`: メンバーとメッセージログを持つチャットルーム

use super::value_object::{MessageContent, MessageId, RoomId, Timestamp, UserId};

/// Profile of an online user, as asserted by the authentication collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub avatar: String,
    /// Room the user most recently joined and has not left.
    pub current_room: Option<RoomId>,
}

impl UserProfile {
    pub fn new(id: UserId, name: String, email: String, avatar: String) -> Self {
        Self {
            id,
            name,
            email,
            avatar,
            current_room: None,
        }
    }

    /// Sender view of this profile, attached to the messages it posts.
    pub fn as_sender(&self) -> MessageSender {
        MessageSender {
            id: self.id.clone(),
            name: self.name.clone(),
            avatar: self.avatar.clone(),
        }
    }

    /// Typing view of this profile.
    pub fn as_typing_user(&self) -> TypingUser {
        TypingUser {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// Sender block embedded in every message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSender {
    pub id: UserId,
    pub name: String,
    pub avatar: String,
}

/// User block embedded in typing signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingUser {
    pub id: UserId,
    pub name: String,
}

/// A message recorded in a room's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub content: MessageContent,
    pub sender: MessageSender,
    pub timestamp: Timestamp,
}

/// Default number of messages a room keeps.
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// A chat room: members (by user id, join order) and an ordered message log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub members: Vec<UserProfile>,
    pub messages: Vec<ChatMessage>,
    history_limit: usize,
}

impl Room {
    /// Create an empty room named after its id.
    pub fn new(id: RoomId) -> Self {
        let name = id.default_display_name();
        Self::with_name(id, name)
    }

    pub fn with_name(id: RoomId, name: String) -> Self {
        Self {
            id,
            name,
            members: Vec::new(),
            messages: Vec::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Set the number of messages kept; older ones are dropped first.
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit.max(1);
        self.trim_history();
        self
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.iter().any(|m| &m.id == user_id)
    }

    /// Add a member. Returns `false` (and refreshes the stored profile) when
    /// the user is already a member.
    pub fn add_member(&mut self, profile: UserProfile) -> bool {
        match self.members.iter_mut().find(|m| m.id == profile.id) {
            Some(existing) => {
                *existing = profile;
                false
            }
            None => {
                self.members.push(profile);
                true
            }
        }
    }

    /// Remove a member. Returns `false` when the user was not a member.
    pub fn remove_member(&mut self, user_id: &UserId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| &m.id != user_id);
        self.members.len() != before
    }

    pub fn member_ids(&self) -> Vec<UserId> {
        self.members.iter().map(|m| m.id.clone()).collect()
    }

    /// Timestamp of the newest message, if any.
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.messages.last().map(|m| m.timestamp)
    }

    /// Record a new message.
    ///
    /// The stored timestamp is `max(now, newest timestamp in the room)` so the
    /// log stays monotonic even if the clock steps backwards.
    pub fn post(
        &mut self,
        content: MessageContent,
        sender: MessageSender,
        now: Timestamp,
    ) -> ChatMessage {
        let timestamp = match self.last_timestamp() {
            Some(last) if last > now => last,
            _ => now,
        };
        let message = ChatMessage {
            id: MessageId::generate(),
            room_id: self.id.clone(),
            content,
            sender,
            timestamp,
        };
        self.messages.push(message.clone());
        self.trim_history();
        message
    }

    /// Insert a message recorded elsewhere (replica import).
    ///
    /// Returns `false` if a message with the same id is already held. The log
    /// stays ordered by timestamp; equal timestamps keep arrival order.
    pub fn import_message(&mut self, message: ChatMessage) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        let position = self
            .messages
            .iter()
            .rposition(|m| m.timestamp <= message.timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.messages.insert(position, message);
        self.trim_history();
        true
    }

    fn trim_history(&mut self) {
        if self.messages.len() > self.history_limit {
            let excess = self.messages.len() - self.history_limit;
            self.messages.drain(..excess);
        }
    }
}
