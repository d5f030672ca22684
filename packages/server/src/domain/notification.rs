//! Notification 定義
//!
//! Use case がクライアントへ配信する通知。ワイヤ形式への変換は
//! Infrastructure 層（`dto::conversion`）が担当する。

use super::{
    entity::{ChatMessage, TypingUser, UserProfile},
    value_object::RoomId,
};

/// Server-originated update delivered to one or more connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Full list of online users.
    ActiveUsers(Vec<UserProfile>),
    /// Full roster of one room.
    RoomUsers {
        room_id: RoomId,
        users: Vec<UserProfile>,
    },
    /// Backlog of a room, delivered to a joiner only.
    RoomHistory {
        room_id: RoomId,
        messages: Vec<ChatMessage>,
    },
    /// A freshly recorded message.
    NewMessage(ChatMessage),
    /// Typing state of another member.
    UserTyping {
        room_id: RoomId,
        user: TypingUser,
        is_typing: bool,
    },
}

impl Notification {
    /// Room this notification is scoped to, if any.
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Notification::ActiveUsers(_) => None,
            Notification::RoomUsers { room_id, .. }
            | Notification::RoomHistory { room_id, .. }
            | Notification::UserTyping { room_id, .. } => Some(room_id),
            Notification::NewMessage(message) => Some(&message.room_id),
        }
    }
}
