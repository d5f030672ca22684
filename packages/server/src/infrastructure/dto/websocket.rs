//! WebSocket wire format.
//!
//! Every frame is a JSON text frame `{"event": "<name>", "data": <payload>}`.
//! Payload field names are camelCase.

use serde::{Deserialize, Serialize};

/// User profile as it travels on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_room: Option<String>,
}

/// Sender block of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSenderDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub avatar: String,
}

/// A recorded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDto {
    pub id: String,
    pub room_id: String,
    pub content: String,
    pub sender: MessageSenderDto,
    /// Unix milliseconds.
    pub timestamp: i64,
}

/// User block of a typing signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingUserDto {
    pub id: String,
    pub name: String,
}

/// `send_message` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub room_id: String,
    pub content: String,
    pub sender: MessageSenderDto,
}

/// `typing` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub room_id: String,
    pub user: TypingUserDto,
    pub is_typing: bool,
}

/// `user_typing` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingPayload {
    pub user: TypingUserDto,
    pub is_typing: bool,
}

/// Client → server events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    UserConnected(UserProfileDto),
    JoinRoom(String),
    LeaveRoom(String),
    SendMessage(SendMessagePayload),
    Typing(TypingPayload),
}

impl ClientEvent {
    /// Wire-level event name.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::UserConnected(_) => "user_connected",
            ClientEvent::JoinRoom(_) => "join_room",
            ClientEvent::LeaveRoom(_) => "leave_room",
            ClientEvent::SendMessage(_) => "send_message",
            ClientEvent::Typing(_) => "typing",
        }
    }
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ActiveUsers(Vec<UserProfileDto>),
    RoomUsers(Vec<UserProfileDto>),
    RoomHistory(Vec<MessageDto>),
    NewMessage(MessageDto),
    UserTyping(UserTypingPayload),
}

impl ServerEvent {
    /// Wire-level event name.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ActiveUsers(_) => "active_users",
            ServerEvent::RoomUsers(_) => "room_users",
            ServerEvent::RoomHistory(_) => "room_history",
            ServerEvent::NewMessage(_) => "new_message",
            ServerEvent::UserTyping(_) => "user_typing",
        }
    }
}
