//! ChatCommand 定義
//!
//! クライアントから届いたイベントを検証済みの Domain Model に変換したもの。

use super::{
    entity::{MessageSender, TypingUser, UserProfile},
    value_object::{MessageContent, RoomId},
};

/// A validated client request, dispatched by the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Register (or refresh) the connection's presence.
    Announce(UserProfile),
    JoinRoom(RoomId),
    LeaveRoom(RoomId),
    SendMessage {
        room_id: RoomId,
        content: MessageContent,
        sender: MessageSender,
    },
    Typing {
        room_id: RoomId,
        user: TypingUser,
        is_typing: bool,
    },
}

impl ChatCommand {
    /// Wire-level name of the event this command was decoded from.
    pub fn name(&self) -> &'static str {
        match self {
            ChatCommand::Announce(_) => "user_connected",
            ChatCommand::JoinRoom(_) => "join_room",
            ChatCommand::LeaveRoom(_) => "leave_room",
            ChatCommand::SendMessage { .. } => "send_message",
            ChatCommand::Typing { .. } => "typing",
        }
    }
}
