//! Domain layer: value objects, entities, and the traits the use cases depend on.

pub mod command;
pub mod entity;
pub mod error;
pub mod message_pusher;
pub mod notification;
pub mod repository;
pub mod value_object;

pub use command::ChatCommand;
pub use entity::{
    ChatMessage, DEFAULT_HISTORY_LIMIT, MessageSender, Room, TypingUser, UserProfile,
};
pub use error::{MessagePushError, RepositoryError, ValueObjectError};
pub use message_pusher::{MessagePusher, PusherChannel};
pub use notification::Notification;
pub use repository::{
    ChatRepository, HistoryRepository, JoinOutcome, LeaveOutcome, PresenceChange,
};
pub use value_object::{
    ConnectionId, MESSAGE_CONTENT_MAX_LEN, MessageContent, MessageId, RoomId, SYSTEM_USER_ID, Timestamp,
    UserId,
};

#[cfg(test)]
pub use message_pusher::MockMessagePusher;
