//! Conversion logic between DTOs and domain models.
//!
//! Inbound DTOs are validated here; anything that fails becomes a
//! `MalformedPayload` and never reaches the use cases.

use thiserror::Error;

use crate::domain::{
    ChatCommand, ChatMessage, MessageContent, MessageId, MessageSender, Notification, RoomId,
    Timestamp, TypingUser, UserId, UserProfile, ValueObjectError,
};

use super::websocket::{
    ClientEvent, MessageDto, MessageSenderDto, ServerEvent, TypingUserDto, UserProfileDto,
    UserTypingPayload,
};

/// A payload that decoded but does not satisfy the domain rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {event} payload: {source}")]
pub struct MalformedPayload {
    pub event: &'static str,
    #[source]
    pub source: ValueObjectError,
}

impl MalformedPayload {
    fn new(event: &'static str) -> impl FnOnce(ValueObjectError) -> Self {
        move |source| Self { event, source }
    }
}

// ========================================
// DTO → Domain Model
// ========================================

impl TryFrom<UserProfileDto> for UserProfile {
    type Error = ValueObjectError;

    fn try_from(dto: UserProfileDto) -> Result<Self, Self::Error> {
        let mut profile = UserProfile::new(UserId::new(dto.id)?, dto.name, dto.email, dto.avatar);
        profile.current_room = dto.current_room.map(RoomId::new).transpose()?;
        Ok(profile)
    }
}

impl TryFrom<MessageSenderDto> for MessageSender {
    type Error = ValueObjectError;

    fn try_from(dto: MessageSenderDto) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(dto.id)?,
            name: dto.name,
            avatar: dto.avatar,
        })
    }
}

impl TryFrom<TypingUserDto> for TypingUser {
    type Error = ValueObjectError;

    fn try_from(dto: TypingUserDto) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(dto.id)?,
            name: dto.name,
        })
    }
}

impl TryFrom<MessageDto> for ChatMessage {
    type Error = ValueObjectError;

    fn try_from(dto: MessageDto) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MessageId::new(dto.id)?,
            room_id: RoomId::new(dto.room_id)?,
            content: MessageContent::new(dto.content)?,
            sender: MessageSender::try_from(dto.sender)?,
            timestamp: Timestamp::new(dto.timestamp),
        })
    }
}

impl TryFrom<ClientEvent> for ChatCommand {
    type Error = MalformedPayload;

    fn try_from(event: ClientEvent) -> Result<Self, Self::Error> {
        let name = event.name();
        let malformed = MalformedPayload::new(name);
        match event {
            ClientEvent::UserConnected(profile) => {
                // currentRoom is owned by the server
                let profile = UserProfileDto {
                    current_room: None,
                    ..profile
                };
                UserProfile::try_from(profile)
                    .map(ChatCommand::Announce)
                    .map_err(malformed)
            }
            ClientEvent::JoinRoom(room_id) => RoomId::new(room_id)
                .map(ChatCommand::JoinRoom)
                .map_err(malformed),
            ClientEvent::LeaveRoom(room_id) => RoomId::new(room_id)
                .map(ChatCommand::LeaveRoom)
                .map_err(malformed),
            ClientEvent::SendMessage(payload) => {
                let decode = || -> Result<ChatCommand, ValueObjectError> {
                    Ok(ChatCommand::SendMessage {
                        room_id: RoomId::new(payload.room_id)?,
                        content: MessageContent::new(payload.content)?,
                        sender: MessageSender::try_from(payload.sender)?,
                    })
                };
                decode().map_err(malformed)
            }
            ClientEvent::Typing(payload) => {
                let decode = || -> Result<ChatCommand, ValueObjectError> {
                    Ok(ChatCommand::Typing {
                        room_id: RoomId::new(payload.room_id)?,
                        user: TypingUser::try_from(payload.user)?,
                        is_typing: payload.is_typing,
                    })
                };
                decode().map_err(malformed)
            }
        }
    }
}

// ========================================
// Domain Model → DTO
// ========================================

impl From<UserProfile> for UserProfileDto {
    fn from(model: UserProfile) -> Self {
        Self {
            id: model.id.into_string(),
            name: model.name,
            email: model.email,
            avatar: model.avatar,
            current_room: model.current_room.map(RoomId::into_string),
        }
    }
}

impl From<MessageSender> for MessageSenderDto {
    fn from(model: MessageSender) -> Self {
        Self {
            id: model.id.into_string(),
            name: model.name,
            avatar: model.avatar,
        }
    }
}

impl From<TypingUser> for TypingUserDto {
    fn from(model: TypingUser) -> Self {
        Self {
            id: model.id.into_string(),
            name: model.name,
        }
    }
}

impl From<ChatMessage> for MessageDto {
    fn from(model: ChatMessage) -> Self {
        Self {
            id: model.id.into_string(),
            room_id: model.room_id.into_string(),
            content: model.content.into_string(),
            sender: model.sender.into(),
            timestamp: model.timestamp.value(),
        }
    }
}

impl From<Notification> for ServerEvent {
    fn from(notification: Notification) -> Self {
        match notification {
            Notification::ActiveUsers(users) => {
                ServerEvent::ActiveUsers(users.into_iter().map(Into::into).collect())
            }
            Notification::RoomUsers { users, .. } => {
                ServerEvent::RoomUsers(users.into_iter().map(Into::into).collect())
            }
            Notification::RoomHistory { messages, .. } => {
                ServerEvent::RoomHistory(messages.into_iter().map(Into::into).collect())
            }
            Notification::NewMessage(message) => ServerEvent::NewMessage(message.into()),
            Notification::UserTyping {
                user, is_typing, ..
            } => ServerEvent::UserTyping(UserTypingPayload {
                user: user.into(),
                is_typing,
            }),
        }
    }
}
