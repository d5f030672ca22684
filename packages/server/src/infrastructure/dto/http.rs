//! HTTP API DTOs.

use serde::{Deserialize, Serialize};

use super::websocket::{MessageDto, MessageSenderDto, UserProfileDto};

/// Entry of `GET /api/rooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummaryDto {
    pub id: String,
    pub name: String,
    pub members: Vec<String>,
    pub message_count: usize,
}

/// Body of `GET /api/rooms/{room_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetailDto {
    pub id: String,
    pub name: String,
    pub members: Vec<UserProfileDto>,
    pub messages: Vec<MessageDto>,
}

/// Query of `GET /api/messages`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesQuery {
    pub room_id: Option<String>,
}

/// Body of `GET /api/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageDto>,
}

/// Message block of `POST /api/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistMessageBody {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub sender: Option<MessageSenderDto>,
    /// Unix milliseconds; the server clock is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Body of `POST /api/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistMessageRequest {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub message: Option<PersistMessageBody>,
}

/// Response of `POST /api/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistMessageResponse {
    pub message: String,
    pub data: MessageDto,
}

/// Error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
