//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    domain::MessageSender,
    infrastructure::dto::{
        http::{
            ErrorResponse, MessagesQuery, MessagesResponse, PersistMessageRequest,
            PersistMessageResponse, RoomDetailDto, RoomSummaryDto,
        },
        websocket::MessageDto,
    },
    ui::state::AppState,
    usecase::{GetRoomDetailError, HistoryError},
};

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of rooms
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let rooms = state.get_rooms_usecase.execute().await;

    // Domain Model から DTO への変換
    let room_summaries: Vec<RoomSummaryDto> = rooms
        .into_iter()
        .map(|room| RoomSummaryDto {
            members: room
                .members
                .iter()
                .map(|m| m.id.as_str().to_string())
                .collect(),
            message_count: room.messages.len(),
            id: room.id.into_string(),
            name: room.name,
        })
        .collect();

    Json(room_summaries)
}

/// Get room detail by ID
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    match state.get_room_detail_usecase.execute(room_id).await {
        Ok(room) => {
            // Domain Model から DTO への変換
            let room_detail = RoomDetailDto {
                id: room.id.into_string(),
                name: room.name,
                members: room.members.into_iter().map(Into::into).collect(),
                messages: room.messages.into_iter().map(Into::into).collect(),
            };
            Ok(Json(room_detail))
        }
        Err(GetRoomDetailError::InvalidRoomId(_)) | Err(GetRoomDetailError::RoomNotFound(_)) => {
            Err(StatusCode::NOT_FOUND)
        }
    }
}

/// `GET /api/messages?roomId=...`
pub async fn get_messages(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MessagesQuery>,
) -> Response {
    match state.message_history_usecase.fetch(query.room_id).await {
        Ok(messages) => Json(MessagesResponse {
            messages: messages.into_iter().map(MessageDto::from).collect(),
        })
        .into_response(),
        Err(e) => {
            tracing::warn!("Rejected history fetch: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

/// `POST /api/messages`
pub async fn persist_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PersistMessageRequest>,
) -> Response {
    let (content, sender, timestamp) = match request.message {
        Some(body) => (body.content, body.sender, body.timestamp),
        None => (None, None, None),
    };
    let sender = match sender.map(MessageSender::try_from).transpose() {
        Ok(sender) => sender,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                HistoryError::InvalidFormat(e.to_string()).to_string(),
            );
        }
    };

    match state
        .message_history_usecase
        .persist(request.room_id, content, sender, timestamp)
        .await
    {
        Ok(message) => (
            StatusCode::CREATED,
            Json(PersistMessageResponse {
                message: "Message saved successfully".to_string(),
                data: message.into(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("Rejected history write: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}
