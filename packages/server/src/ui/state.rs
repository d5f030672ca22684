//! Server state shared by the handlers.

use std::sync::Arc;

use crate::usecase::{ChatHub, GetRoomDetailUseCase, GetRoomsUseCase, MessageHistoryUseCase};

/// Shared application state
pub struct AppState {
    /// ChatHub（Presence / Room / Message の状態の持ち主）
    pub hub: Arc<ChatHub>,
    /// GetRoomsUseCase（ルーム一覧取得のユースケース）
    pub get_rooms_usecase: Arc<GetRoomsUseCase>,
    /// GetRoomDetailUseCase（ルーム詳細取得のユースケース）
    pub get_room_detail_usecase: Arc<GetRoomDetailUseCase>,
    /// MessageHistoryUseCase（REST 履歴ストアのユースケース）
    pub message_history_usecase: Arc<MessageHistoryUseCase>,
}
