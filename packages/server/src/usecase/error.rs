//! UseCase 層のエラー定義

use thiserror::Error;

/// Room への参加エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinRoomError {
    /// user_connected を送っていない接続からの join
    #[error("connection '{0}' has not announced a profile")]
    NotAnnounced(String),

    /// 存在しない Room（自動作成が無効な場合）
    #[error("room '{0}' does not exist")]
    InvalidRoom(String),
}

/// Room からの退出エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaveRoomError {
    #[error("connection '{0}' has not announced a profile")]
    NotAnnounced(String),
}

/// メッセージ送信エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendMessageError {
    /// 存在しない Room への投稿
    #[error("room '{0}' does not exist")]
    InvalidRoom(String),
}

/// Room 詳細取得エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GetRoomDetailError {
    #[error("invalid room id: {0}")]
    InvalidRoomId(String),

    #[error("room '{0}' not found")]
    RoomNotFound(String),
}

/// 履歴ストア操作のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("Room ID is required")]
    MissingRoomId,

    #[error("Invalid message format: {0}")]
    InvalidFormat(String),
}

/// ChatHub がコマンドを処理できなかった理由
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Join(#[from] JoinRoomError),

    #[error(transparent)]
    Leave(#[from] LeaveRoomError),

    #[error(transparent)]
    Send(#[from] SendMessageError),
}
