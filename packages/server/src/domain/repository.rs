//! Repository trait 定義
//!
//! ドメイン層が必要とするデータアクセスのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;

use super::{
    entity::{ChatMessage, MessageSender, Room, UserProfile},
    error::RepositoryError,
    value_object::{ConnectionId, MessageContent, RoomId, Timestamp, UserId},
};

/// Result of binding a profile to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PresenceChange {
    /// Connection the user was bound to before, when it differs from the new one.
    pub replaced_connection: Option<ConnectionId>,
    /// Rooms whose roster entry for this user changed (name, avatar, ...).
    pub refreshed_rooms: Vec<RoomId>,
}

/// Result of a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub room_id: RoomId,
    pub room_name: String,
    /// Roster after the join, in join order.
    pub roster: Vec<UserProfile>,
    /// Backlog to replay to the joiner.
    pub history: Vec<ChatMessage>,
    /// `false` when the user was already a member.
    pub newly_joined: bool,
}

/// Result of a leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub room_id: RoomId,
    /// Roster after the leave.
    pub roster: Vec<UserProfile>,
    /// `false` when the user was not a member.
    pub removed: bool,
}

/// Chat Repository trait
///
/// Presence（接続 → プロフィール）と Room（メンバー・メッセージログ）を保持するストア。
/// UseCase 層はこの trait に依存し、Infrastructure 層の具体的な実装には依存しない。
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Bind `profile` to `connection_id`.
    ///
    /// A user is bound to at most one connection: binding the same user id from
    /// a new connection replaces the old binding.
    async fn bind_presence(
        &self,
        connection_id: ConnectionId,
        profile: UserProfile,
    ) -> PresenceChange;

    /// Remove the profile bound to `connection_id`, if this connection still owns it.
    async fn remove_presence(&self, connection_id: &ConnectionId) -> Option<UserProfile>;

    /// Profile announced by `connection_id`.
    async fn profile_of(&self, connection_id: &ConnectionId) -> Option<UserProfile>;

    /// Connection currently bound to `user_id`.
    async fn connection_of(&self, user_id: &UserId) -> Option<ConnectionId>;

    /// Every online user, in announce order.
    async fn active_users(&self) -> Vec<UserProfile>;

    /// Add `profile` to a room. When `create_if_missing` is false an unknown
    /// room fails with `RoomNotFound`.
    async fn join_room(
        &self,
        room_id: &RoomId,
        profile: UserProfile,
        create_if_missing: bool,
    ) -> Result<JoinOutcome, RepositoryError>;

    /// Remove a user from a room.
    async fn leave_room(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Result<LeaveOutcome, RepositoryError>;

    /// Remove a user from every room. Returns the rooms left with their new rosters.
    async fn leave_all_rooms(&self, user_id: &UserId) -> Vec<LeaveOutcome>;

    /// Record a message, assigning its id and timestamp.
    async fn append_message(
        &self,
        room_id: &RoomId,
        content: MessageContent,
        sender: MessageSender,
        now: Timestamp,
    ) -> Result<ChatMessage, RepositoryError>;

    /// Connections bound to the members of a room.
    async fn room_connections(&self, room_id: &RoomId) -> Result<Vec<ConnectionId>, RepositoryError>;

    async fn get_room(&self, room_id: &RoomId) -> Result<Room, RepositoryError>;

    /// Every room, ordered by id.
    async fn list_rooms(&self) -> Vec<Room>;
}

/// History store behind the REST message endpoints.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Messages persisted for a room, oldest first.
    async fn fetch(&self, room_id: &RoomId) -> Vec<ChatMessage>;

    async fn append(&self, message: ChatMessage);
}
