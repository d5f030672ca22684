//! MessagePusher trait 定義
//!
//! クライアントへの通知配信を抽象化します。
//! 接続（WebSocket やシミュレーション）の生成は UI 層が行い、
//! 生成された `PusherChannel` をここに登録します。

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{error::MessagePushError, notification::Notification, value_object::ConnectionId};

/// Outbound channel of one connection.
pub type PusherChannel = mpsc::UnboundedSender<Notification>;

/// MessagePusher trait
///
/// UseCase 層はこの trait を通じて通知を配信し、配送経路の詳細には依存しない。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessagePusher: Send + Sync {
    /// 接続を登録
    async fn register_client(&self, connection_id: ConnectionId, sender: PusherChannel);

    /// 接続を登録解除
    async fn unregister_client(&self, connection_id: &ConnectionId);

    /// 特定の接続に通知を送信
    async fn push_to(
        &self,
        connection_id: &ConnectionId,
        notification: Notification,
    ) -> Result<(), MessagePushError>;

    /// 複数の接続に通知を送信（一部の失敗は許容）
    async fn broadcast(
        &self,
        targets: Vec<ConnectionId>,
        notification: Notification,
    ) -> Result<(), MessagePushError>;

    /// 登録中の全ての接続
    async fn registered_clients(&self) -> Vec<ConnectionId>;
}
