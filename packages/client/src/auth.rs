//! Authentication collaborator.
//!
//! Session issuance lives elsewhere; the chat only asks who the caller is.

use async_trait::async_trait;
use lounge_server::infrastructure::dto::websocket::UserProfileDto;

/// Answers "is this caller authenticated, and as whom"
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_identity(&self) -> Option<UserProfileDto>;
}

/// AuthProvider with a fixed answer
#[derive(Debug, Clone, Default)]
pub struct StaticAuthProvider {
    identity: Option<UserProfileDto>,
}

impl StaticAuthProvider {
    pub fn new(identity: UserProfileDto) -> Self {
        Self {
            identity: Some(identity),
        }
    }

    pub fn anonymous() -> Self {
        Self { identity: None }
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    async fn current_identity(&self) -> Option<UserProfileDto> {
        self.identity.clone()
    }
}
