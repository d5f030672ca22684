//! Client configuration.

use std::{sync::Arc, time::Duration};

use crate::simulation::storage::SharedStorage;

/// Default WebSocket endpoint of a local server.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8080/ws";

/// Connection transport settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// WebSocket URL of the server
    pub url: String,
    /// Timeout of one handshake attempt
    pub connect_timeout: Duration,
    /// Handshake attempts before falling back to the simulation
    pub max_attempts: u32,
    /// Delay between attempts, and before reconnecting
    pub retry_delay: Duration,
    /// Skip the live server entirely
    pub force_simulation: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            connect_timeout: Duration::from_secs(2),
            max_attempts: 3,
            retry_delay: Duration::from_secs(1),
            force_simulation: false,
        }
    }
}

/// Chat session settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Messages with the same content and sender closer than this are duplicates
    pub dedup_window: Duration,
    /// Idle time after which a typing episode ends
    pub typing_idle: Duration,
}

impl SessionConfig {
    pub fn dedup_window_millis(&self) -> i64 {
        i64::try_from(self.dedup_window.as_millis()).unwrap_or(i64::MAX)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_millis(3000),
            typing_idle: Duration::from_secs(1),
        }
    }
}

/// Local simulation settings
#[derive(Clone)]
pub struct SimulationConfig {
    /// Identity of this context (also its connection id)
    pub identity: String,
    /// Medium shared with the other contexts
    pub storage: Arc<dyn SharedStorage>,
    /// Seed `general`, `help` and `random` when no snapshot exists
    pub seed_default_rooms: bool,
    /// Welcome first-time room members with a system message
    pub greet_new_members: bool,
}

impl SimulationConfig {
    pub fn new(identity: impl Into<String>, storage: Arc<dyn SharedStorage>) -> Self {
        Self {
            identity: identity.into(),
            storage,
            seed_default_rooms: true,
            greet_new_members: true,
        }
    }
}

impl std::fmt::Debug for SimulationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulationConfig")
            .field("identity", &self.identity)
            .field("seed_default_rooms", &self.seed_default_rooms)
            .field("greet_new_members", &self.greet_new_members)
            .finish_non_exhaustive()
    }
}
