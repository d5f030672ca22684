//! Server configuration.

use crate::{
    domain::DEFAULT_HISTORY_LIMIT,
    usecase::HubOptions,
};

/// Settings for one server process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Messages kept per room.
    pub history_limit: usize,
    pub hub: HubOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            history_limit: DEFAULT_HISTORY_LIMIT,
            hub: HubOptions::default(),
        }
    }
}
