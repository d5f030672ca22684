//! Error types of the chat client.

use std::time::Duration;

use lounge_server::domain::ValueObjectError;
use thiserror::Error;

/// Live connection failures. All of them are absorbed by reconnecting or by
/// falling back to the local simulation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The handshake did not complete in time
    #[error("Handshake timed out after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered with HTTP 503
    #[error("Server reports it is unavailable")]
    Unavailable,

    /// Any other handshake failure
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Every attempt failed
    #[error("Gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<TransportError>,
    },

    /// Live connections are disabled by configuration
    #[error("Live transport is disabled")]
    Disabled,
}

/// Shared storage failures
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broadcast channel failures
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Failed to encode envelope: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Local simulation failures
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid simulation identity: {0}")]
    InvalidIdentity(#[from] ValueObjectError),

    #[error("Failed to encode shared snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// History store failures
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("History request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("History store rejected the request with status {0}")]
    Rejected(u16),
}

/// Errors surfaced to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("No authenticated identity")]
    Unauthenticated,
}
