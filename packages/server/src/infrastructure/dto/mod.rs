//! Data transfer objects for the WebSocket and HTTP boundaries.

pub mod conversion;
pub mod http;
pub mod websocket;

pub use conversion::MalformedPayload;
