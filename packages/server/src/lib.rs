//! Lounge chat server: presence registry, room membership tracker, message bus
//! and typing relay behind an axum WebSocket endpoint.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
