//! Infrastructure layer: repository and pusher implementations, wire DTOs.

pub mod dto;
pub mod message_pusher;
pub mod repository;
