mod http;
mod websocket;

pub use http::{get_messages, get_room_detail, get_rooms, health_check, persist_message};
pub use websocket::websocket_handler;
