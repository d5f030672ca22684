//! Message de-duplication.
//!
//! The same message can arrive twice: echoed by the transport and merged from
//! the history store, each with its own id.

use lounge_server::infrastructure::dto::websocket::MessageDto;

/// A message is a duplicate when its id is held, or when a held message has
/// the same content and sender less than `window_millis` apart.
pub fn is_duplicate(held: &[MessageDto], candidate: &MessageDto, window_millis: i64) -> bool {
    held.iter().any(|message| {
        message.id == candidate.id
            || (message.content == candidate.content
                && message.sender.id == candidate.sender.id
                && (message.timestamp - candidate.timestamp).abs() < window_millis)
    })
}

/// Insert keeping timestamp order; equal timestamps keep arrival order
pub fn insert_ordered(messages: &mut Vec<MessageDto>, message: MessageDto) {
    let position = messages.partition_point(|m| m.timestamp <= message.timestamp);
    messages.insert(position, message);
}
