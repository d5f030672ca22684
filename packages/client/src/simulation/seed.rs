//! Default rooms of a fresh simulated backend.

use lounge_server::{
    domain::{ChatMessage, MessageContent, MessageId, MessageSender, RoomId, Timestamp},
    infrastructure::repository::InMemoryChatRepository,
};

use crate::error::SimulationError;

const MINUTE_MILLIS: i64 = 60 * 1000;

struct SeedRoom {
    id: &'static str,
    name: &'static str,
    /// (content, age in milliseconds)
    messages: &'static [(&'static str, i64)],
}

const DEFAULT_ROOMS: [SeedRoom; 3] = [
    SeedRoom {
        id: "general",
        name: "General Chat",
        messages: &[
            ("Welcome to the chat!", 60 * MINUTE_MILLIS),
            (
                "This is a development mock. No real server connection.",
                30 * MINUTE_MILLIS,
            ),
        ],
    },
    SeedRoom {
        id: "help",
        name: "Help & Support",
        messages: &[("Need help? Ask here!", 120 * MINUTE_MILLIS)],
    },
    SeedRoom {
        id: "random",
        name: "Random",
        messages: &[("Random discussions go here!", 90 * MINUTE_MILLIS)],
    },
];

/// Create `general`, `help` and `random` with their system messages
pub async fn seed_default_rooms(
    repository: &InMemoryChatRepository,
    system_sender: &MessageSender,
    now: i64,
) -> Result<(), SimulationError> {
    for seed in &DEFAULT_ROOMS {
        let room_id = RoomId::new(seed.id.to_string())?;
        repository
            .ensure_room(room_id.clone(), Some(seed.name.to_string()))
            .await;
        for (content, age) in seed.messages {
            let message = ChatMessage {
                id: MessageId::generate(),
                room_id: room_id.clone(),
                content: MessageContent::new(content.to_string())?,
                sender: system_sender.clone(),
                timestamp: Timestamp::new(now - age),
            };
            // Seeding only targets rooms created just above.
            if let Err(e) = repository.import_message(message).await {
                tracing::warn!("Failed to seed room '{}': {}", seed.id, e);
            }
        }
    }
    tracing::info!("Seeded {} default rooms", DEFAULT_ROOMS.len());
    Ok(())
}
