//! Lounge chat server.
//!
//! Tracks who is online, who is in which room and relays messages and typing
//! signals to room members.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lounge-server
//! cargo run --bin lounge-server -- --host 0.0.0.0 --port 3000
//! cargo run --bin lounge-server -- --no-auto-create --history-limit 100
//! ```

use std::sync::Arc;

use clap::Parser;
use lounge_server::{
    config::ServerConfig,
    infrastructure::{
        message_pusher::ChannelMessagePusher,
        repository::{InMemoryChatRepository, InMemoryHistoryRepository},
    },
    ui::Server,
    usecase::{ChatHub, GetRoomDetailUseCase, GetRoomsUseCase, MessageHistoryUseCase},
};
use lounge_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "lounge-server")]
#[command(about = "Chat server with rooms, presence and typing indicators", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Reject joins to rooms that do not exist yet
    #[arg(long)]
    no_auto_create: bool,

    /// Number of messages kept per room
    #[arg(long, default_value_t = lounge_server::domain::DEFAULT_HISTORY_LIMIT)]
    history_limit: usize,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        let mut config = ServerConfig {
            host: args.host,
            port: args.port,
            history_limit: args.history_limit,
            ..ServerConfig::default()
        };
        config.hub.auto_create_rooms = !args.no_auto_create;
        config
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let config = ServerConfig::from(Args::parse());

    // Initialize dependencies in order:
    // 1. Repository
    // 2. MessagePusher
    // 3. ChatHub and UseCases
    // 4. Server

    // 1. Create Repositories (in-memory database)
    let repository = Arc::new(InMemoryChatRepository::with_history_limit(
        config.history_limit,
    ));
    let history_repository = Arc::new(InMemoryHistoryRepository::new());
    let clock = Arc::new(SystemClock);

    // 2. Create MessagePusher (channel implementation, drained by the WebSocket handler)
    let message_pusher = Arc::new(ChannelMessagePusher::new());

    // 3. Create ChatHub and UseCases
    let hub = Arc::new(ChatHub::new(
        repository.clone(),
        message_pusher,
        clock.clone(),
        config.hub.clone(),
    ));
    let get_rooms_usecase = Arc::new(GetRoomsUseCase::new(repository.clone()));
    let get_room_detail_usecase = Arc::new(GetRoomDetailUseCase::new(repository));
    let message_history_usecase = Arc::new(MessageHistoryUseCase::new(history_repository, clock));

    tracing::info!(
        "Room auto-creation {}, {} messages kept per room",
        if config.hub.auto_create_rooms {
            "enabled"
        } else {
            "disabled"
        },
        config.history_limit
    );

    // 4. Create and run the server
    let server = Server::new(
        hub,
        get_rooms_usecase,
        get_room_detail_usecase,
        message_history_usecase,
    );
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
