//! Lounge chat client.
//!
//! Connects to a Lounge server and chats from the terminal. When the server
//! cannot be reached, the client runs a local simulation whose state is
//! shared with other clients using the same storage directory.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin lounge-client -- --name Alice
//! cargo run --bin lounge-client -- -n Bob --room random
//! cargo run --bin lounge-client -- -n Carol --simulate --storage-dir /tmp/lounge
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use lounge_client::{
    cli::{ClientOptions, run_client},
    config::{DEFAULT_SERVER_URL, SessionConfig, TransportConfig},
};
use lounge_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "lounge-client")]
#[command(about = "Chat client with rooms, presence and an offline simulation", long_about = None)]
struct Args {
    /// Display name
    #[arg(short = 'n', long)]
    name: String,

    /// E-mail shown to other users
    #[arg(short = 'e', long, default_value = "")]
    email: String,

    /// Avatar URL
    #[arg(short = 'a', long, default_value = "")]
    avatar: String,

    /// Fixed user ID (by default one is kept per name in the storage directory)
    #[arg(long)]
    user_id: Option<String>,

    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = DEFAULT_SERVER_URL)]
    url: String,

    /// Room joined on start
    #[arg(short = 'r', long, default_value = "general")]
    room: String,

    /// Directory shared by local clients in simulation mode
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Skip the server and run the local simulation
    #[arg(long)]
    simulate: bool,

    /// Timeout of one connection attempt in milliseconds
    #[arg(long, default_value_t = 2000)]
    connect_timeout_ms: u64,

    /// Connection attempts before falling back to the simulation
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,
}

impl From<Args> for ClientOptions {
    fn from(args: Args) -> Self {
        ClientOptions {
            name: args.name,
            email: args.email,
            avatar: args.avatar,
            user_id: args.user_id,
            room: args.room,
            storage_dir: args.storage_dir,
            transport: TransportConfig {
                url: args.url,
                connect_timeout: Duration::from_millis(args.connect_timeout_ms),
                max_attempts: args.max_attempts,
                force_simulation: args.simulate,
                ..TransportConfig::default()
            },
            session: SessionConfig::default(),
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let options = ClientOptions::from(Args::parse());

    // Run the client
    if let Err(e) = run_client(options).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
