//! Client execution logic.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use lounge_server::infrastructure::dto::websocket::UserProfileDto;
use rustyline::{
    Context, Editor, Helper, completion::Completer, error::ReadlineError, highlight::Highlighter,
    hint::Hinter, history::DefaultHistory, validate::Validator,
};
use tokio::sync::mpsc;

use crate::{
    auth::StaticAuthProvider,
    config::{SessionConfig, SimulationConfig, TransportConfig},
    history::{HistoryStore, HttpHistoryStore},
    identity,
    session::{ChatSession, TypingIndicator},
    simulation::storage::FileStorage,
    transport::Transport,
};

use super::{
    command::{ChatInput, parse_input},
    formatter::MessageFormatter,
    ui::{prompt, redisplay_prompt},
};

/// Everything the terminal client needs to start
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub name: String,
    pub email: String,
    pub avatar: String,
    /// Fixed user id; otherwise one is kept per name in the storage directory
    pub user_id: Option<String>,
    /// Room joined on start
    pub room: String,
    /// Shared storage of the local simulation
    pub storage_dir: Option<PathBuf>,
    pub transport: TransportConfig,
    pub session: SessionConfig,
}

impl ClientOptions {
    pub fn storage_dir(&self) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("lounge"))
    }
}

enum InputEvent {
    /// The input line changed
    Edited(String),
    /// Enter was pressed
    Line(String),
}

/// Reports every edit of the input line, which drives the typing indicator
struct TypingHelper {
    sender: mpsc::UnboundedSender<InputEvent>,
}

impl Completer for TypingHelper {
    type Candidate = String;
}

impl Hinter for TypingHelper {
    type Hint = String;

    fn hint(&self, line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let _ = self.sender.send(InputEvent::Edited(line.to_string()));
        None
    }
}

impl Highlighter for TypingHelper {}

impl Validator for TypingHelper {}

impl Helper for TypingHelper {}

/// Spawn a blocking thread for rustyline (synchronous readline)
fn spawn_readline(
    sender: mpsc::UnboundedSender<InputEvent>,
    prompt: Arc<Mutex<String>>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut rl = match Editor::<TypingHelper, DefaultHistory>::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };
        rl.set_helper(Some(TypingHelper {
            sender: sender.clone(),
        }));

        loop {
            let current = prompt
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone();
            match rl.readline(&current) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line).ok();
                    if sender.send(InputEvent::Line(line.to_string())).is_err() {
                        // Channel closed, exit thread
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    })
}

/// Room the prompt is in, with its typing indicator
struct RoomFocus {
    room_id: String,
    typing: TypingIndicator,
}

struct Console {
    session: ChatSession,
    focus: Option<RoomFocus>,
    prompt: Arc<Mutex<String>>,
}

impl Console {
    fn set_prompt(&self) -> String {
        let room = self.focus.as_ref().map(|focus| focus.room_id.as_str());
        let text = prompt(&self.session.profile().name, room);
        *self
            .prompt
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = text.clone();
        text
    }

    async fn join(&mut self, room_id: &str) {
        if let Some(focus) = &self.focus {
            if focus.room_id == room_id {
                return;
            }
            focus.typing.submit();
            self.session.leave_room(&focus.room_id);
        }
        self.session.join_room(room_id).await;
        self.focus = Some(RoomFocus {
            room_id: room_id.to_string(),
            typing: self.session.typing_indicator(room_id),
        });
        print!("{}", MessageFormatter::format_joined(room_id));
    }

    fn leave(&mut self) {
        match self.focus.take() {
            Some(focus) => {
                focus.typing.submit();
                self.session.leave_room(&focus.room_id);
                print!("{}", MessageFormatter::format_left(&focus.room_id));
            }
            None => println!("You are not in a room"),
        }
    }

    /// Returns `false` when the user asked to quit
    async fn handle_line(&mut self, line: &str) -> bool {
        let Some(input) = parse_input(line) else {
            return true;
        };
        let my_id = self.session.profile().id.clone();
        match input {
            ChatInput::Quit => return false,
            ChatInput::Join(room_id) => self.join(&room_id).await,
            ChatInput::Leave => self.leave(),
            ChatInput::Users => match &self.focus {
                Some(focus) => print!(
                    "{}",
                    MessageFormatter::format_room_users(
                        &focus.room_id,
                        &self.session.room_users(),
                        &my_id
                    )
                ),
                None => println!("You are not in a room"),
            },
            ChatInput::Online => print!(
                "{}",
                MessageFormatter::format_active_users(&self.session.active_users(), &my_id)
            ),
            ChatInput::Help => println!("{}", MessageFormatter::format_help()),
            ChatInput::Invalid(usage) => println!("{}", usage),
            ChatInput::Say(text) => match &self.focus {
                Some(focus) => {
                    focus.typing.submit();
                    self.session.send_message(&focus.room_id, &text).await;
                }
                None => println!("Join a room first: /join <room>"),
            },
        }
        true
    }
}

/// Run the interactive client until the user quits
pub async fn run_client(options: ClientOptions) -> Result<(), Box<dyn std::error::Error>> {
    let storage = Arc::new(FileStorage::open(options.storage_dir())?);
    tracing::debug!("Shared storage at {}", storage.dir().display());

    let user_id = match options.user_id.clone() {
        Some(user_id) => user_id,
        None => identity::load_or_create(storage.as_ref(), &options.name).await?,
    };
    let profile = UserProfileDto {
        id: user_id.clone(),
        name: options.name.clone(),
        email: options.email.clone(),
        avatar: options.avatar.clone(),
        current_room: None,
    };

    let url = options.transport.url.clone();
    let history: Arc<dyn HistoryStore> = Arc::new(HttpHistoryStore::for_ws_url(&url));
    let simulation = SimulationConfig::new(user_id, storage);
    let transport = Transport::connect(options.transport.clone(), Some(simulation));
    let session = ChatSession::start(
        transport,
        &StaticAuthProvider::new(profile),
        history,
        options.session.clone(),
    )
    .await?;

    session.transport().connected().await;
    print!("{}", MessageFormatter::format_mode(session.mode(), &url));
    println!(
        "\nYou are '{}'. Type messages and press Enter to send. /help lists the commands.\n",
        session.profile().name
    );

    let mut console = Console {
        session: session.clone(),
        focus: None,
        prompt: Arc::new(Mutex::new(String::new())),
    };
    console.join(&options.room).await;
    let mut current_prompt = console.set_prompt();

    // Create channel for rustyline input
    let (input_tx, mut input_rx) = mpsc::unbounded_channel();
    let _readline_handle = spawn_readline(input_tx, console.prompt.clone());

    let my_id = session.profile().id.clone();
    let mut view = session.watch();
    let mut shown = view.borrow_and_update().clone();

    loop {
        tokio::select! {
            input = input_rx.recv() => match input {
                Some(InputEvent::Edited(text)) => {
                    if let Some(focus) = &console.focus {
                        focus.typing.input(&text);
                    }
                }
                Some(InputEvent::Line(line)) => {
                    if !console.handle_line(&line).await {
                        break;
                    }
                    current_prompt = console.set_prompt();
                }
                None => break,
            },
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = view.borrow_and_update().clone();
                let lines = MessageFormatter::render_changes(&shown, &next, &my_id);
                if !lines.is_empty() {
                    for line in lines {
                        print!("{}", line);
                    }
                    redisplay_prompt(&current_prompt);
                }
                shown = next;
            }
        }
    }

    if let Some(focus) = &console.focus {
        focus.typing.submit();
    }
    session.close().await;
    tracing::info!("Client session ended normally");
    Ok(())
}
