//! Connection transport.
//!
//! A supervisor task connects to the live server, reconnects when the
//! connection drops, and switches to the local simulation when the server
//! cannot be reached. Callers only see [`ServerEvent`]s either way.
//!
//! [`ServerEvent`]: lounge_server::infrastructure::dto::websocket::ServerEvent

pub mod emitter;
pub mod live;
pub mod state;

use std::sync::{Arc, Mutex};

use lounge_server::infrastructure::dto::websocket::{ClientEvent, UserProfileDto};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::{
    config::{SimulationConfig, TransportConfig},
    error::TransportError,
    simulation::LocalSimulation,
};

use self::{
    emitter::{EventEmitter, EventKind, Subscription},
    live::SessionEnd,
    state::{ConnectionState, TransportMode},
};

/// Resolves once shutdown is requested or the requesting side is gone
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Presence and membership announced by this client, replayed on every
/// (re)connect
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayLog {
    profile: Option<UserProfileDto>,
    rooms: Vec<String>,
}

impl ReplayLog {
    pub fn record(&mut self, event: &ClientEvent) {
        match event {
            ClientEvent::UserConnected(profile) => self.profile = Some(profile.clone()),
            ClientEvent::JoinRoom(room_id) => {
                if !self.rooms.contains(room_id) {
                    self.rooms.push(room_id.clone());
                }
            }
            ClientEvent::LeaveRoom(room_id) => self.rooms.retain(|r| r != room_id),
            ClientEvent::SendMessage(_) | ClientEvent::Typing(_) => {}
        }
    }

    /// `user_connected` followed by a `join_room` per room
    pub fn events(&self) -> Vec<ClientEvent> {
        let Some(profile) = &self.profile else {
            return Vec::new();
        };
        std::iter::once(ClientEvent::UserConnected(profile.clone()))
            .chain(self.rooms.iter().cloned().map(ClientEvent::JoinRoom))
            .collect()
    }

    pub fn rooms(&self) -> &[String] {
        &self.rooms
    }
}

/// Messages kept while no backend is attached
const MAX_PENDING_MESSAGES: usize = 100;

#[derive(Default)]
struct Link {
    outbound: Option<mpsc::UnboundedSender<ClientEvent>>,
    replay: ReplayLog,
    /// `send_message` events waiting for the next backend
    pending: Vec<ClientEvent>,
}

impl Link {
    /// Keep an undeliverable event for the next attach. Only messages are
    /// kept; presence and rooms come back through the replay, typing goes stale.
    fn hold(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::SendMessage(_) if self.pending.len() < MAX_PENDING_MESSAGES => {
                tracing::warn!("No backend attached; holding 'send_message' until reconnect");
                self.pending.push(event);
            }
            ClientEvent::SendMessage(_) => {
                tracing::warn!(
                    "No backend attached and {} messages pending; dropped 'send_message'",
                    MAX_PENDING_MESSAGES
                );
            }
            ClientEvent::Typing(_) => {
                tracing::debug!("No backend attached; dropped 'typing'");
            }
            ClientEvent::UserConnected(_)
            | ClientEvent::JoinRoom(_)
            | ClientEvent::LeaveRoom(_) => {
                tracing::debug!("No backend attached; '{}' will be replayed", event.name());
            }
        }
    }
}

struct Shared {
    emitter: EventEmitter,
    link: Mutex<Link>,
    state: watch::Sender<ConnectionState>,
    mode: watch::Sender<TransportMode>,
}

impl Shared {
    fn link(&self) -> std::sync::MutexGuard<'_, Link> {
        self.link
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach a backend; the replay and then the held messages go out before
    /// any new event
    fn attach(&self) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut link = self.link();
        for event in link.replay.events() {
            let _ = sender.send(event);
        }
        let pending = std::mem::take(&mut link.pending);
        if !pending.is_empty() {
            tracing::info!("Sending {} held messages", pending.len());
        }
        for event in pending {
            let _ = sender.send(event);
        }
        link.outbound = Some(sender);
        receiver
    }

    fn detach(&self) {
        self.link().outbound = None;
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!("Transport {} -> {}", previous, state);
        }
    }
}

/// Handle of the connection transport. Dropping it shuts the transport down.
pub struct Transport {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Start connecting. With `simulation`, an unreachable server is replaced
    /// by the local simulation; without it the transport keeps retrying.
    pub fn connect(config: TransportConfig, simulation: Option<SimulationConfig>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (mode, _) = watch::channel(TransportMode::Pending);
        let shared = Arc::new(Shared {
            emitter: EventEmitter::new(),
            link: Mutex::new(Link::default()),
            state,
            mode,
        });
        let (shutdown, shutdown_rx) = watch::channel(false);
        let supervisor = tokio::spawn(supervise(shared.clone(), config, simulation, shutdown_rx));

        Self {
            shared,
            shutdown,
            supervisor: Mutex::new(Some(supervisor)),
        }
    }

    /// Send an event. While no backend is attached, messages are held for the
    /// next one and typing signals are dropped.
    pub fn emit(&self, event: ClientEvent) {
        let mut link = self.shared.link();
        link.replay.record(&event);
        let undelivered = match &link.outbound {
            Some(sender) => sender.send(event).err().map(|e| e.0),
            None => Some(event),
        };
        if let Some(event) = undelivered {
            link.hold(event);
        }
    }

    /// Number of messages held for the next backend
    pub fn pending_messages(&self) -> usize {
        self.shared.link().pending.len()
    }

    pub fn on(&self, kind: EventKind) -> Subscription {
        self.shared.emitter.on(kind)
    }

    pub fn on_any(&self) -> Subscription {
        self.shared.emitter.on_any()
    }

    pub fn off(&self, subscription: Subscription) {
        self.shared.emitter.off(subscription);
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn mode(&self) -> TransportMode {
        *self.shared.mode.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn watch_mode(&self) -> watch::Receiver<TransportMode> {
        self.shared.mode.subscribe()
    }

    /// Rooms this client considers itself a member of
    pub fn joined_rooms(&self) -> Vec<String> {
        self.shared.link().replay.rooms().to_vec()
    }

    /// Wait until a backend is attached
    pub async fn connected(&self) {
        let mut state = self.watch_state();
        let _ = state
            .wait_for(|state| *state == ConnectionState::Connected)
            .await;
    }

    /// Shut down and wait for the backend to finish. Idempotent.
    pub async fn disconnect(&self) {
        self.shutdown.send_replace(true);
        let supervisor = self
            .supervisor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(supervisor) = supervisor
            && let Err(e) = supervisor.await
        {
            tracing::warn!("Transport supervisor ended abnormally: {}", e);
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

/// Sit out the retry delay. Returns `true` when shutdown was requested.
async fn pause_or_shutdown(
    shared: &Shared,
    config: &TransportConfig,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    shared.set_state(ConnectionState::Disconnected);
    tokio::select! {
        _ = tokio::time::sleep(config.retry_delay) => false,
        _ = shutdown_requested(shutdown) => true,
    }
}

async fn supervise(
    shared: Arc<Shared>,
    config: TransportConfig,
    simulation: Option<SimulationConfig>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        shared.set_state(ConnectionState::Connecting);

        let attempt = if config.force_simulation {
            Err(TransportError::Disabled)
        } else {
            tokio::select! {
                result = live::connect_with_retries(&config) => result,
                _ = shutdown_requested(&mut shutdown) => break,
            }
        };

        match attempt {
            Ok(stream) => {
                let outbound = shared.attach();
                shared.mode.send_replace(TransportMode::Live);
                shared.set_state(ConnectionState::Connected);
                tracing::info!("Connected to chat server at {}", config.url);

                let end =
                    live::run_session(stream, outbound, shared.emitter.clone(), &mut shutdown)
                        .await;
                shared.detach();
                if end == SessionEnd::Shutdown {
                    break;
                }
                tracing::warn!("Connection lost; reconnecting");
                if pause_or_shutdown(&shared, &config, &mut shutdown).await {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Live transport unavailable: {}", e);
                let Some(simulation_config) = simulation.clone() else {
                    if pause_or_shutdown(&shared, &config, &mut shutdown).await {
                        break;
                    }
                    continue;
                };
                match LocalSimulation::activate(simulation_config, shared.emitter.clone()).await {
                    Ok(local) => {
                        let outbound = shared.attach();
                        shared.mode.send_replace(TransportMode::Simulated);
                        shared.set_state(ConnectionState::Connected);
                        tracing::warn!("Falling back to the local simulation");

                        local.run(outbound, &mut shutdown).await;
                        shared.detach();
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to start the local simulation: {}", e);
                        if pause_or_shutdown(&shared, &config, &mut shutdown).await {
                            break;
                        }
                    }
                }
            }
        }
    }

    shared.detach();
    shared.set_state(ConnectionState::Disconnected);
    tracing::info!("Transport shut down");
}
