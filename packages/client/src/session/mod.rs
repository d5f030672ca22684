//! Chat session façade.
//!
//! Owns the transport for one signed-in user, folds server events into a
//! [`ChatView`] and exposes the chat operations the presentation layer needs.

pub mod dedup;
pub mod state;
pub mod typing;

use std::sync::{
    Arc, Mutex, Weak,
    atomic::{AtomicBool, Ordering},
};

use lounge_server::infrastructure::dto::websocket::{
    ClientEvent, MessageDto, MessageSenderDto, SendMessagePayload, TypingPayload, TypingUserDto,
    UserProfileDto,
};
use lounge_shared::time::get_utc_timestamp;
use tokio::{sync::watch, task::JoinHandle};

use crate::{
    auth::AuthProvider,
    config::SessionConfig,
    error::SessionError,
    history::HistoryStore,
    transport::{Transport, state::TransportMode},
};

pub use self::{state::ChatView, typing::TypingIndicator};

struct SessionInner {
    transport: Transport,
    history: Arc<dyn HistoryStore>,
    config: SessionConfig,
    profile: UserProfileDto,
    view: Arc<watch::Sender<ChatView>>,
    listener: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl SessionInner {
    fn take_listener(&self) -> Option<JoinHandle<()>> {
        self.listener
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    fn emit_typing(&self, room_id: &str, is_typing: bool) {
        self.transport.emit(ClientEvent::Typing(TypingPayload {
            room_id: room_id.to_string(),
            user: TypingUserDto {
                id: self.profile.id.clone(),
                name: self.profile.name.clone(),
            },
            is_typing,
        }));
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(listener) = self.take_listener() {
            listener.abort();
        }
    }
}

/// Merge the history store's log of `room_id` into the view
async fn load_history(
    history: Arc<dyn HistoryStore>,
    view: Arc<watch::Sender<ChatView>>,
    room_id: String,
    dedup_window_millis: i64,
) {
    match history.fetch(&room_id).await {
        Ok(messages) => {
            view.send_if_modified(|view| view.merge_messages(messages, dedup_window_millis));
        }
        Err(e) => tracing::warn!("Failed to load history for '{}': {}", room_id, e),
    }
}

/// Handle of a chat session. Clones share the session; dropping the last one
/// shuts the transport down.
#[derive(Clone)]
pub struct ChatSession {
    inner: Arc<SessionInner>,
}

impl ChatSession {
    /// Start a session for the authenticated user and announce the presence
    pub async fn start(
        transport: Transport,
        auth: &dyn AuthProvider,
        history: Arc<dyn HistoryStore>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let Some(profile) = auth.current_identity().await else {
            tracing::warn!("Chat session refused: no authenticated identity");
            return Err(SessionError::Unauthenticated);
        };

        let (view, _) = watch::channel(ChatView::for_user(&profile.id));
        let view = Arc::new(view);

        // Subscribe before announcing so no reply is missed
        let mut events = transport.on_any();
        let listener_view = view.clone();
        let window = config.dedup_window_millis();
        let listener = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                tracing::debug!("Session received '{}'", event.name());
                listener_view.send_if_modified(|view| view.apply(event, window));
            }
        });

        transport.emit(ClientEvent::UserConnected(profile.clone()));
        tracing::info!("Chat session started for {} ({})", profile.name, profile.id);

        Ok(Self {
            inner: Arc::new(SessionInner {
                transport,
                history,
                config,
                profile,
                view,
                listener: Mutex::new(Some(listener)),
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Enter `room_id` with a fresh message log.
    ///
    /// In live mode the history store is merged in before this returns. While
    /// the transport has not settled yet, the merge happens once it goes live.
    pub async fn join_room(&self, room_id: &str) {
        self.inner.view.send_modify(|view| view.enter_room(room_id));
        self.inner
            .transport
            .emit(ClientEvent::JoinRoom(room_id.to_string()));

        let load = load_history(
            self.inner.history.clone(),
            self.inner.view.clone(),
            room_id.to_string(),
            self.inner.config.dedup_window_millis(),
        );
        match self.mode() {
            TransportMode::Live => load.await,
            TransportMode::Pending => self.when_live(load),
            TransportMode::Simulated => {}
        }
    }

    /// Run `task` once the transport settles on live mode
    fn when_live(&self, task: impl Future<Output = ()> + Send + 'static) {
        let mut mode = self.inner.transport.watch_mode();
        tokio::spawn(async move {
            let live = {
                let decided = mode.wait_for(|mode| *mode != TransportMode::Pending).await;
                decided.is_ok_and(|mode| *mode == TransportMode::Live)
            };
            if live {
                task.await;
            }
        });
    }

    pub fn leave_room(&self, room_id: &str) {
        self.inner
            .transport
            .emit(ClientEvent::LeaveRoom(room_id.to_string()));
        self.inner.view.send_if_modified(|view| view.exit_room(room_id));
    }

    /// Send a message; blank content is ignored. In live mode the message is
    /// also persisted in the background.
    pub async fn send_message(&self, room_id: &str, content: &str) {
        let content = content.trim();
        if content.is_empty() {
            return;
        }
        let sender = MessageSenderDto {
            id: self.inner.profile.id.clone(),
            name: self.inner.profile.name.clone(),
            avatar: self.inner.profile.avatar.clone(),
        };
        self.inner
            .transport
            .emit(ClientEvent::SendMessage(SendMessagePayload {
                room_id: room_id.to_string(),
                content: content.to_string(),
                sender: sender.clone(),
            }));

        let message = MessageDto {
            id: format!("msg-{}", uuid::Uuid::new_v4().simple()),
            room_id: room_id.to_string(),
            content: content.to_string(),
            sender,
            timestamp: get_utc_timestamp(),
        };
        let history = self.inner.history.clone();
        let persist = async move {
            if let Err(e) = history.persist(&message.room_id, &message).await {
                tracing::warn!("Failed to persist message in '{}': {}", message.room_id, e);
            }
        };
        match self.mode() {
            TransportMode::Live => {
                tokio::spawn(persist);
            }
            TransportMode::Pending => self.when_live(persist),
            TransportMode::Simulated => {}
        }
    }

    pub fn start_typing(&self, room_id: &str) {
        self.inner.emit_typing(room_id, true);
    }

    pub fn stop_typing(&self, room_id: &str) {
        self.inner.emit_typing(room_id, false);
    }

    /// Typing indicator bound to `room_id`. It does not keep the session alive.
    pub fn typing_indicator(&self, room_id: &str) -> TypingIndicator {
        let session: Weak<SessionInner> = Arc::downgrade(&self.inner);
        let room_id = room_id.to_string();
        TypingIndicator::new(self.inner.config.typing_idle, move |is_typing| {
            if let Some(session) = session.upgrade() {
                session.emit_typing(&room_id, is_typing);
            }
        })
    }

    pub fn profile(&self) -> &UserProfileDto {
        &self.inner.profile
    }

    pub fn mode(&self) -> TransportMode {
        self.inner.transport.mode()
    }

    pub fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    /// Snapshot of the whole view
    pub fn view(&self) -> ChatView {
        self.inner.view.borrow().clone()
    }

    /// Receiver notified on every view change
    pub fn watch(&self) -> watch::Receiver<ChatView> {
        self.inner.view.subscribe()
    }

    pub fn messages(&self) -> Vec<MessageDto> {
        self.inner.view.borrow().messages.clone()
    }

    pub fn room_users(&self) -> Vec<UserProfileDto> {
        self.inner.view.borrow().room_users.clone()
    }

    pub fn active_users(&self) -> Vec<UserProfileDto> {
        self.inner.view.borrow().active_users.clone()
    }

    pub fn user_typing(&self) -> Option<TypingUserDto> {
        self.inner.view.borrow().user_typing.clone()
    }

    pub fn current_room(&self) -> Option<String> {
        self.inner.view.borrow().current_room.clone()
    }

    /// Stop listening and disconnect the transport. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(listener) = self.inner.take_listener() {
            listener.abort();
        }
        self.inner.transport.disconnect().await;
        tracing::info!("Chat session closed for {}", self.inner.profile.id);
    }
}
