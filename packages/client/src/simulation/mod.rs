//! Local simulation of the chat server.
//!
//! Each context runs its own [`ChatHub`] over an in-memory repository, so the
//! presence, room and message rules are the server's. Local mutations are
//! echoed to the context's emitter, written as a shared snapshot and
//! published as complete state slices; slices from other contexts are applied
//! as overwrites.

pub mod broadcast;
pub mod seed;
pub mod snapshot;
pub mod storage;

use std::sync::Arc;

use lounge_server::{
    domain::{
        ChatCommand, ChatMessage, ChatRepository, ConnectionId, Notification, Room, RoomId,
        UserId, UserProfile,
    },
    infrastructure::{
        dto::websocket::{
            ClientEvent, MessageDto, ServerEvent, UserProfileDto, UserTypingPayload,
        },
        message_pusher::ChannelMessagePusher,
        repository::InMemoryChatRepository,
    },
    usecase::{ChatHub, HubOptions},
};
use lounge_shared::time::{Clock, SystemClock};
use tokio::sync::{mpsc, watch};

use crate::{
    config::SimulationConfig,
    error::SimulationError,
    transport::{emitter::EventEmitter, shutdown_requested},
};

use self::{
    broadcast::{BroadcastChannel, Envelope, RemoteEnvelopes, Topic},
    storage::SharedStorage,
};

/// Simulated backend of one context
pub struct LocalSimulation {
    connection_id: ConnectionId,
    repository: Arc<InMemoryChatRepository>,
    hub: ChatHub,
    notifications: mpsc::UnboundedReceiver<Notification>,
    storage: Arc<dyn SharedStorage>,
    channel: BroadcastChannel,
    remote: Option<RemoteEnvelopes>,
    emitter: EventEmitter,
    /// Last profile announced by this context
    profile: Option<UserProfile>,
    shut_down: bool,
}

impl LocalSimulation {
    /// Bring the simulated backend up: restore or seed state, then announce
    /// this context to the others.
    pub async fn activate(
        config: SimulationConfig,
        emitter: EventEmitter,
    ) -> Result<Self, SimulationError> {
        Self::activate_with_clock(config, emitter, Arc::new(SystemClock)).await
    }

    pub async fn activate_with_clock(
        config: SimulationConfig,
        emitter: EventEmitter,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SimulationError> {
        let identity = UserId::new(config.identity.clone())?;
        let connection_id = ConnectionId::new(config.identity.clone())?;
        let repository = Arc::new(InMemoryChatRepository::new());
        let options = HubOptions {
            greet_new_members: config.greet_new_members,
            ..HubOptions::default()
        };
        let system_sender = options.system_sender.clone();
        let hub = ChatHub::new(
            repository.clone(),
            Arc::new(ChannelMessagePusher::new()),
            clock.clone(),
            options,
        );
        let (sender, notifications) = mpsc::unbounded_channel();
        hub.connect(connection_id.clone(), sender).await;

        let channel =
            BroadcastChannel::new(identity.as_str(), config.storage.clone(), clock.clone());
        let remote = channel.remote();

        match snapshot::load(config.storage.as_ref()).await? {
            Some(shared) => {
                tracing::info!("Restoring simulated state from the shared snapshot");
                snapshot::restore(&repository, shared).await;
            }
            None if config.seed_default_rooms => {
                seed::seed_default_rooms(&repository, &system_sender, clock.now_millis()).await?;
            }
            None => {}
        }

        let simulation = Self {
            connection_id,
            repository,
            hub,
            notifications,
            storage: config.storage,
            channel,
            remote: Some(remote),
            emitter,
            profile: None,
            shut_down: false,
        };
        simulation.save_snapshot().await?;
        simulation
            .channel
            .publish(Topic::ContextConnected, None, &())
            .await?;
        tracing::info!("Local simulation active as '{}'", identity);

        Ok(simulation)
    }

    /// Process outbound events and remote envelopes until `shutdown` fires,
    /// then shut down.
    pub async fn run(
        mut self,
        mut outbound: mpsc::UnboundedReceiver<ClientEvent>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let Some(mut remote) = self.remote.take() else {
            tracing::error!("Local simulation is already running");
            return;
        };
        loop {
            tokio::select! {
                Some(event) = outbound.recv() => self.handle(event).await,
                Some(envelope) = remote.recv() => self.apply_remote(envelope).await,
                _ = shutdown_requested(shutdown) => break,
            }
        }
        self.shutdown().await;
    }

    /// Apply one event of this context's client
    pub async fn handle(&mut self, event: ClientEvent) {
        let name = event.name();
        let command = match ChatCommand::try_from(event) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!("Dropping {}", e);
                return;
            }
        };

        let mutating = !matches!(command, ChatCommand::Typing { .. });
        match &command {
            ChatCommand::Announce(profile) => self.profile = Some(profile.clone()),
            ChatCommand::Typing {
                room_id,
                user,
                is_typing,
            } => {
                let payload = UserTypingPayload {
                    user: user.clone().into(),
                    is_typing: *is_typing,
                };
                self.publish(Topic::UserTyping, Some(room_id), &payload).await;
            }
            _ => {}
        }

        if let Err(e) = self.hub.handle(&self.connection_id, command).await {
            tracing::warn!("Simulated '{}' rejected: {}", name, e);
        }
        self.forward_notifications().await;

        if mutating && let Err(e) = self.save_snapshot().await {
            tracing::warn!("Failed to write shared snapshot: {}", e);
        }
    }

    /// Echo hub notifications to the local client and publish the slices
    async fn forward_notifications(&mut self) {
        while let Ok(notification) = self.notifications.try_recv() {
            match &notification {
                Notification::ActiveUsers(users) => {
                    let slice: Vec<UserProfileDto> =
                        users.iter().cloned().map(UserProfileDto::from).collect();
                    self.publish(Topic::ActiveUsers, None, &slice).await;
                }
                Notification::RoomUsers { room_id, users } => {
                    let slice: Vec<UserProfileDto> =
                        users.iter().cloned().map(UserProfileDto::from).collect();
                    self.publish(Topic::RoomUsers, Some(room_id), &slice).await;
                }
                Notification::NewMessage(message) => {
                    let slice = MessageDto::from(message.clone());
                    self.publish(Topic::NewMessage, Some(&message.room_id), &slice)
                        .await;
                }
                Notification::RoomHistory { .. } | Notification::UserTyping { .. } => {}
            }
            self.emitter.emit(ServerEvent::from(notification));
        }
    }

    /// Apply an envelope published by another context
    pub async fn apply_remote(&mut self, envelope: Envelope) {
        tracing::debug!(
            "Applying {:?} envelope from '{}'",
            envelope.topic,
            envelope.sender.id
        );
        let result = match envelope.topic {
            Topic::ActiveUsers => self.apply_active_users(&envelope).await,
            Topic::RoomUsers => self.apply_room_users(&envelope).await,
            Topic::NewMessage => self.apply_new_message(&envelope).await,
            Topic::UserTyping => self.apply_user_typing(&envelope).await,
            Topic::ContextConnected => {
                self.republish().await;
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::warn!(
                "Dropping malformed {:?} envelope from '{}': {}",
                envelope.topic,
                envelope.sender.id,
                e
            );
        }
    }

    async fn apply_active_users(&mut self, envelope: &Envelope) -> Result<(), String> {
        let dtos: Vec<UserProfileDto> = envelope.decode().map_err(|e| e.to_string())?;
        let mut profiles = valid_profiles(dtos);
        if let Some(own) = self.own_presence().await
            && !profiles.iter().any(|p| p.id == own.id)
        {
            profiles.push(own);
        }
        self.repository.replace_presence(profiles).await;

        let users = self.repository.active_users().await;
        self.emitter.emit(ServerEvent::ActiveUsers(
            users.into_iter().map(UserProfileDto::from).collect(),
        ));
        Ok(())
    }

    async fn apply_room_users(&mut self, envelope: &Envelope) -> Result<(), String> {
        let room_id = envelope_room(envelope)?;
        let dtos: Vec<UserProfileDto> = envelope.decode().map_err(|e| e.to_string())?;
        let mut members = valid_profiles(dtos);

        let own_membership = self.own_membership(&room_id).await;
        if let Some(own) = &own_membership
            && !members.iter().any(|m| m.id == own.id)
        {
            members.push(own.clone());
        }
        self.repository
            .replace_members(&room_id, members.clone())
            .await;

        if own_membership.is_some() {
            self.emitter.emit(ServerEvent::RoomUsers(
                members.into_iter().map(UserProfileDto::from).collect(),
            ));
        }
        Ok(())
    }

    async fn apply_new_message(&mut self, envelope: &Envelope) -> Result<(), String> {
        let dto: MessageDto = envelope.decode().map_err(|e| e.to_string())?;
        let message = ChatMessage::try_from(dto).map_err(|e| e.to_string())?;
        let room_id = message.room_id.clone();

        self.repository.ensure_room(room_id.clone(), None).await;
        let imported = self
            .repository
            .import_message(message.clone())
            .await
            .map_err(|e| e.to_string())?;
        if imported && self.own_membership(&room_id).await.is_some() {
            self.emitter
                .emit(ServerEvent::NewMessage(MessageDto::from(message)));
        }
        Ok(())
    }

    async fn apply_user_typing(&mut self, envelope: &Envelope) -> Result<(), String> {
        let room_id = envelope_room(envelope)?;
        let payload: UserTypingPayload = envelope.decode().map_err(|e| e.to_string())?;
        let Some(own) = self.own_membership(&room_id).await else {
            return Ok(());
        };
        if payload.user.id != own.id.as_str() {
            self.emitter.emit(ServerEvent::UserTyping(payload));
        }
        Ok(())
    }

    /// Publish this context's presence and the rosters of its rooms
    async fn republish(&mut self) {
        if self.own_presence().await.is_none() {
            return;
        }
        let users: Vec<UserProfileDto> = self
            .repository
            .active_users()
            .await
            .into_iter()
            .map(UserProfileDto::from)
            .collect();
        self.publish(Topic::ActiveUsers, None, &users).await;

        for room in self.own_rooms().await {
            let members: Vec<UserProfileDto> = room
                .members
                .into_iter()
                .map(UserProfileDto::from)
                .collect();
            self.publish(Topic::RoomUsers, Some(&room.id), &members)
                .await;
        }
    }

    /// Disconnect the local user and publish the resulting slices. Idempotent.
    pub async fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        let rooms: Vec<RoomId> = self.own_rooms().await.into_iter().map(|r| r.id).collect();
        let left = self.hub.disconnect(&self.connection_id).await;
        while self.notifications.try_recv().is_ok() {}

        if left.is_some() {
            let users: Vec<UserProfileDto> = self
                .repository
                .active_users()
                .await
                .into_iter()
                .map(UserProfileDto::from)
                .collect();
            self.publish(Topic::ActiveUsers, None, &users).await;
            for room_id in rooms {
                let Ok(room) = self.repository.get_room(&room_id).await else {
                    continue;
                };
                let members: Vec<UserProfileDto> = room
                    .members
                    .into_iter()
                    .map(UserProfileDto::from)
                    .collect();
                self.publish(Topic::RoomUsers, Some(&room_id), &members)
                    .await;
            }
            if let Err(e) = self.save_snapshot().await {
                tracing::warn!("Failed to write shared snapshot: {}", e);
            }
        }
        tracing::info!("Local simulation shut down");
    }

    /// Current shared-state view of this simulation
    pub async fn snapshot(&self) -> snapshot::SharedSnapshot {
        snapshot::capture(&self.repository).await
    }

    async fn save_snapshot(&self) -> Result<(), SimulationError> {
        let shared = snapshot::capture(&self.repository).await;
        snapshot::save(self.storage.as_ref(), &shared).await
    }

    async fn publish<T: serde::Serialize + ?Sized>(
        &self,
        topic: Topic,
        room_id: Option<&RoomId>,
        payload: &T,
    ) {
        let room_id = room_id.map(RoomId::as_str);
        if let Err(e) = self.channel.publish(topic, room_id, payload).await {
            tracing::warn!("Failed to publish {:?} envelope: {}", topic, e);
        }
    }

    /// This context's announced profile as the repository holds it
    async fn own_presence(&self) -> Option<UserProfile> {
        self.profile.as_ref()?;
        self.repository.profile_of(&self.connection_id).await
    }

    /// This context's roster entry in `room_id`, if it is a member
    async fn own_membership(&self, room_id: &RoomId) -> Option<UserProfile> {
        let own = self.profile.as_ref()?;
        let room = self.repository.get_room(room_id).await.ok()?;
        room.members.into_iter().find(|m| m.id == own.id)
    }

    async fn own_rooms(&self) -> Vec<Room> {
        let Some(own) = &self.profile else {
            return Vec::new();
        };
        self.repository
            .list_rooms()
            .await
            .into_iter()
            .filter(|room| room.is_member(&own.id))
            .collect()
    }
}

fn envelope_room(envelope: &Envelope) -> Result<RoomId, String> {
    let room_id = envelope
        .room_id
        .clone()
        .ok_or_else(|| "missing roomId".to_string())?;
    RoomId::new(room_id).map_err(|e| e.to_string())
}

fn valid_profiles(dtos: Vec<UserProfileDto>) -> Vec<UserProfile> {
    dtos.into_iter()
        .filter_map(|dto| UserProfile::try_from(dto).ok())
        .collect()
}
