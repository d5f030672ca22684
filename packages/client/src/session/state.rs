//! Observable chat view.

use lounge_server::infrastructure::dto::websocket::{
    MessageDto, ServerEvent, TypingUserDto, UserProfileDto, UserTypingPayload,
};

use super::dedup;

/// What the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatView {
    /// Messages of the current room, ordered by timestamp
    pub messages: Vec<MessageDto>,
    /// Roster of the current room
    pub room_users: Vec<UserProfileDto>,
    /// Everyone online
    pub active_users: Vec<UserProfileDto>,
    /// Who is typing in the current room
    pub user_typing: Option<TypingUserDto>,
    pub current_room: Option<String>,
    /// The signed-in user; rosters of the current room always include them
    pub own_id: Option<String>,
}

impl ChatView {
    /// Empty view for `user_id`
    pub fn for_user(user_id: &str) -> Self {
        Self {
            own_id: Some(user_id.to_string()),
            ..Self::default()
        }
    }

    /// Apply a server event. Returns `true` when the view changed.
    pub fn apply(&mut self, event: ServerEvent, dedup_window_millis: i64) -> bool {
        match event {
            ServerEvent::ActiveUsers(users) => {
                self.active_users = users;
                true
            }
            ServerEvent::RoomUsers(users) => {
                if self.current_room.is_none() {
                    return false;
                }
                // A roster without us belongs to a room we just left
                if let Some(own_id) = &self.own_id
                    && !users.iter().any(|user| &user.id == own_id)
                {
                    return false;
                }
                self.room_users = users;
                true
            }
            ServerEvent::RoomHistory(messages) => {
                self.merge_messages(messages, dedup_window_millis)
            }
            ServerEvent::NewMessage(message) => {
                self.merge_messages(vec![message], dedup_window_millis)
            }
            ServerEvent::UserTyping(payload) => self.apply_typing(payload),
        }
    }

    /// Merge messages of the current room, skipping duplicates
    pub fn merge_messages(&mut self, messages: Vec<MessageDto>, dedup_window_millis: i64) -> bool {
        let mut changed = false;
        for message in messages {
            if self.current_room.as_deref() != Some(message.room_id.as_str()) {
                continue;
            }
            if dedup::is_duplicate(&self.messages, &message, dedup_window_millis) {
                continue;
            }
            dedup::insert_ordered(&mut self.messages, message);
            changed = true;
        }
        changed
    }

    fn apply_typing(&mut self, payload: UserTypingPayload) -> bool {
        if payload.is_typing {
            self.user_typing = Some(payload.user);
            return true;
        }
        let same_user = self
            .user_typing
            .as_ref()
            .is_some_and(|typing| typing.id == payload.user.id);
        if same_user {
            self.user_typing = None;
        }
        same_user
    }

    /// Switch to `room_id` with an empty log
    pub fn enter_room(&mut self, room_id: &str) {
        self.messages.clear();
        self.user_typing = None;
        self.room_users.clear();
        self.current_room = Some(room_id.to_string());
    }

    /// Leave `room_id` if it is the current room
    pub fn exit_room(&mut self, room_id: &str) -> bool {
        if self.current_room.as_deref() != Some(room_id) {
            return false;
        }
        self.messages.clear();
        self.user_typing = None;
        self.room_users.clear();
        self.current_room = None;
        true
    }
}
