//! Message formatting utilities for client display.

use lounge_server::infrastructure::dto::websocket::{MessageDto, TypingUserDto, UserProfileDto};
use lounge_shared::time::timestamp_to_local_clock;

use crate::{session::ChatView, transport::state::TransportMode};

const RULE: &str = "============================================================";

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a chat message
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display
    /// * `my_id` - The current user's ID (to mark own messages)
    pub fn format_message(message: &MessageDto, my_id: &str) -> String {
        let me_suffix = if message.sender.id == my_id { " (me)" } else { "" };
        format!(
            "\n[{}] @{}{}: {}\n",
            timestamp_to_local_clock(message.timestamp),
            message.sender.name,
            me_suffix,
            message.content
        )
    }

    /// Format the roster of a room
    pub fn format_room_users(room_id: &str, users: &[UserProfileDto], my_id: &str) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\n", RULE));
        output.push_str(&format!("Members of '{}':\n", room_id));
        Self::push_users(&mut output, users, my_id);
        output.push_str(RULE);
        output.push('\n');
        output
    }

    /// Format everyone online
    pub fn format_active_users(users: &[UserProfileDto], my_id: &str) -> String {
        let mut output = String::new();
        output.push_str(&format!("\n{}\n", RULE));
        output.push_str("Online:\n");
        Self::push_users(&mut output, users, my_id);
        output.push_str(RULE);
        output.push('\n');
        output
    }

    fn push_users(output: &mut String, users: &[UserProfileDto], my_id: &str) {
        if users.is_empty() {
            output.push_str("(No users)\n");
            return;
        }
        for user in users {
            let me_suffix = if user.id == my_id { " (me)" } else { "" };
            match &user.current_room {
                Some(room) => {
                    output.push_str(&format!("{}{} - in {}\n", user.name, me_suffix, room))
                }
                None => output.push_str(&format!("{}{}\n", user.name, me_suffix)),
            }
        }
    }

    pub fn format_typing(user: &TypingUserDto) -> String {
        format!("\n... {} is typing\n", user.name)
    }

    pub fn format_joined(room_id: &str) -> String {
        format!("\n+ You joined '{}'\n", room_id)
    }

    pub fn format_left(room_id: &str) -> String {
        format!("\n- You left '{}'\n", room_id)
    }

    /// Format the backend the client ended up on
    pub fn format_mode(mode: TransportMode, url: &str) -> String {
        match mode {
            TransportMode::Live => format!("Connected to {}\n", url),
            TransportMode::Simulated => format!(
                "Server at {} is unreachable; running the local simulation.\n\
                 Other local clients using the same storage directory will see you.\n",
                url
            ),
            TransportMode::Pending => "Not connected yet\n".to_string(),
        }
    }

    pub fn format_help() -> String {
        [
            "",
            "Commands:",
            "  /join <room>  switch to a room",
            "  /leave        leave the current room",
            "  /users        members of the current room",
            "  /online       everyone online",
            "  /help         this help",
            "  /quit         exit",
            "Anything else is sent to the current room.",
            "",
        ]
        .join("\n")
    }

    /// Lines to print for the transition from `previous` to `next`
    pub fn render_changes(previous: &ChatView, next: &ChatView, my_id: &str) -> Vec<String> {
        let mut output = Vec::new();
        let same_room = previous.current_room == next.current_room;

        for message in &next.messages {
            if same_room && previous.messages.iter().any(|m| m.id == message.id) {
                continue;
            }
            output.push(Self::format_message(message, my_id));
        }

        if let Some(room_id) = &next.current_room
            && !next.room_users.is_empty()
            && (!same_room || previous.room_users != next.room_users)
        {
            output.push(Self::format_room_users(room_id, &next.room_users, my_id));
        }

        if next.user_typing != previous.user_typing
            && let Some(user) = &next.user_typing
            && user.id != my_id
        {
            output.push(Self::format_typing(user));
        }
        output
    }
}
