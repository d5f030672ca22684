//! Parsing of terminal input lines.

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Join(String),
    Leave,
    Users,
    Online,
    Help,
    Quit,
    /// Sent to the current room
    Say(String),
    /// Recognized command used wrongly; carries the usage hint
    Invalid(String),
}

/// Parse a prompt line. Blank lines yield `None`.
pub fn parse_input(line: &str) -> Option<ChatInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let argument = words.next();
    let input = match (command, argument) {
        ("/join", Some(room)) => ChatInput::Join(room.to_string()),
        ("/join", None) => ChatInput::Invalid("Usage: /join <room>".to_string()),
        ("/leave", _) => ChatInput::Leave,
        ("/users", _) => ChatInput::Users,
        ("/online", _) => ChatInput::Online,
        ("/help", _) => ChatInput::Help,
        ("/quit", _) | ("/exit", _) => ChatInput::Quit,
        _ => ChatInput::Say(line.to_string()),
    };
    Some(input)
}
