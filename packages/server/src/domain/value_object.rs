//! Value Object 定義
//!
//! 識別子やメッセージ本文など、検証済みの値を表す newtype 群。
//! 生成時にのみ検証を行い、以降は不変として扱う。

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use super::error::ValueObjectError;

const USER_ID_MAX_LEN: usize = 128;
/// Id of the synthetic user that posts system messages.
pub const SYSTEM_USER_ID: &str = "system-1";
const ROOM_ID_MAX_LEN: usize = 64;
const CONNECTION_ID_MAX_LEN: usize = 128;
/// Maximum message length in characters.
pub const MESSAGE_CONTENT_MAX_LEN: usize = 4000;

fn check_non_empty(name: &'static str, value: &str) -> Result<(), ValueObjectError> {
    if value.trim().is_empty() {
        return Err(ValueObjectError::Empty(name));
    }
    Ok(())
}

fn check_max_len(name: &'static str, value: &str, max: usize) -> Result<(), ValueObjectError> {
    let actual = value.chars().count();
    if actual > max {
        return Err(ValueObjectError::TooLong { name, max, actual });
    }
    Ok(())
}

/// Stable identity of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        check_non_empty("user id", &value)?;
        check_max_len("user id", &value, USER_ID_MAX_LEN)?;
        Ok(Self(value))
    }

    /// The system user (`system-1`).
    pub fn system() -> Self {
        Self(SYSTEM_USER_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room identifier, e.g. `general`.
///
/// Only ASCII letters, digits, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        check_non_empty("room id", &value)?;
        check_max_len("room id", &value, ROOM_ID_MAX_LEN)?;
        if !value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ValueObjectError::InvalidCharacters("room id"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Default display name: the id with its first letter upper-cased.
    pub fn default_display_name(&self) -> String {
        let mut chars = self.0.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl TryFrom<String> for RoomId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one live transport session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        check_non_empty("connection id", &value)?;
        check_max_len("connection id", &value, CONNECTION_ID_MAX_LEN)?;
        Ok(Self(value))
    }

    /// Generate a fresh connection id (`conn-<uuid>`).
    pub fn generate() -> Self {
        Self(format!("conn-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ConnectionId {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message identifier, unique within a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        check_non_empty("message id", &value)?;
        Ok(Self(value))
    }

    /// Generate a fresh message id (`msg-<uuid>`).
    pub fn generate() -> Self {
        Self(format!("msg-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Message body. Must not be blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageContent(String);

impl MessageContent {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        check_non_empty("message content", &value)?;
        check_max_len("message content", &value, MESSAGE_CONTENT_MAX_LEN)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Unix timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}
