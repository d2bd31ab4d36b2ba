//! Value Objects for domain models.
//!
//! Value Objects are immutable objects that represent values in the domain.
//! They are compared by their value, not by identity.

use std::fmt;

use super::error::ValueObjectError;

/// Maximum length of a username (characters)
pub const USERNAME_MAX_LEN: usize = 32;

/// Maximum length of an email address (characters)
pub const EMAIL_MAX_LEN: usize = 254;

/// Maximum length of a room name (characters)
pub const ROOM_NAME_MAX_LEN: usize = 64;

/// Maximum length of a message body (characters)
pub const MESSAGE_BODY_MAX_LEN: usize = 10_000;

/// Username value object.
///
/// Unique key of a client inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Username(String);

impl Username {
    /// Create a new Username.
    ///
    /// Surrounding whitespace is trimmed before validation.
    ///
    /// # Errors
    ///
    /// Returns `UsernameEmpty` or `UsernameTooLong`.
    pub fn new(username: String) -> Result<Self, ValueObjectError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ValueObjectError::UsernameEmpty);
        }
        let len = username.chars().count();
        if len > USERNAME_MAX_LEN {
            return Err(ValueObjectError::UsernameTooLong {
                max: USERNAME_MAX_LEN,
                actual: len,
            });
        }
        Ok(Self(username.to_string()))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Username {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Email value object.
///
/// Only used for display (avatar lookup on the client side), so an empty
/// address is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Email(String);

impl Email {
    /// Create a new Email.
    ///
    /// # Errors
    ///
    /// Returns `EmailTooLong` if the address exceeds [`EMAIL_MAX_LEN`].
    pub fn new(email: String) -> Result<Self, ValueObjectError> {
        let email = email.trim();
        let len = email.chars().count();
        if len > EMAIL_MAX_LEN {
            return Err(ValueObjectError::EmailTooLong {
                max: EMAIL_MAX_LEN,
                actual: len,
            });
        }
        Ok(Self(email.to_string()))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room name value object.
///
/// Rooms are addressed by name; the name is the directory key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomName(String);

impl RoomName {
    /// Create a new RoomName.
    ///
    /// # Errors
    ///
    /// Returns `RoomNameEmpty` or `RoomNameTooLong`.
    pub fn new(name: String) -> Result<Self, ValueObjectError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValueObjectError::RoomNameEmpty);
        }
        let len = name.chars().count();
        if len > ROOM_NAME_MAX_LEN {
            return Err(ValueObjectError::RoomNameTooLong {
                max: ROOM_NAME_MAX_LEN,
                actual: len,
            });
        }
        Ok(Self(name.to_string()))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to owned String.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl TryFrom<String> for RoomName {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RoomName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message body value object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody(String);

impl MessageBody {
    /// Create a new MessageBody.
    ///
    /// Unlike names, the body is kept verbatim.
    ///
    /// # Errors
    ///
    /// Returns `MessageBodyEmpty` or `MessageBodyTooLong`.
    pub fn new(body: String) -> Result<Self, ValueObjectError> {
        if body.trim().is_empty() {
            return Err(ValueObjectError::MessageBodyEmpty);
        }
        let len = body.chars().count();
        if len > MESSAGE_BODY_MAX_LEN {
            return Err(ValueObjectError::MessageBodyTooLong {
                max: MESSAGE_BODY_MAX_LEN,
                actual: len,
            });
        }
        Ok(Self(body))
    }

    /// Server-authored text, which is not subject to client limits.
    pub(super) fn from_notice(text: String) -> Self {
        Self(text)
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for MessageBody {
    type Error = ValueObjectError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Connection identifier value object.
///
/// Distinguishes two connections that claim the same username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(uuid::Uuid);

impl ConnectionId {
    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp value object.
///
/// Represents a Unix timestamp in milliseconds (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a new Timestamp.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Current time.
    pub fn now() -> Self {
        Self(crate::common::time::now_millis())
    }

    /// Get the inner i64 value.
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
