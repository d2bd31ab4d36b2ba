//! Domain factories for creating domain entities and value objects.

use super::{
    entity::{Author, ChatMessage},
    value_object::{ConnectionId, MessageBody, RoomName, Timestamp, Username},
};

/// Factory for generating ConnectionId instances.
pub struct ConnectionIdFactory;

impl ConnectionIdFactory {
    /// Generate a new ConnectionId with a random UUID v4.
    pub fn generate() -> ConnectionId {
        ConnectionId::from_uuid(uuid::Uuid::new_v4())
    }
}

/// Factory for system-authored room notices.
pub struct SystemMessageFactory;

impl SystemMessageFactory {
    /// "<username> has joined the chat."
    pub fn joined(room: RoomName, username: &Username) -> ChatMessage {
        Self::notice(room, format!("{username} has joined the chat."))
    }

    /// "<username> has left the chat."
    pub fn left(room: RoomName, username: &Username) -> ChatMessage {
        Self::notice(room, format!("{username} has left the chat."))
    }

    fn notice(room: RoomName, text: String) -> ChatMessage {
        ChatMessage::new(
            Author::System,
            room,
            MessageBody::from_notice(text),
            Timestamp::now(),
        )
    }
}
