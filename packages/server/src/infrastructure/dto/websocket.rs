//! WebSocket message DTOs for the chat application.

use serde::{Deserialize, Serialize};

use crate::domain::{
    ClientCommand, Email, Identity, MessageBody, ProtocolError, RoomName, SYSTEM_USERNAME,
    ServerEvent, Username,
};

/// Inbound message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InboundType {
    #[serde(alias = "createUser")]
    Identify,
    Join,
    Message,
    CreateRoom,
}

/// Message sent by a client. Missing fields default to empty strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub r#type: InboundType,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub room: String,
    #[serde(default)]
    pub message: String,
}

impl TryFrom<InboundMessage> for ClientCommand {
    type Error = ProtocolError;

    fn try_from(dto: InboundMessage) -> Result<Self, Self::Error> {
        let command = match dto.r#type {
            InboundType::Identify => ClientCommand::Identify(Identity::new(
                Username::new(dto.username)?,
                Email::new(dto.email)?,
            )?),
            InboundType::Join => ClientCommand::Join(RoomName::new(dto.room)?),
            InboundType::Message => ClientCommand::Chat(MessageBody::new(dto.message)?),
            InboundType::CreateRoom => ClientCommand::CreateRoom(RoomName::new(dto.room)?),
        };
        Ok(command)
    }
}

/// Result of decoding one text frame.
///
/// Both halves may be set: a frame holding a valid message followed by
/// trailing bytes yields the command and an error about the remainder.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DecodedFrame {
    pub command: Option<ClientCommand>,
    pub error: Option<ProtocolError>,
}

/// Decode one JSON text frame into a command.
pub fn decode_frame(text: &str) -> DecodedFrame {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<InboundMessage>();

    let mut decoded = match stream.next() {
        None => DecodedFrame {
            command: None,
            error: Some(ProtocolError::Malformed("empty frame".to_string())),
        },
        Some(Err(e)) => DecodedFrame {
            command: None,
            error: Some(ProtocolError::Malformed(e.to_string())),
        },
        Some(Ok(dto)) => match ClientCommand::try_from(dto) {
            Ok(command) => DecodedFrame {
                command: Some(command),
                error: None,
            },
            Err(e) => DecodedFrame {
                command: None,
                error: Some(e),
            },
        },
    };

    if decoded.error.is_none() && stream.next().is_some() {
        decoded.error = Some(ProtocolError::Malformed(
            "unexpected data after the first message".to_string(),
        ));
    }
    decoded
}

/// Outbound message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutboundType {
    Message,
    Error,
}

/// Message pushed to a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub r#type: OutboundType,
    pub email: String,
    pub username: String,
    pub room: String,
    pub message: String,
    /// Members of the room when the message was enqueued
    pub users: Vec<String>,
    /// All rooms known when the message was enqueued
    pub rooms: Vec<String>,
    /// Unix timestamp (milliseconds)
    pub timestamp: i64,
}

impl From<&ServerEvent> for OutboundMessage {
    fn from(event: &ServerEvent) -> Self {
        match event {
            ServerEvent::Broadcast(message) => Self {
                r#type: OutboundType::Message,
                email: message.author.email().to_string(),
                username: message.author.username().to_string(),
                room: message.room.as_str().to_string(),
                message: message.body.as_str().to_string(),
                users: message
                    .active_users
                    .iter()
                    .map(|u| u.as_str().to_string())
                    .collect(),
                rooms: message
                    .active_rooms
                    .iter()
                    .map(|r| r.as_str().to_string())
                    .collect(),
                timestamp: message.timestamp.value(),
            },
            ServerEvent::Rejected { room, reason } => Self {
                r#type: OutboundType::Error,
                email: SYSTEM_USERNAME.to_string(),
                username: SYSTEM_USERNAME.to_string(),
                room: room
                    .as_ref()
                    .map(|r| r.as_str().to_string())
                    .unwrap_or_default(),
                message: reason.clone(),
                users: Vec::new(),
                rooms: Vec::new(),
                timestamp: crate::common::time::now_millis(),
            },
        }
    }
}
