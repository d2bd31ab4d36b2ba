//! Domain layer for the chat application.
//!
//! This module contains business logic that is independent of
//! data transfer objects (DTOs) and transport concerns.

pub mod entity;
pub mod error;
pub mod factory;
pub mod repository;
pub mod value_object;

pub use entity::{
    Author, ChatMessage, Client, ClientCommand, ClientHandle, DEFAULT_OUTBOUND_CAPACITY, Identity,
    Outbound, OutboundReceiver, SYSTEM_USERNAME, ServerEvent, SessionState,
};
pub use error::{DirectoryError, ProtocolError, RoomError, TransportError, ValueObjectError};
pub use factory::{ConnectionIdFactory, SystemMessageFactory};
pub use repository::{Room, RoomRepository};
#[cfg(test)]
pub use repository::MockRoomRepository;
pub use value_object::{ConnectionId, Email, MessageBody, RoomName, Timestamp, Username};
