//! Domain layer error definitions.

use thiserror::Error;

/// Errors related to Value Objects validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueObjectError {
    #[error("username cannot be empty")]
    UsernameEmpty,

    #[error("username cannot exceed {max} characters (got {actual})")]
    UsernameTooLong { max: usize, actual: usize },

    #[error("email cannot exceed {max} characters (got {actual})")]
    EmailTooLong { max: usize, actual: usize },

    #[error("room name cannot be empty")]
    RoomNameEmpty,

    #[error("room name cannot exceed {max} characters (got {actual})")]
    RoomNameTooLong { max: usize, actual: usize },

    #[error("message cannot be empty")]
    MessageBodyEmpty,

    #[error("message cannot exceed {max} characters (got {actual})")]
    MessageBodyTooLong { max: usize, actual: usize },
}

/// Errors raised by a single chat room
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// Another connection already holds this username in the room
    #[error("username '{username}' is already taken in room '{room}'")]
    DuplicateUsername { room: String, username: String },

    /// The room's broadcast worker has stopped
    #[error("room '{0}' is no longer accepting messages")]
    QueueClosed(String),

    /// A newer connection took over this username in the room
    #[error("username '{username}' was claimed by another connection in room '{room}'")]
    Replaced { room: String, username: String },
}

/// Errors raised by the room directory
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("cannot create room '{name}': limit of {max} rooms reached")]
    CapacityExceeded { name: String, max: usize },
}

/// Failure to hand an event to a connection's writer
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("connection is closed")]
    Closed,

    /// The outbound buffer is full; the connection is being shut down
    #[error("connection is not keeping up")]
    Lagging,
}

/// Protocol violations committed by a client.
///
/// None of these close the connection; they are reported back in-band.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("identify first")]
    NotIdentified,

    #[error("join a room first")]
    NotInRoom,

    #[error("cannot change identity while in room '{0}'")]
    AlreadyInRoom(String),

    #[error("session is closed")]
    SessionClosed,

    #[error("username '{0}' is reserved")]
    ReservedUsername(String),

    #[error("invalid field: {0}")]
    Invalid(#[from] ValueObjectError),

    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("only JSON text frames are supported")]
    UnsupportedFrame,
}
