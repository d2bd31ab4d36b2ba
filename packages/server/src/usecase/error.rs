//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{DirectoryError, ProtocolError, RoomError};

/// Errors from joining a room
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinRoomError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Errors from sending a chat message
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SendMessageError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Errors from creating a room
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CreateRoomError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
