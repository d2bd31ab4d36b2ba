//! Repository traits for rooms and the room directory.
//!
//! The UseCase layer depends on these traits; the in-memory implementations
//! live in the infrastructure layer.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

use super::{
    entity::{ChatMessage, ClientHandle},
    error::{DirectoryError, RoomError},
    value_object::{ConnectionId, RoomName, Timestamp, Username},
};

/// A running chat room: membership plus an ordered broadcast queue.
#[async_trait]
pub trait Room: fmt::Debug + Send + Sync {
    fn name(&self) -> &RoomName;

    fn created_at(&self) -> Timestamp;

    /// Messages buffered before producers wait
    fn queue_capacity(&self) -> usize;

    /// Add a client and announce it to the room.
    ///
    /// Joining again from the same connection is a silent no-op.
    ///
    /// # Errors
    ///
    /// `DuplicateUsername` when another connection holds the username and
    /// duplicates are rejected; `QueueClosed` if the room has stopped.
    async fn join(&self, client: ClientHandle) -> Result<(), RoomError>;

    /// Remove `username` if it is held by `connection_id`, announcing the
    /// departure. Returns whether anything was removed.
    async fn leave(&self, username: &Username, connection_id: ConnectionId) -> bool;

    /// Stamp `message` with current membership and enqueue it, waiting
    /// while the queue is full.
    ///
    /// # Errors
    ///
    /// `QueueClosed` if the room has stopped.
    async fn enqueue(&self, message: ChatMessage) -> Result<(), RoomError>;

    /// Current member usernames, sorted
    async fn members(&self) -> Vec<Username>;

    /// Whether `username` is currently held by `connection_id`
    async fn is_member(&self, username: &Username, connection_id: ConnectionId) -> bool;

    /// Stop broadcasting and wait for the worker. Safe to call repeatedly.
    async fn stop(&self);

    async fn is_running(&self) -> bool;
}

/// Process-wide mapping from room name to room.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Return the room called `name`, creating it (and starting its
    /// broadcast worker) if it does not exist yet.
    ///
    /// Check and insert happen under one lock: concurrent callers for the
    /// same unseen name all receive the same room.
    ///
    /// # Errors
    ///
    /// `DirectoryError::CapacityExceeded` when a new room would exceed the
    /// configured limit. Existing rooms are always returned.
    async fn get_or_create(&self, name: RoomName) -> Result<Arc<dyn Room>, DirectoryError>;

    /// Look up an existing room without creating it
    async fn find(&self, name: &RoomName) -> Option<Arc<dyn Room>>;

    /// Sorted snapshot of all room names
    async fn names(&self) -> Vec<RoomName>;

    /// Name-sorted snapshot of all rooms
    async fn rooms(&self) -> Vec<Arc<dyn Room>>;

    /// Stop every broadcast worker and wait for them to exit
    async fn shutdown(&self);
}
