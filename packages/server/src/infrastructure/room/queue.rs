//! Per-room bounded FIFO of pending broadcasts.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc;

use super::RoomTable;
use crate::domain::{ChatMessage, RoomError, RoomName, Username};

/// Default number of broadcasts a room buffers before producers block
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;

/// Producer side of a room's queue.
///
/// Full queues make producers wait; nothing is ever dropped.
#[derive(Debug)]
pub struct MessageQueue {
    room: RoomName,
    sender: mpsc::Sender<Arc<ChatMessage>>,
    directory: Weak<RoomTable>,
}

/// A reserved place in the queue.
///
/// Reserving first lets callers wait for space before they take the
/// registry lock, then send while holding it without waiting for space.
pub struct QueueSlot<'a> {
    permit: mpsc::Permit<'a, Arc<ChatMessage>>,
}

impl MessageQueue {
    /// Create a queue holding at most `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn bounded(
        room: RoomName,
        capacity: usize,
        directory: Weak<RoomTable>,
    ) -> (Self, mpsc::Receiver<Arc<ChatMessage>>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                room,
                sender,
                directory,
            },
            receiver,
        )
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }

    /// Wait for a free place in the queue.
    ///
    /// # Errors
    ///
    /// `RoomError::QueueClosed` once the broadcast worker has stopped.
    pub async fn reserve(&self) -> Result<QueueSlot<'_>, RoomError> {
        let permit = self
            .sender
            .reserve()
            .await
            .map_err(|_| RoomError::QueueClosed(self.room.as_str().to_string()))?;
        Ok(QueueSlot { permit })
    }

    /// Sorted names of every room in the directory.
    ///
    /// A queue detached from any directory only knows its own room.
    pub async fn active_rooms(&self) -> Vec<RoomName> {
        match self.directory.upgrade() {
            Some(table) => {
                let mut names: Vec<RoomName> = table.read().await.keys().cloned().collect();
                names.sort();
                names
            }
            None => vec![self.room.clone()],
        }
    }

    /// Stamp `message` with `active_users` and the directory's room names,
    /// then put it in the reserved place.
    pub async fn send(
        &self,
        slot: QueueSlot<'_>,
        message: ChatMessage,
        active_users: Vec<Username>,
    ) {
        let active_rooms = self.active_rooms().await;
        slot.permit
            .send(Arc::new(message.stamped(active_users, active_rooms)));
    }
}
