//! A named room: membership, queue and broadcast worker.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};

use super::{
    RoomTable,
    queue::{DEFAULT_QUEUE_CAPACITY, MessageQueue},
    registry::{ClientRegistry, DuplicatePolicy},
    worker::BroadcastWorker,
};
use crate::domain::{
    ChatMessage, ClientHandle, ConnectionId, Room, RoomError, RoomName, Timestamp, Username,
};

/// Settings shared by every room of a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSettings {
    /// Messages buffered before producers block; 0 is treated as 1
    pub queue_capacity: usize,
    /// Pause between two broadcasts
    pub broadcast_interval: Duration,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            broadcast_interval: Duration::ZERO,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

/// A chat room.
///
/// Owns its registry and the stop switch of its broadcast worker. The
/// worker runs until [`Room::stop`] is called or the room is dropped.
#[derive(Debug)]
pub struct ChatRoom {
    name: RoomName,
    created_at: Timestamp,
    registry: Arc<ClientRegistry>,
    stop: watch::Sender<bool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ChatRoom {
    /// Create a room and start its broadcast worker.
    ///
    /// `directory` is only used to list room names in outgoing messages;
    /// pass `Weak::new()` for a room outside any directory.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(name: RoomName, settings: &RoomSettings, directory: Weak<RoomTable>) -> Arc<Self> {
        let capacity = settings.queue_capacity.max(1);
        let (queue, receiver) = MessageQueue::bounded(name.clone(), capacity, directory);
        let registry = Arc::new(ClientRegistry::new(
            name.clone(),
            settings.duplicate_policy,
            queue,
        ));
        let (stop, stop_receiver) = watch::channel(false);
        let worker = BroadcastWorker::new(
            name.clone(),
            Arc::clone(&registry),
            receiver,
            stop_receiver,
            settings.broadcast_interval,
        )
        .spawn();

        tracing::info!(room = %name, "Room created");
        Arc::new(Self {
            name,
            created_at: Timestamp::now(),
            registry,
            stop,
            worker: Mutex::new(Some(worker)),
        })
    }
}

#[async_trait]
impl Room for ChatRoom {
    fn name(&self) -> &RoomName {
        &self.name
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn queue_capacity(&self) -> usize {
        self.registry.queue().capacity()
    }

    async fn join(&self, client: ClientHandle) -> Result<(), RoomError> {
        self.registry.join(client).await
    }

    async fn leave(&self, username: &Username, connection_id: ConnectionId) -> bool {
        self.registry.leave(username, connection_id).await
    }

    async fn enqueue(&self, message: ChatMessage) -> Result<(), RoomError> {
        self.registry.enqueue(message).await
    }

    async fn members(&self) -> Vec<Username> {
        self.registry.snapshot().await
    }

    async fn is_member(&self, username: &Username, connection_id: ConnectionId) -> bool {
        self.registry.contains(username, connection_id).await
    }

    async fn stop(&self) {
        let _ = self.stop.send(true);
        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            tracing::warn!(room = %self.name, error = %e, "Broadcast worker ended abnormally");
        }
    }

    async fn is_running(&self) -> bool {
        self.worker
            .lock()
            .await
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }
}
