//! Per-room set of clients keyed by username.

use std::collections::HashMap;

use tokio::sync::Mutex;

use super::queue::MessageQueue;
use crate::domain::{
    ChatMessage, ClientHandle, ConnectionId, RoomError, RoomName, ServerEvent,
    SystemMessageFactory, Username,
};

/// What happens when a second connection joins under a taken username
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DuplicatePolicy {
    /// Keep the current member and refuse the newcomer
    #[default]
    Reject,
    /// Replace the current member with the newcomer
    Overwrite,
}

/// Room membership plus the queue its notices go to.
///
/// Every mutation happens under `clients`. Join and leave notices are sent
/// before that lock is released, so they are ordered with the membership
/// change they describe.
#[derive(Debug)]
pub struct ClientRegistry {
    room: RoomName,
    clients: Mutex<HashMap<Username, ClientHandle>>,
    policy: DuplicatePolicy,
    queue: MessageQueue,
}

impl ClientRegistry {
    pub fn new(room: RoomName, policy: DuplicatePolicy, queue: MessageQueue) -> Self {
        Self {
            room,
            clients: Mutex::new(HashMap::new()),
            policy,
            queue,
        }
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    /// Add a client and announce it to the room.
    ///
    /// Joining again from the same connection is a silent no-op. Under
    /// [`DuplicatePolicy::Overwrite`] the displaced connection is sent a
    /// rejection and is no longer a member.
    ///
    /// # Errors
    ///
    /// `DuplicateUsername` under [`DuplicatePolicy::Reject`] when another
    /// connection holds the username (membership unchanged, nothing
    /// announced); `QueueClosed` if the room has stopped.
    pub async fn join(&self, client: ClientHandle) -> Result<(), RoomError> {
        let slot = self.queue.reserve().await?;
        let mut clients = self.clients.lock().await;
        let username = client.username().clone();

        if let Some(existing) = clients.get(&username) {
            if existing.connection_id == client.connection_id {
                return Ok(());
            }
            match self.policy {
                DuplicatePolicy::Reject => {
                    tracing::warn!(
                        room = %self.room,
                        username = %username,
                        "Client already in chatroom, rejecting join"
                    );
                    return Err(RoomError::DuplicateUsername {
                        room: self.room.as_str().to_string(),
                        username: username.into_string(),
                    });
                }
                DuplicatePolicy::Overwrite => {
                    tracing::info!(
                        room = %self.room,
                        username = %username,
                        replaced = %existing.connection_id,
                        "Replacing client with the same username"
                    );
                }
            }
        }

        let displaced = clients.insert(username.clone(), client);
        self.queue
            .send(
                slot,
                SystemMessageFactory::joined(self.room.clone(), &username),
                sorted_usernames(&clients),
            )
            .await;
        tracing::info!(room = %self.room, username = %username, "Client joined");

        if let Some(displaced) = displaced {
            let reason = RoomError::Replaced {
                room: self.room.as_str().to_string(),
                username: username.as_str().to_string(),
            };
            let event = ServerEvent::Rejected {
                room: Some(self.room.clone()),
                reason: reason.to_string(),
            };
            if let Err(e) = displaced.send(event) {
                tracing::debug!(
                    room = %self.room,
                    connection_id = %displaced.connection_id,
                    error = %e,
                    "Displaced client could not be notified"
                );
            }
        }
        Ok(())
    }

    /// Remove `username` if it is held by `connection_id`, announcing the
    /// departure. Returns whether anything was removed.
    ///
    /// Absent members, and members since replaced by another connection,
    /// are left alone.
    pub async fn leave(&self, username: &Username, connection_id: ConnectionId) -> bool {
        // A stopped room still drops the member; it just cannot announce it.
        let slot = self.queue.reserve().await.ok();
        let mut clients = self.clients.lock().await;

        let owned = clients
            .get(username)
            .is_some_and(|client| client.connection_id == connection_id);
        if !owned {
            return false;
        }
        clients.remove(username);

        if let Some(slot) = slot {
            self.queue
                .send(
                    slot,
                    SystemMessageFactory::left(self.room.clone(), username),
                    sorted_usernames(&clients),
                )
                .await;
        }
        tracing::info!(room = %self.room, username = %username, "Client left");
        true
    }

    /// Stamp `message` with current membership and enqueue it, waiting
    /// while the queue is full.
    ///
    /// # Errors
    ///
    /// `QueueClosed` if the room has stopped.
    pub async fn enqueue(&self, message: ChatMessage) -> Result<(), RoomError> {
        let slot = self.queue.reserve().await?;
        let active_users = self.snapshot().await;
        self.queue.send(slot, message, active_users).await;
        Ok(())
    }

    /// Whether `username` is held by `connection_id`
    pub async fn contains(&self, username: &Username, connection_id: ConnectionId) -> bool {
        let clients = self.clients.lock().await;
        clients
            .get(username)
            .is_some_and(|client| client.connection_id == connection_id)
    }

    /// Point-in-time copy of member usernames, sorted
    pub async fn snapshot(&self) -> Vec<Username> {
        let clients = self.clients.lock().await;
        sorted_usernames(&clients)
    }

    /// Point-in-time copy of member handles, for delivery
    pub async fn handles(&self) -> Vec<ClientHandle> {
        let clients = self.clients.lock().await;
        clients.values().cloned().collect()
    }
}

fn sorted_usernames(clients: &HashMap<Username, ClientHandle>) -> Vec<Username> {
    let mut usernames: Vec<Username> = clients.keys().cloned().collect();
    usernames.sort();
    usernames
}
