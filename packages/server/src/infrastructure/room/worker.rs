//! Per-room broadcast task.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use super::registry::ClientRegistry;
use crate::domain::{ChatMessage, RoomName, ServerEvent};

/// Drains one room's queue and fans every message out to the members
/// present when it is dequeued.
pub struct BroadcastWorker {
    room: RoomName,
    registry: Arc<ClientRegistry>,
    receiver: mpsc::Receiver<Arc<ChatMessage>>,
    stop: watch::Receiver<bool>,
    interval: Duration,
}

impl BroadcastWorker {
    pub fn new(
        room: RoomName,
        registry: Arc<ClientRegistry>,
        receiver: mpsc::Receiver<Arc<ChatMessage>>,
        stop: watch::Receiver<bool>,
        interval: Duration,
    ) -> Self {
        Self {
            room,
            registry,
            receiver,
            stop,
            interval,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        tracing::debug!(room = %self.room, "Broadcast worker started");
        loop {
            let message = tokio::select! {
                biased;
                // Fires on an explicit stop and when the room is dropped.
                _ = self.stop.changed() => break,
                message = self.receiver.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            self.deliver(message).await;

            if !self.interval.is_zero() {
                tokio::time::sleep(self.interval).await;
            }
        }
        tracing::debug!(room = %self.room, "Broadcast worker stopped");
    }

    /// Send `message` to every current member; returns how many accepted it.
    ///
    /// A closed or lagging connection is skipped without waiting. Its
    /// session removes it from the room on its own, so the worker never
    /// feeds its own queue.
    async fn deliver(&self, message: Arc<ChatMessage>) -> usize {
        let recipients = self.registry.handles().await;
        let mut delivered = 0;
        for client in &recipients {
            match client.send(ServerEvent::Broadcast(Arc::clone(&message))) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        room = %self.room,
                        username = %client.username(),
                        connection_id = %client.connection_id,
                        error = %e,
                        "Failed to deliver broadcast"
                    );
                }
            }
        }
        tracing::debug!(
            room = %self.room,
            recipients = recipients.len(),
            delivered,
            "Broadcast delivered"
        );
        delivered
    }
}
