//! Server state shared by all handlers.

use std::{sync::Arc, time::Duration};

use crate::domain::RoomRepository;

/// Shared application state
pub struct AppState {
    /// Repository（ルームディレクトリの抽象化）
    pub repository: Arc<dyn RoomRepository>,
    /// Events buffered per connection before it is dropped as lagging
    pub outbound_capacity: usize,
    /// Largest accepted WebSocket message, in bytes
    pub max_message_bytes: usize,
    /// Silence after which a connection is closed
    pub idle_timeout: Option<Duration>,
}
