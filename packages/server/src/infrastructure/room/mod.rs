//! Chat room runtime: per-room registry, bounded queue and broadcast worker.

mod chat_room;
mod queue;
mod registry;
mod worker;

use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use crate::domain::RoomName;

pub use chat_room::{ChatRoom, RoomSettings};
pub use queue::{DEFAULT_QUEUE_CAPACITY, MessageQueue, QueueSlot};
pub use registry::{ClientRegistry, DuplicatePolicy};
pub use worker::BroadcastWorker;

/// The directory's name → room table
pub type RoomTable = RwLock<HashMap<RoomName, Arc<ChatRoom>>>;
