//! In-memory repository implementations.

mod room;

pub use room::{DEFAULT_MAX_ROOMS, InMemoryRoomRepository};
