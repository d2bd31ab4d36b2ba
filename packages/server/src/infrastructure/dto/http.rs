//! HTTP API response DTOs for the chat application.

use serde::{Deserialize, Serialize};

/// Room summary for list endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSummaryDto {
    pub name: String,
    pub users: Vec<String>,
}

/// Room detail for detail endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomDetailDto {
    pub name: String,
    pub users: Vec<String>,
    pub queue_capacity: usize,
    pub created_at: String, // RFC 3339
}
