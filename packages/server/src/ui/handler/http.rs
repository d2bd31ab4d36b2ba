//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    common::time::timestamp_to_rfc3339,
    domain::{RoomName, Username},
    infrastructure::dto::http::{RoomDetailDto, RoomSummaryDto},
    ui::state::AppState,
};

fn usernames(members: Vec<Username>) -> Vec<String> {
    members.into_iter().map(Username::into_string).collect()
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of rooms, sorted by name
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    let rooms = state.repository.rooms().await;

    let mut summaries = Vec::with_capacity(rooms.len());
    for room in rooms {
        summaries.push(RoomSummaryDto {
            name: room.name().as_str().to_string(),
            users: usernames(room.members().await),
        });
    }

    Json(summaries)
}

/// Get room detail by name
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<RoomDetailDto>, StatusCode> {
    let name = RoomName::new(name).map_err(|_| StatusCode::NOT_FOUND)?;
    let room = state
        .repository
        .find(&name)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;

    let room_detail = RoomDetailDto {
        name: room.name().as_str().to_string(),
        users: usernames(room.members().await),
        queue_capacity: room.queue_capacity(),
        created_at: timestamp_to_rfc3339(room.created_at().value()),
    };

    Ok(Json(room_detail))
}
