//! Server bootstrap: state, router and serve loop.

use std::{future::Future, path::Path, sync::Arc};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};

use super::{
    handler::{get_room_detail, get_rooms, health_check, websocket_handler},
    signal::shutdown_signal,
    state::AppState,
};
use crate::{
    config::ServerConfig, domain::RoomName, error::ServerError,
    infrastructure::repository::InMemoryRoomRepository,
};

/// Build the shared state with a fresh in-memory room directory.
pub fn build_state(config: &ServerConfig) -> Arc<AppState> {
    let repository = Arc::new(InMemoryRoomRepository::new(
        config.room_settings(),
        config.max_rooms,
    ));
    Arc::new(AppState {
        repository,
        outbound_capacity: config.outbound_capacity,
        max_message_bytes: config.max_message_bytes,
        idle_timeout: config.idle_timeout(),
    })
}

/// Build the router. Static files are served for every other path when a
/// directory is given.
pub fn build_router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/health", get(health_check))
        .route("/api/rooms", get(get_rooms))
        .route("/api/rooms/{name}", get(get_room_detail))
        .with_state(state);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };
    router.layer(TraceLayer::new_for_http())
}

/// Bind to the configured address and serve until Ctrl-C / SIGTERM.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.clone(),
            source,
        })?;
    serve(listener, config, shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves, then stop
/// every room's broadcast worker.
pub async fn serve<F>(
    listener: TcpListener,
    config: ServerConfig,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = build_state(&config);
    let default_room = RoomName::new(config.default_room.clone())?;
    state.repository.get_or_create(default_room).await?;

    let app = build_router(Arc::clone(&state), config.static_dir.as_deref());
    match listener.local_addr() {
        Ok(addr) => tracing::info!("Listening on {}", addr),
        Err(e) => tracing::warn!(error = %e, "Listening on unknown address"),
    }

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve);

    state.repository.shutdown().await;
    tracing::info!("Server stopped");
    result
}
