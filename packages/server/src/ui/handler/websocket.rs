//! WebSocket connection handlers.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitStream, StreamExt},
};
use crate::{
    domain::{ClientCommand, Outbound, ProtocolError},
    infrastructure::dto::websocket::{OutboundMessage, decode_frame},
    ui::{
        session::{Flow, ReadError, SessionDispatcher},
        state::AppState,
    },
};

/// How long the writer may keep flushing after the session ends
const WRITER_GRACE: Duration = Duration::from_millis(500);

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.max_message_size(state.max_message_bytes)
        .on_failed_upgrade(|e| tracing::warn!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound, mut events) = Outbound::channel(state.outbound_capacity);
    let mut dispatcher = SessionDispatcher::new(Arc::clone(&state.repository), outbound);
    let connection_id = dispatcher.connection_id();
    tracing::info!(connection_id = %connection_id, "Client connected");

    // Writer: serialize events for this connection in order. It stops early
    // when the connection falls behind, which ends the session below.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let json = match serde_json::to_string(&OutboundMessage::from(&event)) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(connection_id = %connection_id, error = %e, "Failed to serialize event");
                    continue;
                }
            };
            tokio::select! {
                biased;
                // The peer is not reading; a close frame would block as well.
                _ = events.lagged() => {
                    tracing::warn!(connection_id = %connection_id, "Client fell behind, dropping connection");
                    return;
                }
                result = sender.send(Message::Text(json.into())) => {
                    if let Err(e) = result {
                        tracing::debug!(connection_id = %connection_id, error = %e, "Write failed");
                        return;
                    }
                }
            }
        }
        let _ = tokio::time::timeout(WRITER_GRACE, sender.close()).await;
    });

    loop {
        let (message, error) = tokio::select! {
            read = next_read(&mut receiver, state.idle_timeout) => read,
            _ = &mut send_task => (None, Some(ReadError::Transport("writer stopped".to_string()))),
        };
        if dispatcher.on_read(message, error).await == Flow::Terminate {
            break;
        }
    }

    // on_read has already left the room, so this drops the last sender and
    // lets the writer flush what is queued.
    drop(dispatcher);
    if !send_task.is_finished() && tokio::time::timeout(WRITER_GRACE, &mut send_task).await.is_err() {
        send_task.abort();
    }
    tracing::info!(connection_id = %connection_id, "Client disconnected");
}

/// Read one frame and classify it.
async fn next_read(
    receiver: &mut SplitStream<WebSocket>,
    idle_timeout: Option<Duration>,
) -> (Option<ClientCommand>, Option<ReadError>) {
    let frame = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, receiver.next()).await {
            Ok(frame) => frame,
            Err(_) => return (None, Some(ReadError::IdleTimeout)),
        },
        None => receiver.next().await,
    };

    match frame {
        None => (None, Some(ReadError::Closed)),
        Some(Err(e)) => (None, Some(ReadError::Transport(e.to_string()))),
        Some(Ok(Message::Text(text))) => {
            let decoded = decode_frame(text.as_str());
            (decoded.command, decoded.error.map(ReadError::Protocol))
        }
        Some(Ok(Message::Binary(_))) => {
            (None, Some(ReadError::Protocol(ProtocolError::UnsupportedFrame)))
        }
        Some(Ok(Message::Close(_))) => (None, Some(ReadError::Closed)),
        // Ping/pong are answered by the protocol layer
        Some(Ok(_)) => (None, None),
    }
}
