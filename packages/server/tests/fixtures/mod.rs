//! Test fixtures: an in-process server on an ephemeral port and a small
//! WebSocket client.

#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use agora_server::{ServerConfig, error::ServerError};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Server running inside the test's runtime
pub struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Start with default settings
    pub async fn start() -> Self {
        Self::start_with(&[]).await
    }

    /// Start with extra command-line flags
    pub async fn start_with(args: &[&str]) -> Self {
        let argv = std::iter::once("agora-server").chain(args.iter().copied());
        let config = ServerConfig::try_parse_from(argv).expect("invalid test config");
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(agora_server::ui::serve(listener, config, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Trigger graceful shutdown and wait for the serve loop to return
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), &mut self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// WebSocket chat client speaking the JSON protocol
pub struct ChatClient {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl ChatClient {
    pub async fn connect(server: &TestServer) -> Self {
        let (stream, _) = connect_async(server.ws_url())
            .await
            .expect("Failed to connect");
        Self { stream }
    }

    pub async fn send_json(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    pub async fn send_text(&mut self, text: &str) {
        self.stream
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("Failed to send");
    }

    pub async fn identify(&mut self, username: &str) {
        self.send_json(serde_json::json!({
            "type": "identify",
            "username": username,
            "email": format!("{username}@example.com"),
        }))
        .await;
    }

    pub async fn join(&mut self, room: &str) {
        self.send_json(serde_json::json!({"type": "join", "room": room}))
            .await;
    }

    pub async fn say(&mut self, message: &str) {
        self.send_json(serde_json::json!({"type": "message", "message": message}))
            .await;
    }

    /// Next JSON text frame, or `None` once the server has closed the connection
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            let frame = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("timed out waiting for a frame");
            match frame {
                Some(Ok(Message::Text(text))) => {
                    return Some(serde_json::from_str(text.as_str()).expect("invalid JSON"));
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                Some(Ok(_)) => continue,
            }
        }
    }

    /// Skip frames until one matches
    pub async fn recv_until(&mut self, predicate: impl Fn(&Value) -> bool) -> Value {
        loop {
            let value = self.recv().await.expect("connection closed");
            if predicate(&value) {
                return value;
            }
        }
    }

    /// Next frame with `"type": "message"` and the given body
    pub async fn recv_message(&mut self, body: &str) -> Value {
        self.recv_until(|v| v["type"] == "message" && v["message"] == body)
            .await
    }

    /// Next frame with `"type": "error"`
    pub async fn recv_error(&mut self) -> Value {
        self.recv_until(|v| v["type"] == "error").await
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
