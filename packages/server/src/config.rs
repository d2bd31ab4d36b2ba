//! Server configuration from command-line flags and `AGORA_*` environment variables.

use std::{path::PathBuf, time::Duration};

use clap::Parser;

use crate::{
    domain::DEFAULT_OUTBOUND_CAPACITY,
    infrastructure::{
        repository::DEFAULT_MAX_ROOMS,
        room::{DEFAULT_QUEUE_CAPACITY, DuplicatePolicy, RoomSettings},
    },
};

/// Agora chat server
#[derive(Parser, Debug, Clone)]
#[command(name = "agora-server", version, about = "Room-based WebSocket chat server")]
pub struct ServerConfig {
    /// Bind address
    #[arg(long, env = "AGORA_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "AGORA_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Messages buffered per room before senders wait
    #[arg(
        long,
        env = "AGORA_QUEUE_CAPACITY",
        default_value_t = DEFAULT_QUEUE_CAPACITY,
        value_parser = parse_capacity
    )]
    pub queue_capacity: usize,

    /// Events buffered per connection; a client that falls this far behind
    /// is disconnected
    #[arg(
        long,
        env = "AGORA_OUTBOUND_CAPACITY",
        default_value_t = DEFAULT_OUTBOUND_CAPACITY,
        value_parser = parse_capacity
    )]
    pub outbound_capacity: usize,

    /// Pause between two broadcasts of a room, in milliseconds
    #[arg(long, env = "AGORA_BROADCAST_INTERVAL_MS", default_value_t = 0)]
    pub broadcast_interval_ms: u64,

    /// What to do when a username is already taken in a room
    #[arg(long, env = "AGORA_DUPLICATE_POLICY", value_enum, default_value_t = DuplicatePolicy::Reject)]
    pub duplicate_policy: DuplicatePolicy,

    /// Upper bound on the number of rooms
    #[arg(long, env = "AGORA_MAX_ROOMS", default_value_t = DEFAULT_MAX_ROOMS)]
    pub max_rooms: usize,

    /// Largest accepted WebSocket message, in bytes
    #[arg(long, env = "AGORA_MAX_MESSAGE_BYTES", default_value_t = 16 * 1024)]
    pub max_message_bytes: usize,

    /// Close connections that stay silent this long
    #[arg(long, env = "AGORA_IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Room created at startup
    #[arg(long, env = "AGORA_DEFAULT_ROOM", default_value = "main")]
    pub default_room: String,

    /// Directory with the browser client, served at `/`
    #[arg(long, env = "AGORA_STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// Default log level for the server crate (overridden by RUST_LOG)
    #[arg(long, env = "AGORA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            queue_capacity: self.queue_capacity,
            broadcast_interval: Duration::from_millis(self.broadcast_interval_ms),
            duplicate_policy: self.duplicate_policy,
        }
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_capacity(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("capacity must be at least 1".to_string()),
        Ok(capacity) => Ok(capacity),
        Err(e) => Err(e.to_string()),
    }
}
