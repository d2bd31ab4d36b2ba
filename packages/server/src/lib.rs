//! Agora: room-based WebSocket chat server library.
//!
//! Clients identify themselves, join named rooms and exchange messages that
//! are fanned out to every member of the same room. Each room buffers its
//! broadcasts in a small bounded queue drained by a dedicated worker task.

pub use agora_shared as common;

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ui;
pub mod usecase;

// Re-export entry points
pub use config::ServerConfig;
pub use ui::run as run_server;
