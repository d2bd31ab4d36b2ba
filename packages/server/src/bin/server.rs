//! Agora chat server.
//!
//! Serves the room-based chat protocol on `/ws` and a small JSON API under `/api`.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin agora-server -- --static-dir public
//! ```
//!
//! No browser client ships with this crate. `--static-dir` serves any
//! directory at `/`, answering `/` with its `index.html`. The legacy browser
//! client (a single `app.js` that opens `ws://<host>/ws` and speaks
//! `createUser`/`join`/`message`/`createRoom`) works unchanged once it sits
//! in that directory next to an `index.html` that loads it and provides a
//! `chatroom-messages` element.

use agora_server::{ServerConfig, common::logger::setup_logger};
use clap::Parser;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    // Run the server
    if let Err(e) = agora_server::run_server(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
