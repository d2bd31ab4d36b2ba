//! Server bootstrap errors.

use thiserror::Error;

use crate::domain::{DirectoryError, ValueObjectError};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("invalid default room: {0}")]
    DefaultRoom(#[from] ValueObjectError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
