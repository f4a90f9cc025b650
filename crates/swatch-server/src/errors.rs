//! Server error types.

use thiserror::Error;

/// Errors raised while starting or running the listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding the listener failed (port in use, permission denied...).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// `host:port` we tried to bind.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The configuration cannot be served (zero interval or limit).
    #[error("invalid server config: {0}")]
    InvalidConfig(String),
    /// The accept loop stopped with an I/O error.
    #[error("server stopped: {0}")]
    Serve(#[from] std::io::Error),
}
