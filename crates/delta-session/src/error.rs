use thiserror::Error;

/// Errors raised by session creation, lookup, or the wire protocol.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session '{0}' not found")]
    NotFound(String),

    #[error("session '{0}' holder is no longer alive (stale socket)")]
    Stale(String),

    #[error("failed to connect to session socket: {0}")]
    Connect(std::io::Error),

    #[error("session protocol I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed session protocol message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("holder process failed to start: {0}")]
    HolderSpawn(std::io::Error),
}
