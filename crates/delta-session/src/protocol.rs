//! The newline-delimited JSON wire contract spoken over a session's
//! Unix-domain socket. One request per line in, one response per line
//! out; the holder serializes concurrent connections.

use serde::{Deserialize, Serialize};

/// A request sent by a client (engine or CLI) to a session holder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SessionRequest {
    Exec { command: String },
    Status,
    End,
}

/// The holder's response to one [`SessionRequest`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SessionResponse {
    Exec {
        stdout: String,
        stderr: String,
        exit_code: i32,
        cwd: String,
    },
    Status {
        alive: bool,
        pid: u32,
        created_at: chrono::DateTime<chrono::Utc>,
        cwd: String,
    },
    End {
        terminated: bool,
    },
    Error {
        error: String,
    },
}

/// Session metadata persisted as JSON beside the socket
/// (`<session_id>/session.json`), so any process can inspect a
/// session without going through the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub command: Vec<String>,
    pub holder_pid: u32,
    pub subordinate_pid: Option<u32>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub work_dir: String,
}
