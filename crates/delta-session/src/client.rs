//! Connects to a session's socket, writes one JSON line, reads one
//! JSON line back. Used by the engine's session tool adapter and by
//! anything else that needs to talk to a running session.

use std::path::Path;

use delta_core::liveness::{self, Liveness};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use crate::error::SessionError;
use crate::holder::{metadata_path, socket_path};
use crate::protocol::{SessionMetadata, SessionRequest, SessionResponse};

/// Read a session's persisted metadata from beside its socket.
pub fn read_metadata(sessions_dir: &Path, session_id: &str) -> Result<SessionMetadata, SessionError> {
    let path = metadata_path(sessions_dir, session_id);
    let bytes = std::fs::read(&path).map_err(|_| SessionError::NotFound(session_id.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Stale-socket detection: a session is dead if the socket file or its
/// metadata no longer exist, or if the holder PID on record is no
/// longer the process that created it.
pub fn is_holder_alive(meta: &SessionMetadata) -> bool {
    liveness::probe(meta.holder_pid, &liveness::current_process_name()) == Liveness::Alive
}

/// Send one request to `session_id`'s holder and return its response.
/// Fails with [`SessionError::Stale`] if the socket file exists but
/// the recorded holder PID is dead, without attempting to connect.
pub async fn send(
    sessions_dir: &Path,
    session_id: &str,
    request: SessionRequest,
) -> Result<SessionResponse, SessionError> {
    let meta = read_metadata(sessions_dir, session_id)?;
    if !is_holder_alive(&meta) {
        return Err(SessionError::Stale(session_id.to_string()));
    }

    let socket = socket_path(sessions_dir, session_id);
    let stream = UnixStream::connect(&socket)
        .await
        .map_err(SessionError::Connect)?;
    let (reader, mut writer) = stream.into_split();

    let mut line = serde_json::to_string(&request)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.shutdown().await?;

    let mut reader = BufReader::new(reader);
    let mut response_line = String::new();
    let n = reader.read_line(&mut response_line).await?;
    if n == 0 {
        return Err(SessionError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "holder closed the connection without responding",
        )));
    }

    Ok(serde_json::from_str(response_line.trim_end())?)
}

/// Best-effort reap of a session whose socket is stale: removes the
/// socket and metadata files without contacting any process.
pub fn reap_stale(sessions_dir: &Path, session_id: &str) {
    let _ = std::fs::remove_file(socket_path(sessions_dir, session_id));
    let _ = std::fs::remove_file(metadata_path(sessions_dir, session_id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn nonexistent_session_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_metadata(dir.path(), "missing").unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[test]
    fn holder_with_dead_pid_is_not_alive() {
        let meta = SessionMetadata {
            session_id: "s1".into(),
            command: vec!["sh".into()],
            holder_pid: u32::MAX - 1,
            subordinate_pid: None,
            created_at: Utc::now(),
            work_dir: "/tmp".into(),
        };
        assert!(!is_holder_alive(&meta));
    }

    #[test]
    fn holder_with_current_process_pid_is_alive() {
        let meta = SessionMetadata {
            session_id: "s1".into(),
            command: vec!["sh".into()],
            holder_pid: std::process::id(),
            subordinate_pid: None,
            created_at: Utc::now(),
            work_dir: "/tmp".into(),
        };
        assert!(is_holder_alive(&meta));
    }
}
