//! The holder process: detached from its caller, owns one session's
//! working directory and serializes `exec`/`status`/`end` requests
//! arriving on its Unix-domain socket through a single command channel
//! into one task — the same "one task owns mutable state, others talk
//! to it over a channel" shape used for worker-pool ownership
//! elsewhere in this codebase.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::SessionError;
use crate::protocol::{SessionMetadata, SessionRequest, SessionResponse};

/// The sentinel first argument a re-exec'd binary checks for to enter
/// holder mode instead of its normal entry point.
pub const HOLDER_SENTINEL_ARG: &str = "__delta_session_holder__";

pub fn session_dir(sessions_dir: &Path, session_id: &str) -> PathBuf {
    sessions_dir.join(session_id)
}

pub fn socket_path(sessions_dir: &Path, session_id: &str) -> PathBuf {
    session_dir(sessions_dir, session_id).join("session.sock")
}

pub fn metadata_path(sessions_dir: &Path, session_id: &str) -> PathBuf {
    session_dir(sessions_dir, session_id).join("session.json")
}

/// Launch a holder for `session_id`, detached from the caller via
/// `setsid`, re-executing the current binary with the holder sentinel
/// argv. Returns the holder's PID as recorded before it's persisted
/// into session metadata by the holder itself.
pub fn spawn_detached(
    session_id: &str,
    sessions_dir: &Path,
    work_dir: &Path,
) -> Result<u32, SessionError> {
    std::fs::create_dir_all(session_dir(sessions_dir, session_id)).map_err(SessionError::Io)?;
    let exe = std::env::current_exe().map_err(SessionError::HolderSpawn)?;

    let mut cmd = std::process::Command::new(exe);
    cmd.arg(HOLDER_SENTINEL_ARG)
        .arg(session_id)
        .arg(sessions_dir)
        .arg(work_dir)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());

    #[cfg(unix)]
    unsafe {
        use std::os::unix::process::CommandExt;
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let child = cmd.spawn().map_err(SessionError::HolderSpawn)?;
    Ok(child.id())
}

struct HolderState {
    cwd: PathBuf,
    created_at: DateTime<Utc>,
}

enum HolderCommand {
    Exec {
        command: String,
        reply: oneshot::Sender<SessionResponse>,
    },
    Status {
        reply: oneshot::Sender<SessionResponse>,
    },
    End {
        reply: oneshot::Sender<SessionResponse>,
    },
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Splits the wrapper script's combined stdout into (command stdout,
/// new cwd, exit code) by locating the last occurrence of the unique
/// marker the wrapper script prints after the user's command finishes.
fn split_marker(raw: &str, marker: &str) -> Option<(String, String, i32)> {
    let prefix = format!("{marker}:");
    let idx = raw.rfind(&prefix)?;
    let before = raw[..idx].to_string();
    let rest = raw[idx + prefix.len()..].trim_end_matches('\n');
    let (cwd, exit_str) = rest.rsplit_once(':')?;
    let exit_code = exit_str.trim().parse::<i32>().ok()?;
    Some((before, cwd.to_string(), exit_code))
}

/// Run `command` in a fresh `sh -c` child, with the session's current
/// directory piped in via `cd` and the resulting directory (which may
/// have changed if `command` itself ran `cd`) recovered from a marker
/// line appended after the command completes.
async fn execute(state: &mut HolderState, command: &str) -> SessionResponse {
    let marker = format!("__delta_session_{}__", Uuid::new_v4().simple());
    let script = format!(
        "cd {cwd} 2>/dev/null; {{ {command}\n}}; __delta_exit=$?; printf '\\n{marker}:%s:%d\\n' \"$PWD\" \"$__delta_exit\"",
        cwd = shell_quote(&state.cwd.display().to_string()),
        command = command,
        marker = marker,
    );

    let output = tokio::process::Command::new("sh")
        .arg("-c")
        .arg(&script)
        .output()
        .await;

    match output {
        Ok(output) => {
            let stdout_raw = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            match split_marker(&stdout_raw, &marker) {
                Some((stdout, new_cwd, exit_code)) => {
                    state.cwd = PathBuf::from(new_cwd);
                    SessionResponse::Exec {
                        stdout,
                        stderr,
                        exit_code,
                        cwd: state.cwd.display().to_string(),
                    }
                }
                None => SessionResponse::Error {
                    error: "subordinate shell produced no completion marker".to_string(),
                },
            }
        }
        Err(err) => SessionResponse::Error {
            error: err.to_string(),
        },
    }
}

async fn handle_connection(
    stream: UnixStream,
    tx: mpsc::Sender<HolderCommand>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(());
    }

    let request: SessionRequest = match serde_json::from_str(line.trim_end()) {
        Ok(request) => request,
        Err(err) => {
            let mut out = serde_json::to_string(&SessionResponse::Error {
                error: err.to_string(),
            })
            .expect("SessionResponse always serializes");
            out.push('\n');
            writer.write_all(out.as_bytes()).await?;
            return Ok(());
        }
    };

    let (reply_tx, reply_rx) = oneshot::channel();
    let command = match request {
        SessionRequest::Exec { command } => HolderCommand::Exec {
            command,
            reply: reply_tx,
        },
        SessionRequest::Status => HolderCommand::Status { reply: reply_tx },
        SessionRequest::End => HolderCommand::End { reply: reply_tx },
    };

    if tx.send(command).await.is_err() {
        return Ok(());
    }
    if let Ok(response) = reply_rx.await {
        let mut out =
            serde_json::to_string(&response).expect("SessionResponse always serializes");
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
    }
    Ok(())
}

fn write_metadata(path: &Path, meta: &SessionMetadata) -> Result<(), SessionError> {
    let bytes = serde_json::to_vec_pretty(meta)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Bind the socket, persist session metadata, and serve requests until
/// an `end` request is processed or the process is killed. Blocks the
/// calling task for the session's whole lifetime.
pub async fn run(
    session_id: String,
    sessions_dir: PathBuf,
    initial_cwd: PathBuf,
) -> Result<(), SessionError> {
    let socket = socket_path(&sessions_dir, &session_id);
    let meta_path = metadata_path(&sessions_dir, &session_id);

    if socket.exists() {
        let _ = std::fs::remove_file(&socket);
    }
    if let Some(parent) = socket.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(&socket)?;
    let created_at = Utc::now();

    let metadata = SessionMetadata {
        session_id: session_id.clone(),
        command: vec!["sh".to_string()],
        holder_pid: std::process::id(),
        subordinate_pid: None,
        created_at,
        work_dir: initial_cwd.display().to_string(),
    };
    write_metadata(&meta_path, &metadata)?;

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<HolderCommand>(32);
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let owner = tokio::spawn(async move {
        let mut state = HolderState {
            cwd: initial_cwd,
            created_at,
        };
        let mut shutdown_tx = Some(shutdown_tx);
        while let Some(command) = cmd_rx.recv().await {
            match command {
                HolderCommand::Exec { command, reply } => {
                    let response = execute(&mut state, &command).await;
                    let _ = reply.send(response);
                }
                HolderCommand::Status { reply } => {
                    let _ = reply.send(SessionResponse::Status {
                        alive: true,
                        pid: std::process::id(),
                        created_at: state.created_at,
                        cwd: state.cwd.display().to_string(),
                    });
                }
                HolderCommand::End { reply } => {
                    let _ = reply.send(SessionResponse::End { terminated: true });
                    if let Some(tx) = shutdown_tx.take() {
                        let _ = tx.send(());
                    }
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let tx = cmd_tx.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, tx).await {
                                tracing::warn!(error = %err, "session connection error");
                            }
                        });
                    }
                    Err(err) => tracing::warn!(error = %err, "session socket accept failed"),
                }
            }
            _ = &mut shutdown_rx => break,
        }
    }

    owner.abort();
    let _ = std::fs::remove_file(&socket);
    let _ = std::fs::remove_file(&meta_path);
    Ok(())
}
