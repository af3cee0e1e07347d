//! Persistent, out-of-process command-execution sessions: a detached
//! holder process owns a subordinate shell's working directory and
//! serves `exec`/`status`/`end` over a Unix-domain socket, so a
//! session outlives the engine run that started it.

pub mod client;
pub mod error;
pub mod holder;
pub mod protocol;

pub use client::{is_holder_alive, read_metadata, reap_stale, send};
pub use error::SessionError;
pub use holder::{metadata_path, socket_path, spawn_detached, HOLDER_SENTINEL_ARG};
pub use protocol::{SessionMetadata, SessionRequest, SessionResponse};
