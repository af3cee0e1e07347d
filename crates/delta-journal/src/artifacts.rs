//! The `io/` artifact tree: every `THOUGHT` references
//! `io/invocations/<id>/`, every `ACTION_RESULT` references
//! `io/tool_executions/<id>/`, every `HOOK_EXECUTION_AUDIT` references
//! `io/hooks/<NNN>_<hook>/`. These directories exist whenever the
//! corresponding event exists.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;

use crate::error::JournalError;

/// Captured I/O for one tool subprocess execution.
#[derive(Debug, Clone)]
pub struct ToolExecutionArtifact<'a> {
    pub command: &'a [String],
    pub stdout: &'a str,
    pub stderr: &'a str,
    pub exit_code: Option<i32>,
    pub duration_ms: u128,
}

/// Manages the `io/` subtree under one run directory.
pub struct ArtifactStore {
    run_dir: PathBuf,
    hook_seq: AtomicU64,
}

impl ArtifactStore {
    /// Open the artifact store for `run_dir`, creating the `io/*`
    /// directories if absent and resuming the hook sequence counter
    /// from however many `io/hooks/<NNN>_*` directories already exist.
    pub fn open(run_dir: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let run_dir = run_dir.into();
        std::fs::create_dir_all(run_dir.join("io/invocations"))?;
        std::fs::create_dir_all(run_dir.join("io/tool_executions"))?;
        std::fs::create_dir_all(run_dir.join("io/hooks"))?;

        let mut max_seq = 0u64;
        if let Ok(entries) = std::fs::read_dir(run_dir.join("io/hooks")) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Some(prefix) = name.split('_').next() {
                        if let Ok(n) = prefix.parse::<u64>() {
                            max_seq = max_seq.max(n);
                        }
                    }
                }
            }
        }

        Ok(Self {
            run_dir,
            hook_seq: AtomicU64::new(max_seq),
        })
    }

    pub fn invocation_dir(&self, invocation_id: &str) -> PathBuf {
        self.run_dir.join("io/invocations").join(invocation_id)
    }

    pub fn tool_execution_dir(&self, execution_id: &str) -> PathBuf {
        self.run_dir.join("io/tool_executions").join(execution_id)
    }

    /// Allocate the next run-scoped hook sequence number and return the
    /// directory `io/hooks/<NNN>_<hook_name>/` for it (not yet created).
    pub fn next_hook_dir(&self, hook_name: &str) -> (u64, PathBuf) {
        let seq = self.hook_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let dir = self
            .run_dir
            .join("io/hooks")
            .join(format!("{:03}_{}", seq, hook_name));
        (seq, dir)
    }

    /// Persist one LLM invocation's request/response/metadata.
    pub fn save_invocation(
        &self,
        invocation_id: &str,
        request: &Value,
        response: &Value,
        metadata: &Value,
    ) -> Result<(), JournalError> {
        let dir = self.invocation_dir(invocation_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("request.json"), serde_json::to_vec_pretty(request)?)?;
        std::fs::write(
            dir.join("response.json"),
            serde_json::to_vec_pretty(response)?,
        )?;
        std::fs::write(
            dir.join("metadata.json"),
            serde_json::to_vec_pretty(metadata)?,
        )?;
        Ok(())
    }

    /// Persist one tool subprocess execution's captured I/O.
    pub fn save_tool_execution(
        &self,
        execution_id: &str,
        artifact: &ToolExecutionArtifact<'_>,
    ) -> Result<(), JournalError> {
        let dir = self.tool_execution_dir(execution_id);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join("command.txt"), artifact.command.join(" "))?;
        std::fs::write(dir.join("stdout.log"), artifact.stdout)?;
        std::fs::write(dir.join("stderr.log"), artifact.stderr)?;
        std::fs::write(
            dir.join("exit_code.txt"),
            artifact
                .exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "timeout".to_string()),
        )?;
        std::fs::write(
            dir.join("duration_ms.txt"),
            artifact.duration_ms.to_string(),
        )?;
        Ok(())
    }
}
