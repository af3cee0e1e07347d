//! Run metadata.
//!
//! Rewritten atomically on every status change; the on-disk schema is a
//! testable contract, not an implementation detail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `status` forms a DAG rooted at `Running`. `Completed`, `Failed`,
/// and `Interrupted` are terminal; `WaitingForInput` returns to `Running`
/// on resume.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunStatus {
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "WAITING_FOR_INPUT")]
    WaitingForInput,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "INTERRUPTED")]
    Interrupted,
}

impl RunStatus {
    /// Terminal statuses end the run; no further journal writes follow
    /// except the `RUN_END` that carries this status.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Interrupted
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "RUNNING",
            RunStatus::WaitingForInput => "WAITING_FOR_INPUT",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
            RunStatus::Interrupted => "INTERRUPTED",
        };
        write!(f, "{s}")
    }
}

/// The run metadata record. Persisted as `metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetadata {
    pub run_id: String,
    pub agent_ref: String,
    pub task: String,
    pub status: RunStatus,
    pub iterations_completed: u64,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub pid: u32,
    pub hostname: String,
    pub process_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunMetadata {
    /// Build fresh metadata for a run that is about to start, stamping
    /// the current process's pid/hostname/name for crash recovery.
    pub fn new_running(run_id: String, agent_ref: String, task: String) -> Self {
        Self {
            run_id,
            agent_ref,
            task,
            status: RunStatus::Running,
            iterations_completed: 0,
            start_time: Utc::now(),
            end_time: None,
            pid: std::process::id(),
            hostname: crate::liveness::local_hostname(),
            process_name: crate::liveness::current_process_name(),
            error: None,
        }
    }
}
