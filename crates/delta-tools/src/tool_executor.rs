//! Tool Executor: binds arguments, spawns the subprocess,
//! and persists captured I/O under `io/tool_executions/<id>/`.

use std::time::Duration;

use delta_core::event::ActionStatus;
use delta_journal::{ArtifactStore, ToolExecutionArtifact};
use serde_json::Value;
use uuid::Uuid;

use delta_core::config::ToolDefinition;

use crate::bind::bind;
use crate::error::ToolError;
use crate::spawn::run_bounded;

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Outcome of one tool call, ready to become an `ACTION_RESULT` event.
#[derive(Debug, Clone)]
pub struct ExecuteToolOutcome {
    pub execution_id: String,
    pub resolved_command: Vec<String>,
    pub status: ActionStatus,
    pub observation_content: String,
}

/// Format stdout/stderr/exit code into the observation text the LLM
/// sees next turn.
fn format_observation(stdout: &str, stderr: &str, exit_code: Option<i32>, timed_out: bool) -> String {
    if timed_out {
        return format!("[timed out]\nstdout:\n{stdout}\nstderr:\n{stderr}");
    }
    match exit_code {
        Some(0) => stdout.to_string(),
        Some(code) => format!("[exit {code}]\nstdout:\n{stdout}\nstderr:\n{stderr}"),
        None => format!("[no exit code]\nstdout:\n{stdout}\nstderr:\n{stderr}"),
    }
}

/// Execute `tool` with `args`, persisting I/O into `artifacts` and
/// returning an outcome ready to log as `ACTION_RESULT`. A non-zero
/// exit yields `status = FAILED` but is never a runtime error.
pub async fn execute(
    tool: &ToolDefinition,
    args: &Value,
    agent_home: &str,
    cwd: &std::path::Path,
    artifacts: &ArtifactStore,
    timeout: Option<Duration>,
) -> Result<ExecuteToolOutcome, ToolError> {
    let cwd_str = cwd.display().to_string();
    let bound = bind(tool, args, agent_home, &cwd_str)?;

    let execution_id = Uuid::new_v4().to_string();
    let outcome = run_bounded(
        &bound.argv,
        cwd,
        &bound.env,
        bound.stdin.as_deref(),
        timeout.unwrap_or(DEFAULT_TOOL_TIMEOUT),
    )
    .await?;

    artifacts.save_tool_execution(
        &execution_id,
        &ToolExecutionArtifact {
            command: &bound.argv,
            stdout: &outcome.stdout,
            stderr: &outcome.stderr,
            exit_code: outcome.exit_code,
            duration_ms: outcome.duration_ms,
        },
    )?;

    let status = if outcome.exit_code == Some(0) {
        ActionStatus::Success
    } else {
        ActionStatus::Failed
    };

    Ok(ExecuteToolOutcome {
        execution_id,
        resolved_command: bound.argv,
        status,
        observation_content: format_observation(
            &outcome.stdout,
            &outcome.stderr,
            outcome.exit_code,
            outcome.timed_out,
        ),
    })
}
