//! The Run Driver: resolves a workspace and run directory, starts or
//! resumes the journal, drives the engine to completion, and renders a
//! structured result. `main.rs` is a thin shell around [`run`] that
//! also re-execs into session-holder mode when invoked with the
//! session sentinel argv.

pub mod error;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use delta_core::config::{AgentManifest, HookPoint};
use delta_core::event::JournalEvent;
use delta_core::metadata::RunStatus;
use delta_core::result::{
    InteractionRequest, RunError, RunMetrics, RunResult, RunResultMetadata, Usage,
};
use delta_engine::janitor::{self, JanitorOutcome};
use delta_engine::{Engine, EngineConfig};
use delta_journal::{Journal, Workspace};
use delta_llm::{HttpLlmClient, LlmClient};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use error::RunDriverError;

/// Model/provider settings. Distinct from [`AgentManifest`], which
/// describes tools/hooks/context but never which model answers them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub endpoint: String,
    #[serde(default)]
    pub bearer_token: Option<String>,
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

/// Everything the Run Driver needs to start or continue exactly one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub workspace_root: PathBuf,
    pub agent_home: PathBuf,
    pub manifest: AgentManifest,
    pub llm: LlmConfig,
    /// `None` starts a new run (a fresh id is generated unless one is
    /// also supplied here as `Some`). `Some` with an existing run
    /// directory continues it.
    #[serde(default)]
    pub run_id: Option<String>,
    /// Caller's intent: resume an existing run rather than start a new
    /// one. A request with `continue_run: true` and no `run_id` has no
    /// run to resume and is rejected before anything is touched on disk.
    #[serde(default)]
    pub continue_run: bool,
    /// The initial task (new run) or the message delivered to a
    /// waiting/terminal run being continued.
    pub message: String,
    #[serde(default)]
    pub max_iterations_override: Option<u64>,
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
    /// Accept resuming a run recorded under a different hostname.
    #[serde(default)]
    pub force_janitor: bool,
}

fn last_thought_content(records: &[delta_core::event::JournalRecord]) -> Option<Value> {
    records.iter().rev().find_map(|r| match &r.event {
        JournalEvent::Thought { content, .. } => Some(Value::String(content.clone())),
        _ => None,
    })
}

fn read_interaction_request(journal: &Journal) -> Option<InteractionRequest> {
    let path = journal.run_dir().join("interaction").join("request.json");
    let raw: Value = serde_json::from_slice(&std::fs::read(path).ok()?).ok()?;
    Some(InteractionRequest {
        prompt: raw.get("prompt").and_then(Value::as_str).unwrap_or_default().to_string(),
        input_type: raw.get("input_type").and_then(Value::as_str).unwrap_or("text").to_string(),
        sensitive: raw.get("sensitive").and_then(Value::as_bool).unwrap_or(false),
    })
}

/// Open (or create) the run's journal, applying the new-run/continue
/// branch of the resolution procedure. Returns the journal and its
/// run id.
fn resolve_run(
    workspace: &Workspace,
    req: &RunRequest,
) -> Result<(Journal, String), RunDriverError> {
    match &req.run_id {
        None => {
            let run_id = delta_core::generate_run_id();
            let journal = Journal::create_new(workspace, &run_id)?;
            Ok((journal, run_id))
        }
        Some(run_id) if !workspace.run_exists(run_id) => {
            let journal = Journal::create_new(workspace, run_id)?;
            Ok((journal, run_id.clone()))
        }
        Some(run_id) => {
            let journal = Journal::resume(workspace, run_id)?;
            Ok((journal, run_id.clone()))
        }
    }
}

async fn continue_existing_run(journal: &Journal, req: &RunRequest) -> Result<(), RunDriverError> {
    let outcome = janitor::reconcile(journal, req.force_janitor).await?;
    if let JanitorOutcome::RefusedCrossHost { recorded_hostname, local_hostname } = outcome {
        return Err(RunDriverError::RefusedCrossHost {
            recorded: journal.read_metadata()?.run_id,
            recorded_hostname,
            local_hostname,
        });
    }

    let metadata = journal.read_metadata()?;
    if metadata.status == RunStatus::WaitingForInput {
        let interaction_dir = journal.run_dir().join("interaction");
        std::fs::create_dir_all(&interaction_dir)?;
        std::fs::write(interaction_dir.join("response.txt"), &req.message)?;
    } else if metadata.status == RunStatus::Interrupted {
        // Resume exactly where the loop left off: no injected message, just
        // let the engine pick back up from the last recorded sequence.
        journal.update_metadata(|m| {
            m.status = RunStatus::Running;
            m.end_time = None;
            m.error = None;
        })?;
    } else if metadata.status.is_terminal() {
        journal
            .append(JournalEvent::UserMessage { content: req.message.clone() })
            .await?;
        journal.update_metadata(|m| {
            m.status = RunStatus::Running;
            m.end_time = None;
            m.error = None;
        })?;
    }
    Ok(())
}

fn spawn_signal_canceller(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut terminate = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(err) => {
                    tracing::warn!(error = %err, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        cancel.cancel();
    });
}

/// Resolve the workspace and run, drive the engine to completion, and
/// produce a [`RunResult`]. Fires the `on_run_end` hook best-effort
/// before returning.
pub async fn run(req: RunRequest, cancel: CancellationToken) -> Result<RunResult, RunDriverError> {
    if req.continue_run && req.run_id.is_none() {
        return Err(RunDriverError::MissingRunIdForContinue);
    }

    delta_core::config::validate_tools(&req.manifest.tools)?;

    let workspace = Workspace::open(&req.workspace_root)?;
    let mut manifest = req.manifest.clone();
    if let Some(max_iterations) = req.max_iterations_override {
        manifest.max_iterations = max_iterations;
    }

    let is_new = req.run_id.as_ref().map(|id| !workspace.run_exists(id)).unwrap_or(true);
    let (journal, run_id) = resolve_run(&workspace, &req)?;

    if is_new {
        journal
            .append(JournalEvent::RunStart {
                run_id: run_id.clone(),
                task: req.message.clone(),
                agent_ref: manifest.agent_ref.clone(),
            })
            .await?;
        journal
            .append(JournalEvent::UserMessage { content: req.message.clone() })
            .await?;
        let metadata =
            delta_core::metadata::RunMetadata::new_running(run_id.clone(), manifest.agent_ref.clone(), req.message.clone());
        journal.initialize_metadata(&metadata)?;
    } else {
        continue_existing_run(&journal, &req).await?;
    }

    let llm: Arc<dyn LlmClient> =
        Arc::new(HttpLlmClient::new(req.llm.endpoint.clone(), req.llm.bearer_token.clone()));
    let engine_config = EngineConfig {
        model: req.llm.model.clone(),
        temperature: req.llm.temperature,
        max_tokens: req.llm.max_tokens,
        tool_timeout: req.tool_timeout_secs.map(Duration::from_secs),
    };

    let engine = Engine::new(
        journal,
        manifest.clone(),
        llm,
        engine_config,
        req.agent_home.clone(),
        req.workspace_root.clone(),
        cancel,
    );

    let status = engine.run_to_completion().await?;
    let journal = engine.journal();
    let metadata = journal.read_metadata()?;

    let result = if status == RunStatus::Completed {
        last_thought_content(&journal.read_all()?)
    } else {
        None
    };
    let error = match status {
        RunStatus::Failed | RunStatus::Interrupted => Some(RunError {
            error_type: status.to_string(),
            message: metadata.error.clone().unwrap_or_else(|| status.to_string()),
            details: None,
        }),
        _ => None,
    };
    let interaction = if status == RunStatus::WaitingForInput {
        read_interaction_request(journal)
    } else {
        None
    };
    let duration_ms = metadata
        .end_time
        .unwrap_or_else(Utc::now)
        .signed_duration_since(metadata.start_time)
        .num_milliseconds();

    let run_result = RunResult {
        schema_version: RunResult::schema_version().to_string(),
        run_id: run_id.clone(),
        status,
        result,
        error,
        interaction,
        metrics: RunMetrics {
            iterations: metadata.iterations_completed,
            duration_ms,
            start_time: metadata.start_time,
            end_time: metadata.end_time,
            usage: Usage::default(),
        },
        metadata: RunResultMetadata {
            agent_name: manifest.agent_ref.clone(),
            workspace_path: req.workspace_root.display().to_string(),
        },
    };

    if let Some(hook_def) = manifest.hooks.get(&HookPoint::OnRunEnd) {
        let payload = serde_json::to_value(&run_result).unwrap_or(Value::Null);
        if let Err(err) =
            delta_tools::run_hook(HookPoint::OnRunEnd, hook_def, journal.artifacts(), &run_id, &payload).await
        {
            tracing::warn!(error = %err, "on_run_end hook failed");
        }
    }

    Ok(run_result)
}

/// Install a Ctrl-C/SIGTERM listener that cancels `cancel` and return
/// the token to thread through [`run`].
pub fn cancellation_token_with_signal_handler() -> CancellationToken {
    let cancel = CancellationToken::new();
    spawn_signal_canceller(cancel.clone());
    cancel
}

#[cfg(test)]
mod tests {
    use super::*;
    use delta_core::config::ContextManifest;

    fn manifest() -> AgentManifest {
        AgentManifest {
            agent_ref: "agents/demo".into(),
            system_prompt: "You are a test agent.".into(),
            tools: vec![],
            hooks: Default::default(),
            context_manifest: ContextManifest::new(),
            max_iterations: 5,
        }
    }

    fn request(dir: &std::path::Path, run_id: Option<String>, message: &str) -> RunRequest {
        RunRequest {
            workspace_root: dir.to_path_buf(),
            agent_home: dir.join("agent"),
            manifest: manifest(),
            llm: LlmConfig {
                endpoint: "http://127.0.0.1:1/v1/chat".into(),
                bearer_token: None,
                model: "test-model".into(),
                temperature: None,
                max_tokens: None,
            },
            run_id,
            continue_run: false,
            message: message.to_string(),
            max_iterations_override: None,
            tool_timeout_secs: None,
            force_janitor: false,
        }
    }

    #[tokio::test]
    async fn new_run_fails_fast_when_llm_endpoint_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), None, "do the thing");
        let cancel = CancellationToken::new();
        let result = run(req, cancel).await.unwrap();
        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn continuing_an_unknown_run_id_starts_a_fresh_run() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), Some("r1".to_string()), "hi");
        let cancel = CancellationToken::new();
        let result = run(req, cancel).await.unwrap();
        assert_eq!(result.run_id, "r1");
    }

    #[tokio::test]
    async fn cancelled_token_interrupts_a_new_run_before_any_llm_call() {
        let dir = tempfile::tempdir().unwrap();
        let req = request(dir.path(), None, "hi");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run(req, cancel).await.unwrap();
        assert_eq!(result.status, RunStatus::Interrupted);
    }

    #[tokio::test]
    async fn continuing_without_a_run_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut req = request(dir.path(), None, "hi");
        req.continue_run = true;
        let cancel = CancellationToken::new();
        let err = run(req, cancel).await.unwrap_err();
        assert!(matches!(err, RunDriverError::MissingRunIdForContinue));
    }

    #[tokio::test]
    async fn resuming_an_interrupted_run_does_not_inject_a_user_message() {
        let dir = tempfile::tempdir().unwrap();
        let run_id = "r-interrupt".to_string();

        let first = request(dir.path(), Some(run_id.clone()), "start");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = run(first, cancel).await.unwrap();
        assert_eq!(result.status, RunStatus::Interrupted);

        let mut resume = request(dir.path(), Some(run_id.clone()), "resume please");
        resume.continue_run = true;
        let cancel2 = CancellationToken::new();
        let _ = run(resume, cancel2).await.unwrap();

        let workspace = Workspace::open(dir.path()).unwrap();
        let journal = Journal::resume(&workspace, &run_id).unwrap();
        let user_messages = journal
            .read_all()
            .unwrap()
            .iter()
            .filter(|r| matches!(r.event, JournalEvent::UserMessage { .. }))
            .count();
        assert_eq!(
            user_messages, 0,
            "resuming an interrupted run must not inject a UserMessage event"
        );
    }
}
