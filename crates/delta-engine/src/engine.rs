//! The TAO Engine: drives one run from its current journal state to a
//! terminal (or waiting) status, rebuilding context from scratch every
//! iteration so a crash at any point yields a resumable run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use delta_core::config::{AgentManifest, HookDefinition, HookPoint};
use delta_core::event::{ActionStatus, JournalEvent, SystemLevel, ToolCall};
use delta_core::metadata::RunStatus;
use delta_journal::Journal;
use delta_llm::{LlmClient, LlmRequest};
use delta_tools::HookOutcome;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::EngineError;

/// The built-in tool name that raises a human-input request.
pub const ASK_HUMAN_TOOL: &str = "ask_human";

/// Model/sampling parameters not carried by [`AgentManifest`] (the
/// manifest describes tools/hooks/context, not provider selection).
/// Supplied by the Run Driver alongside the manifest.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tool_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RequestPayload {
    model: String,
    messages: Vec<delta_core::message::Message>,
    tools: Vec<delta_core::config::ToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

enum Awaited<T> {
    Cancelled,
    Done(T),
}

enum AskHumanOutcome {
    Waiting,
    Skipped,
}

/// Drives one run's Think-Act-Observe loop. Holds no conversation
/// state itself: every iteration rebuilds the message list from the
/// journal via the Context Builder.
pub struct Engine {
    journal: Journal,
    manifest: AgentManifest,
    llm: Arc<dyn LlmClient>,
    config: EngineConfig,
    agent_home: PathBuf,
    workspace_root: PathBuf,
    cancel: CancellationToken,
}

impl Engine {
    pub fn new(
        journal: Journal,
        manifest: AgentManifest,
        llm: Arc<dyn LlmClient>,
        config: EngineConfig,
        agent_home: PathBuf,
        workspace_root: PathBuf,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            journal,
            manifest,
            llm,
            config,
            agent_home,
            workspace_root,
            cancel,
        }
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    async fn awaited<F, T>(&self, fut: F) -> Awaited<T>
    where
        F: std::future::Future<Output = T>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Awaited::Cancelled,
            out = fut => Awaited::Done(out),
        }
    }

    fn template_vars(&self, run_id: &str) -> delta_context::TemplateVars {
        delta_context::TemplateVars {
            agent_home: self.agent_home.display().to_string(),
            cwd: self.workspace_root.display().to_string(),
            run_id: run_id.to_string(),
        }
    }

    /// Run `hook_def` for `point` and log the resulting
    /// `HOOK_EXECUTION_AUDIT` event, pointing at the directory the hook
    /// executor already created.
    async fn run_hook(
        &self,
        point: HookPoint,
        hook_def: &HookDefinition,
        run_id: &str,
        payload: &Value,
    ) -> Result<HookOutcome, EngineError> {
        let outcome = delta_tools::run_hook(point, hook_def, self.journal.artifacts(), run_id, payload).await?;
        self.journal
            .append(JournalEvent::HookExecutionAudit {
                hook_name: point.as_str().to_string(),
                status: outcome.status,
                io_path_ref: outcome.io_path_ref.clone(),
            })
            .await?;
        Ok(outcome)
    }

    /// Fire a hook whose failure must never block the path it's
    /// guarding (`on_error`, `on_run_end`). Errors are logged and
    /// swallowed.
    async fn run_hook_best_effort(&self, point: HookPoint, run_id: &str, payload: &Value) {
        let Some(hook_def) = self.manifest.hooks.get(&point) else {
            return;
        };
        if let Err(err) = self.run_hook(point, hook_def, run_id, payload).await {
            tracing::warn!(hook = point.as_str(), error = %err, "best-effort hook failed");
        }
    }

    /// Drive the run from its current on-disk state to completion,
    /// a waiting-for-input pause, an exhausted iteration budget, or an
    /// unhandled error. Never panics on a failure that can instead be
    /// recorded as a terminal status.
    pub async fn run_to_completion(&self) -> Result<RunStatus, EngineError> {
        if let Some(status) = self.resume_pending_interaction().await? {
            return Ok(status);
        }

        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.finalize(RunStatus::Interrupted, None).await);
            }

            let metadata = self.journal.read_metadata()?;
            if metadata.iterations_completed >= self.manifest.max_iterations {
                return Ok(self
                    .finalize(RunStatus::Failed, Some("max iterations reached".to_string()))
                    .await);
            }
            let run_id = metadata.run_id.clone();

            // 1. Rebuild context. The engine keeps no conversation
            // state between iterations.
            let vars = self.template_vars(&run_id);
            let messages = match delta_context::build(
                &self.manifest.context_manifest,
                &self.journal,
                &self.workspace_root,
                &vars,
            )
            .await
            {
                Ok(m) => m,
                Err(err) => return Ok(self.fail_run(&run_id, err.into()).await),
            };

            // 2. pre_llm_req hook, possibly replacing the payload.
            let mut payload_value = serde_json::to_value(RequestPayload {
                model: self.config.model.clone(),
                messages,
                tools: self.manifest.tools.clone(),
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
            })?;
            if let Some(hook_def) = self.manifest.hooks.get(&HookPoint::PreLlmReq).cloned() {
                let original = payload_value.clone();
                let outcome = self.run_hook(HookPoint::PreLlmReq, &hook_def, &run_id, &original).await?;
                payload_value = outcome.resolved_payload(&original);
            }
            let request_payload: RequestPayload = serde_json::from_value(payload_value)?;
            let llm_request = LlmRequest {
                model: request_payload.model,
                messages: request_payload.messages,
                tools: request_payload.tools,
                temperature: request_payload.temperature,
                max_tokens: request_payload.max_tokens,
            };

            // 3. Call the LLM; persist request/response/timing.
            let invocation_id = Uuid::new_v4().to_string();
            let started = Instant::now();
            let response = match self.awaited(self.llm.complete(&llm_request)).await {
                Awaited::Cancelled => return Ok(self.finalize(RunStatus::Interrupted, None).await),
                Awaited::Done(Ok(response)) => response,
                Awaited::Done(Err(err)) => return Ok(self.fail_run(&run_id, err.into()).await),
            };
            let duration_ms = started.elapsed().as_millis() as u64;
            self.journal.artifacts().save_invocation(
                &invocation_id,
                &response.raw_request,
                &response.raw_response,
                &json!({"duration_ms": duration_ms}),
            )?;

            // 4. post_llm_resp hook (audit only; the response was
            // already persisted and logged).
            if let Some(hook_def) = self.manifest.hooks.get(&HookPoint::PostLlmResp).cloned() {
                let payload = json!({
                    "content": response.content,
                    "tool_calls": response.tool_calls,
                    "usage": response.usage,
                });
                self.run_hook(HookPoint::PostLlmResp, &hook_def, &run_id, &payload).await?;
            }

            // 5. Log THOUGHT.
            self.journal
                .append(JournalEvent::Thought {
                    content: response.content.clone(),
                    llm_invocation_ref: invocation_id,
                    tool_calls: response.tool_calls.clone(),
                })
                .await?;

            let tool_calls = response.tool_calls.unwrap_or_default();
            if tool_calls.is_empty() {
                return Ok(self.finalize(RunStatus::Completed, None).await);
            }

            // 6. Dispatch tool calls sequentially, in the order the
            // model returned them.
            for call in &tool_calls {
                if self.cancel.is_cancelled() {
                    return Ok(self.finalize(RunStatus::Interrupted, None).await);
                }

                if call.tool_name == ASK_HUMAN_TOOL {
                    match self.handle_ask_human(&run_id, call).await? {
                        AskHumanOutcome::Waiting => {
                            return Ok(self.journal.read_metadata()?.status)
                        }
                        AskHumanOutcome::Skipped => continue,
                    }
                }

                self.dispatch_tool_call(&run_id, call).await?;
            }

            // 7. Increment iterations_completed and loop.
            self.journal.update_metadata(|m| m.iterations_completed += 1)?;
        }
    }

    /// Validate, log `ACTION_REQUEST`, run `pre_tool_exec`, execute
    /// (unless skipped), run `post_tool_exec`, and log `ACTION_RESULT`.
    /// Tool failures — unknown tool, missing parameter, non-zero exit —
    /// never propagate; they become `ACTION_RESULT(FAILED)`.
    async fn dispatch_tool_call(&self, run_id: &str, call: &ToolCall) -> Result<(), EngineError> {
        let Some(tool_def) = self.manifest.tools.iter().find(|t| t.name == call.tool_name) else {
            self.journal
                .append(JournalEvent::ActionResult {
                    action_id: call.action_id.clone(),
                    status: ActionStatus::Failed,
                    observation_content: format!("unknown tool '{}'", call.tool_name),
                    execution_ref: None,
                })
                .await?;
            return Ok(());
        };

        let agent_home = self.agent_home.display().to_string();
        let cwd = self.workspace_root.display().to_string();
        let bound = match delta_tools::bind(tool_def, &call.tool_args, &agent_home, &cwd) {
            Ok(bound) => bound,
            Err(err) => {
                self.journal
                    .append(JournalEvent::ActionRequest {
                        action_id: call.action_id.clone(),
                        tool_name: call.tool_name.clone(),
                        tool_args: call.tool_args.clone(),
                        resolved_command: Vec::new(),
                    })
                    .await?;
                self.journal
                    .append(JournalEvent::ActionResult {
                        action_id: call.action_id.clone(),
                        status: ActionStatus::Failed,
                        observation_content: err.to_string(),
                        execution_ref: None,
                    })
                    .await?;
                return Ok(());
            }
        };

        self.journal
            .append(JournalEvent::ActionRequest {
                action_id: call.action_id.clone(),
                tool_name: call.tool_name.clone(),
                tool_args: call.tool_args.clone(),
                resolved_command: bound.argv.clone(),
            })
            .await?;

        if let Some(hook_def) = self.manifest.hooks.get(&HookPoint::PreToolExec).cloned() {
            let payload = json!({
                "tool_name": call.tool_name,
                "tool_args": call.tool_args,
                "resolved_command": bound.argv,
            });
            let outcome = self.run_hook(HookPoint::PreToolExec, &hook_def, run_id, &payload).await?;
            if outcome.should_skip() {
                let reason = outcome
                    .control
                    .and_then(|c| c.reason)
                    .unwrap_or_else(|| "skipped by pre_tool_exec hook".to_string());
                self.journal
                    .append(JournalEvent::ActionResult {
                        action_id: call.action_id.clone(),
                        status: ActionStatus::Success,
                        observation_content: reason,
                        execution_ref: None,
                    })
                    .await?;
                return Ok(());
            }
        }

        let outcome = delta_tools::execute(
            tool_def,
            &call.tool_args,
            &agent_home,
            &self.workspace_root,
            self.journal.artifacts(),
            self.config.tool_timeout,
        )
        .await?;

        if let Some(hook_def) = self.manifest.hooks.get(&HookPoint::PostToolExec).cloned() {
            let payload = json!({
                "tool_name": call.tool_name,
                "status": outcome.status,
                "observation_content": outcome.observation_content,
            });
            self.run_hook(HookPoint::PostToolExec, &hook_def, run_id, &payload).await?;
        }

        self.journal
            .append(JournalEvent::ActionResult {
                action_id: call.action_id.clone(),
                status: outcome.status,
                observation_content: outcome.observation_content,
                execution_ref: Some(outcome.execution_id),
            })
            .await?;
        Ok(())
    }

    /// Raise a human-input request: write `interaction/request.json`,
    /// transition to `WAITING_FOR_INPUT`, and record a `RUN_END` for
    /// that status — this pause state still gets a `RUN_END`, even
    /// though it isn't one of the terminal statuses; resuming does not
    /// start a new run.
    async fn handle_ask_human(&self, run_id: &str, call: &ToolCall) -> Result<AskHumanOutcome, EngineError> {
        self.journal
            .append(JournalEvent::ActionRequest {
                action_id: call.action_id.clone(),
                tool_name: call.tool_name.clone(),
                tool_args: call.tool_args.clone(),
                resolved_command: vec![ASK_HUMAN_TOOL.to_string()],
            })
            .await?;

        if let Some(hook_def) = self.manifest.hooks.get(&HookPoint::PreToolExec).cloned() {
            let payload = json!({"tool_name": call.tool_name, "tool_args": call.tool_args});
            let outcome = self.run_hook(HookPoint::PreToolExec, &hook_def, run_id, &payload).await?;
            if outcome.should_skip() {
                let reason = outcome
                    .control
                    .and_then(|c| c.reason)
                    .unwrap_or_else(|| "skipped by pre_tool_exec hook".to_string());
                self.journal
                    .append(JournalEvent::ActionResult {
                        action_id: call.action_id.clone(),
                        status: ActionStatus::Success,
                        observation_content: reason,
                        execution_ref: None,
                    })
                    .await?;
                return Ok(AskHumanOutcome::Skipped);
            }
        }

        let prompt = call
            .tool_args
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or("Input requested")
            .to_string();
        let input_type = call
            .tool_args
            .get("input_type")
            .and_then(Value::as_str)
            .unwrap_or("text")
            .to_string();
        let sensitive = call
            .tool_args
            .get("sensitive")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let interaction_dir = self.journal.run_dir().join("interaction");
        std::fs::create_dir_all(&interaction_dir)?;
        let request = json!({
            "action_id": call.action_id,
            "prompt": prompt,
            "input_type": input_type,
            "sensitive": sensitive,
        });
        let final_path = interaction_dir.join("request.json");
        let tmp_path = final_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_vec_pretty(&request)?)?;
        std::fs::rename(&tmp_path, &final_path)?;

        self.journal.update_metadata(|m| m.status = RunStatus::WaitingForInput)?;
        self.journal
            .append(JournalEvent::RunEnd {
                status: RunStatus::WaitingForInput,
            })
            .await?;
        Ok(AskHumanOutcome::Waiting)
    }

    /// If the run is waiting for input and a response has arrived,
    /// consume it into an `ACTION_RESULT` and return to `RUNNING`.
    /// Returns `Some(status)` when the caller should stop immediately
    /// (still waiting, nothing new to do); `None` means proceed into
    /// the main loop.
    async fn resume_pending_interaction(&self) -> Result<Option<RunStatus>, EngineError> {
        let metadata = self.journal.read_metadata()?;
        if metadata.status != RunStatus::WaitingForInput {
            return Ok(None);
        }

        let interaction_dir = self.journal.run_dir().join("interaction");
        let request_path = interaction_dir.join("request.json");
        let response_path = interaction_dir.join("response.txt");

        let request: Value = serde_json::from_slice(
            &std::fs::read(&request_path).map_err(|_| EngineError::MissingInteractionRequest)?,
        )?;
        let action_id = request
            .get("action_id")
            .and_then(Value::as_str)
            .ok_or(EngineError::MissingInteractionRequest)?
            .to_string();

        if !response_path.is_file() {
            return Ok(Some(RunStatus::WaitingForInput));
        }

        let content = std::fs::read_to_string(&response_path)?;
        self.journal
            .append(JournalEvent::ActionResult {
                action_id,
                status: ActionStatus::Success,
                observation_content: content,
                execution_ref: None,
            })
            .await?;
        let _ = std::fs::remove_file(&response_path);
        let _ = std::fs::remove_file(&request_path);
        self.journal.update_metadata(|m| m.status = RunStatus::Running)?;
        Ok(None)
    }

    /// Record an unhandled (LLM or context-build) error: a
    /// `SYSTEM_MESSAGE(ERROR)`, a best-effort `on_error` hook, then
    /// `FAILED`.
    async fn fail_run(&self, run_id: &str, err: EngineError) -> RunStatus {
        let message = err.to_string();
        let _ = self
            .journal
            .append(JournalEvent::SystemMessage {
                level: SystemLevel::Error,
                content: message.clone(),
            })
            .await;
        self.run_hook_best_effort(HookPoint::OnError, run_id, &json!({"message": message}))
            .await;
        self.finalize(RunStatus::Failed, Some(message)).await
    }

    /// Write terminal metadata and `RUN_END`. Best-effort: a failure
    /// here is itself a fatal journal/metadata I/O error, and there is
    /// nothing more constructive left to do than log it.
    async fn finalize(&self, status: RunStatus, error: Option<String>) -> RunStatus {
        let result = self.journal.update_metadata(|m| {
            m.status = status;
            m.end_time = Some(Utc::now());
            m.error = error.clone();
        });
        if let Err(err) = result {
            tracing::error!(error = %err, "failed to write terminal metadata");
        }
        if let Err(err) = self.journal.append(JournalEvent::RunEnd { status }).await {
            tracing::error!(error = %err, "failed to append RUN_END");
        }
        status
    }
}
