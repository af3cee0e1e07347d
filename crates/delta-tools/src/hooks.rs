//! Hook Executor: runs an external command at a lifecycle point,
//! exchanging structured data through a per-invocation directory.

use std::time::Duration;

use chrono::Utc;
use delta_core::config::{HookDefinition, HookPoint};
use delta_core::event::HookStatus;
use delta_journal::ArtifactStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HookError;
use crate::spawn::run_bounded;

/// `input/context.json` contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookContext {
    pub hook_name: String,
    pub step_index: u64,
    pub run_id: String,
    pub timestamp: chrono::DateTime<Utc>,
}

/// `output/control.json` contents, independent of payload output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HookControl {
    #[serde(default)]
    pub skip: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Outcome of one hook invocation.
#[derive(Debug, Clone)]
pub struct HookOutcome {
    pub status: HookStatus,
    pub io_path_ref: String,
    /// Preferred override of the proposed payload (`final_payload.json`),
    /// taking precedence over `payload_override`.
    pub final_payload: Option<Value>,
    /// Raw bytes from `payload_override.dat`, used only if
    /// `final_payload` is absent.
    pub payload_override: Option<Vec<u8>>,
    pub control: Option<HookControl>,
}

impl HookOutcome {
    /// The payload the engine should proceed with: the hook's override
    /// if it succeeded and produced one, else the original proposal.
    pub fn resolved_payload(&self, original: &Value) -> Value {
        if self.status != HookStatus::Success {
            return original.clone();
        }
        if let Some(final_payload) = &self.final_payload {
            return final_payload.clone();
        }
        if let Some(bytes) = &self.payload_override {
            if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
                return value;
            }
        }
        original.clone()
    }

    pub fn should_skip(&self) -> bool {
        self.status == HookStatus::Success
            && self.control.as_ref().is_some_and(|c| c.skip)
    }
}

/// Run `hook_def` for `hook_point`, persisting the full I/O contract
/// under `io/hooks/<NNN>_<hook_point>/`.
pub async fn run_hook(
    hook_point: HookPoint,
    hook_def: &HookDefinition,
    artifacts: &ArtifactStore,
    run_id: &str,
    payload: &Value,
) -> Result<HookOutcome, HookError> {
    let (seq, io_dir) = artifacts.next_hook_dir(hook_point.as_str());
    let input_dir = io_dir.join("input");
    let output_dir = io_dir.join("output");
    let meta_dir = io_dir.join("execution_meta");
    std::fs::create_dir_all(&input_dir)?;
    std::fs::create_dir_all(&output_dir)?;
    std::fs::create_dir_all(&meta_dir)?;

    let context = HookContext {
        hook_name: hook_point.as_str().to_string(),
        step_index: seq,
        run_id: run_id.to_string(),
        timestamp: Utc::now(),
    };
    std::fs::write(
        input_dir.join("context.json"),
        serde_json::to_vec_pretty(&context)?,
    )?;
    std::fs::write(
        input_dir.join("payload.json"),
        serde_json::to_vec_pretty(payload)?,
    )?;

    let mut env = std::collections::HashMap::new();
    env.insert("DELTA_RUN_ID".to_string(), run_id.to_string());
    env.insert(
        "DELTA_HOOK_IO_PATH".to_string(),
        io_dir.display().to_string(),
    );

    let timeout = Duration::from_millis(hook_def.bounded_timeout_ms());
    let cwd = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let outcome = run_bounded(&hook_def.command, &cwd, &env, None, timeout).await?;

    std::fs::write(meta_dir.join("command.txt"), hook_def.command.join(" "))?;
    std::fs::write(meta_dir.join("stdout.log"), &outcome.stdout)?;
    std::fs::write(meta_dir.join("stderr.log"), &outcome.stderr)?;
    std::fs::write(
        meta_dir.join("exit_code.txt"),
        outcome
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "timeout".to_string()),
    )?;
    std::fs::write(meta_dir.join("duration_ms.txt"), outcome.duration_ms.to_string())?;

    let io_path_ref = io_dir.display().to_string();

    // A non-zero exit (or timeout) means the hook failed: its outputs
    // are ignored outright, even if it managed to write some.
    if outcome.exit_code != Some(0) {
        return Ok(HookOutcome {
            status: HookStatus::Failed,
            io_path_ref,
            final_payload: None,
            payload_override: None,
            control: None,
        });
    }

    let final_payload = std::fs::read(output_dir.join("final_payload.json"))
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok());
    let payload_override = std::fs::read(output_dir.join("payload_override.dat")).ok();
    let control = std::fs::read(output_dir.join("control.json"))
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok());

    Ok(HookOutcome {
        status: HookStatus::Success,
        io_path_ref,
        final_payload,
        payload_override,
        control,
    })
}
