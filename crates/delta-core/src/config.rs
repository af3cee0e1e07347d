//! Tool/hook definitions and the context manifest.
//!
//! Agent configuration *loading* (YAML, `imports` resolution) is out of
//! scope for this crate; these types are the contract the loader's
//! output must already satisfy by the time the engine sees it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a tool call argument is injected into the spawned process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InjectAs {
    Argument,
    Stdin,
    Option,
}

/// The type of a tool parameter's value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Number,
    Boolean,
}

/// A single parameter slot on a [`ToolDefinition`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub inject_as: InjectAs,
    /// Mandatory when `inject_as == Option`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_name: Option<String>,
}

/// A tool the LLM may invoke.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    /// Argv template, including literal tokens (e.g. `["echo"]`).
    pub command: Vec<String>,
    pub parameters: Vec<ToolParameter>,
}

/// The closed set of lifecycle points a hook may be attached to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    PreLlmReq,
    PostLlmResp,
    PreToolExec,
    PostToolExec,
    OnError,
    OnRunEnd,
}

impl HookPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            HookPoint::PreLlmReq => "pre_llm_req",
            HookPoint::PostLlmResp => "post_llm_resp",
            HookPoint::PreToolExec => "pre_tool_exec",
            HookPoint::PostToolExec => "post_tool_exec",
            HookPoint::OnError => "on_error",
            HookPoint::OnRunEnd => "on_run_end",
        }
    }
}

fn default_hook_timeout_ms() -> u64 {
    30_000
}

/// A hook command bound to one [`HookPoint`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HookDefinition {
    pub command: Vec<String>,
    #[serde(default = "default_hook_timeout_ms")]
    pub timeout_ms: u64,
}

impl HookDefinition {
    /// Clamp `timeout_ms` into the mandated [100, 600000] bound.
    pub fn bounded_timeout_ms(&self) -> u64 {
        self.timeout_ms.clamp(100, 600_000)
    }
}

/// What happens when a [`Source::File`] is missing on disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OnMissing {
    Error,
    Skip,
}

fn default_computed_timeout_ms() -> u64 {
    30_000
}

/// One entry of the context manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Source {
    File {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default = "default_on_missing")]
        on_missing: OnMissing,
    },
    ComputedFile {
        generator_command: Vec<String>,
        output_path: String,
        #[serde(default = "default_computed_timeout_ms")]
        timeout_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
    Journal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },
}

fn default_on_missing() -> OnMissing {
    OnMissing::Error
}

/// An ordered list of [`Source`]s.
pub type ContextManifest = Vec<Source>;

/// The agent's configured package: prompt, tools, hooks, context
/// manifest. Loading this from YAML with `imports` resolution is out of
/// scope for this crate; this struct is the contract the loader must
/// eventually produce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentManifest {
    pub agent_ref: String,
    pub system_prompt: String,
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
    #[serde(default)]
    pub hooks: std::collections::HashMap<HookPoint, HookDefinition>,
    pub context_manifest: ContextManifest,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u64,
}

fn default_max_iterations() -> u64 {
    50
}

/// Configuration errors. Fatal before any journal is opened.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tool '{tool}' has more than one stdin-injected parameter")]
    MultipleStdinParameters { tool: String },

    #[error("tool '{tool}' parameter '{param}' has inject_as=option but no option_name")]
    MissingOptionName { tool: String, param: String },

    #[error("duplicate tool name '{0}'")]
    DuplicateToolName(String),
}

/// Validate a set of tool definitions: names must be unique, at most
/// one parameter may be stdin-injected, and `option`-injected
/// parameters must carry an `option_name`.
pub fn validate_tools(tools: &[ToolDefinition]) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for tool in tools {
        if !seen.insert(&tool.name) {
            return Err(ConfigError::DuplicateToolName(tool.name.clone()));
        }

        let stdin_count = tool
            .parameters
            .iter()
            .filter(|p| p.inject_as == InjectAs::Stdin)
            .count();
        if stdin_count > 1 {
            return Err(ConfigError::MultipleStdinParameters {
                tool: tool.name.clone(),
            });
        }

        for param in &tool.parameters {
            if param.inject_as == InjectAs::Option && param.option_name.is_none() {
                return Err(ConfigError::MissingOptionName {
                    tool: tool.name.clone(),
                    param: param.name.clone(),
                });
            }
        }
    }
    Ok(())
}
