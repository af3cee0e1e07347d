//! Shared entities for the delta agent engine core: the journal event
//! schema, run metadata, tool/hook/context-manifest definitions, the
//! LLM-facing message shape, and the structured run result — the
//! on-disk and wire contracts every other crate builds against.

pub mod config;
pub mod event;
pub mod ids;
pub mod liveness;
pub mod message;
pub mod metadata;
pub mod result;

pub use config::{
    AgentManifest, ConfigError, ContextManifest, HookDefinition, HookPoint, InjectAs, OnMissing,
    ParamType, Source, ToolDefinition, ToolParameter, validate_tools,
};
pub use event::{ActionStatus, HookStatus, JournalEvent, JournalRecord, SystemLevel, ToolCall};
pub use ids::generate_run_id;
pub use message::{Message, Role};
pub use metadata::{RunMetadata, RunStatus};
pub use result::{InteractionRequest, RunError, RunMetrics, RunResult, RunResultMetadata, Usage};
