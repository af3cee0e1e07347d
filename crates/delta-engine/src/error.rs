use thiserror::Error;

/// The terminal error type the Run Driver matches on to pick an exit
/// code. Composes every lower-layer error so a single `?` chain can
/// propagate from any component up through one iteration of the loop.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown tool '{0}' requested by the model")]
    UnknownTool(String),

    #[error("max iterations reached")]
    MaxIterationsReached,

    #[error("run is not waiting for input")]
    NotWaitingForInput,

    #[error("no interaction request found to resume")]
    MissingInteractionRequest,

    #[error("llm provider error: {0}")]
    Llm(#[from] delta_llm::LlmError),

    #[error(transparent)]
    Context(#[from] delta_context::ContextError),

    #[error(transparent)]
    Tool(#[from] delta_tools::ToolError),

    #[error(transparent)]
    Hook(#[from] delta_tools::HookError),

    #[error(transparent)]
    Session(#[from] delta_session::SessionError),

    #[error(transparent)]
    Journal(#[from] delta_journal::JournalError),

    #[error(transparent)]
    Config(#[from] delta_core::ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
