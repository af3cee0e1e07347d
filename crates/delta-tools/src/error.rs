use thiserror::Error;

/// Tool-execution errors. These become `ACTION_RESULT(FAILED)`
/// observations, never fatal to the loop.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("missing required parameter '{param}' for tool '{tool}'")]
    MissingParameter { tool: String, param: String },

    #[error("tool '{0}' argument type mismatch for parameter '{1}'")]
    TypeMismatch(String, String),

    #[error("spawn failed: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("journal error: {0}")]
    Journal(#[from] delta_journal::JournalError),
}

/// Hook-execution errors. A hook failure never propagates as a fatal
/// error: the caller records a
/// `HOOK_EXECUTION_AUDIT(FAILED)` and proceeds with the unmodified
/// payload. This type exists for the I/O plumbing that *can* fail
/// fatally (can't create the io directory, can't serialize context).
#[derive(Debug, Error)]
pub enum HookError {
    #[error("io error preparing hook invocation: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
