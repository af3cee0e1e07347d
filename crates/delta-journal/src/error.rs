use thiserror::Error;

/// Journal/workspace/metadata I/O errors. Fatal; the engine exits
/// FAILED with a best-effort metadata update.
#[derive(Debug, Error)]
pub enum JournalError {
    /// I4: creating a run whose directory already exists must fail
    /// atomically and must never overwrite the existing directory.
    #[error("Run ID '{0}' already exists at {1}")]
    DuplicateRunId(String, String),

    /// I2: a write that fails to append must surface as an error.
    #[error("Failed to write journal event: {0}")]
    AppendFailed(String),

    /// A malformed journal line is a fatal read error (never silently
    /// skipped).
    #[error("Malformed journal line at byte offset {offset}: {source}")]
    MalformedLine {
        offset: u64,
        #[source]
        source: serde_json::Error,
    },

    #[error("run directory not found: {0}")]
    RunNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
