use thiserror::Error;

/// Errors raised while building context: a missing file source, or a
/// computed-file generator that fails, times out, or can't be read back.
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("context source '{id}' references missing file: {path}")]
    MissingFile { id: String, path: String },

    #[error("context source '{id}' generator command exited non-zero ({exit_code:?}): {stderr}")]
    GeneratorFailed {
        id: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("context source '{id}' generator command timed out after {timeout_ms}ms")]
    GeneratorTimeout { id: String, timeout_ms: u64 },

    #[error("context source '{id}' could not read generator output at {path}: {source}")]
    OutputUnreadable {
        id: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Journal(#[from] delta_journal::JournalError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
