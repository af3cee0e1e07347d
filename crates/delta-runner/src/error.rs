use thiserror::Error;

/// Errors the Run Driver can hit outside the engine's own loop: a
/// malformed request, a configuration that fails validation before any
/// journal exists, or a resume that the Janitor refuses outright.
#[derive(Debug, Error)]
pub enum RunDriverError {
    #[error("run id required: continuing a run requires an explicit run_id")]
    MissingRunIdForContinue,

    #[error(
        "run '{recorded}' was last owned by host '{recorded_hostname}'; this host is \
         '{local_hostname}' (pass force to resume anyway)"
    )]
    RefusedCrossHost {
        recorded: String,
        recorded_hostname: String,
        local_hostname: String,
    },

    #[error("invalid agent configuration: {0}")]
    Config(#[from] delta_core::ConfigError),

    #[error(transparent)]
    Journal(#[from] delta_journal::JournalError),

    #[error(transparent)]
    Engine(#[from] delta_engine::EngineError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
