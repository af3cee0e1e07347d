use thiserror::Error;

/// LLM provider errors: always fatal to the run, whether an HTTP
/// failure or a response the engine cannot parse.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM endpoint returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),
}
