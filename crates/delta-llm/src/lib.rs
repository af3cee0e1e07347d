//! The LLM client boundary: a provider-agnostic trait plus one plain
//! HTTP-backed implementation. The LLM provider's own API shape is out
//! of scope — this crate only speaks the request/response envelope.

pub mod client;
pub mod error;
pub mod types;

pub use client::{HttpLlmClient, LlmClient};
pub use error::LlmError;
pub use types::{LlmRequest, LlmResponse};
