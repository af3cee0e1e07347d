//! The [`LlmClient`] trait and its HTTP-backed implementation. The LLM
//! provider itself is out of scope: this driver only knows how to
//! serialize a request envelope, POST it, and parse a response
//! envelope back.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse, RequestEnvelope, ResponseEnvelope};

/// Calls an LLM and returns its reply. Implementations handle
/// provider-specific transport; the engine only depends on this trait.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;
}

/// Drives the LLM over plain HTTP: POST a JSON request envelope, parse
/// a JSON response envelope. No streaming, no provider-specific
/// request shaping — those belong to a provider-specific driver this
/// crate does not ship.
pub struct HttpLlmClient {
    http: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpLlmClient {
    pub fn new(endpoint: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            bearer_token,
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let envelope = RequestEnvelope {
            model: &request.model,
            messages: &request.messages,
            tools: &request.tools,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let raw_request = serde_json::to_value(&envelope)
            .map_err(|err| LlmError::MalformedResponse(err.to_string()))?;

        let mut builder = self.http.post(&self.endpoint).json(&envelope);
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            return Err(LlmError::Http {
                status: status.as_u16(),
                body: body.to_string(),
            });
        }

        let parsed: ResponseEnvelope = serde_json::from_value(body.clone())
            .map_err(|err| LlmError::MalformedResponse(err.to_string()))?;

        Ok(LlmResponse {
            content: parsed.content,
            tool_calls: parsed
                .tool_calls
                .map(|calls| calls.into_iter().map(Into::into).collect()),
            usage: parsed.usage.map(Into::into).unwrap_or_default(),
            raw_request,
            raw_response: body,
        })
    }
}
