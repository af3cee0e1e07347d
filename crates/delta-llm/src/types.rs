//! The request/response envelope exchanged with the LLM endpoint,
//! treated as an external HTTP service that accepts a request envelope
//! and returns a response envelope.

use delta_core::config::ToolDefinition;
use delta_core::event::ToolCall;
use delta_core::message::Message;
use delta_core::result::Usage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One call to the LLM: the fully-built message list plus the tools
/// the model may invoke.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// The model's reply, plus the raw JSON of both sides of the call so
/// the caller can persist them byte-for-byte under
/// `io/invocations/<id>/` without re-serializing through these types.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub usage: Usage,
    pub raw_request: Value,
    pub raw_response: Value,
}

#[derive(Debug, Serialize)]
pub(crate) struct RequestEnvelope<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [ToolDefinition],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A tool call as returned on the wire: the provider knows the tool
/// name and arguments, not the `action_id` the engine mints for it.
#[derive(Debug, Deserialize)]
pub(crate) struct ToolCallWire {
    pub tool_name: String,
    pub tool_args: Value,
}

impl From<ToolCallWire> for ToolCall {
    fn from(wire: ToolCallWire) -> Self {
        ToolCall {
            action_id: Uuid::new_v4().to_string(),
            tool_name: wire.tool_name,
            tool_args: wire.tool_args,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseEnvelope {
    pub content: String,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallWire>>,
    #[serde(default)]
    pub usage: Option<UsageWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UsageWire {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl From<UsageWire> for Usage {
    fn from(wire: UsageWire) -> Self {
        Usage {
            prompt_tokens: wire.prompt_tokens,
            completion_tokens: wire.completion_tokens,
            total_tokens: wire.total_tokens,
        }
    }
}
