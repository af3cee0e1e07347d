//! The message shape sent to the LLM.

use serde::{Deserialize, Serialize};

use crate::event::ToolCall;

/// Role of a single message in the LLM-bound conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// One entry in the ordered list handed to the LLM. Context sources
/// (File, ComputedFile) always yield `System` messages; Journal replay
/// yields `User`/`Assistant`/`Tool` messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Present only on `Assistant` messages that requested tool calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Present only on `Tool` messages; ties the observation back to
    /// the `action_id` the assistant requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool(action_id: impl Into<String>, observation_content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: observation_content.into(),
            tool_calls: None,
            tool_call_id: Some(action_id.into()),
        }
    }
}
