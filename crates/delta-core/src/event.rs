//! The journal event schema.
//!
//! The event set is closed: `JournalEvent` is a tagged enum and new
//! variants are never added dynamically. Every event carries a
//! monotonically increasing `seq` and an ISO-8601 timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of the append-only journal: `{seq, timestamp, type, payload}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalRecord {
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: JournalEvent,
}

/// Status recorded on an `ACTION_RESULT` event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

/// Severity recorded on a `SYSTEM_MESSAGE` event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SystemLevel {
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "WARN")]
    Warn,
    #[serde(rename = "ERROR")]
    Error,
}

/// Status recorded on a `HOOK_EXECUTION_AUDIT` event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HookStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
}

/// A single tool call as returned by the LLM, carried verbatim on
/// `THOUGHT` and referenced by `action_id` on `ACTION_REQUEST`/`ACTION_RESULT`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub action_id: String,
    pub tool_name: String,
    pub tool_args: Value,
}

/// The closed set of journal event types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum JournalEvent {
    #[serde(rename = "RUN_START")]
    RunStart {
        run_id: String,
        task: String,
        agent_ref: String,
    },

    #[serde(rename = "USER_MESSAGE")]
    UserMessage { content: String },

    #[serde(rename = "THOUGHT")]
    Thought {
        content: String,
        llm_invocation_ref: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },

    #[serde(rename = "ACTION_REQUEST")]
    ActionRequest {
        action_id: String,
        tool_name: String,
        tool_args: Value,
        resolved_command: Vec<String>,
    },

    #[serde(rename = "ACTION_RESULT")]
    ActionResult {
        action_id: String,
        status: ActionStatus,
        observation_content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        execution_ref: Option<String>,
    },

    #[serde(rename = "SYSTEM_MESSAGE")]
    SystemMessage { level: SystemLevel, content: String },

    #[serde(rename = "HOOK_EXECUTION_AUDIT")]
    HookExecutionAudit {
        hook_name: String,
        status: HookStatus,
        io_path_ref: String,
    },

    #[serde(rename = "RUN_END")]
    RunEnd { status: crate::metadata::RunStatus },
}

impl JournalEvent {
    /// Name of this event's `type` tag, as written on disk.
    pub fn type_name(&self) -> &'static str {
        match self {
            JournalEvent::RunStart { .. } => "RUN_START",
            JournalEvent::UserMessage { .. } => "USER_MESSAGE",
            JournalEvent::Thought { .. } => "THOUGHT",
            JournalEvent::ActionRequest { .. } => "ACTION_REQUEST",
            JournalEvent::ActionResult { .. } => "ACTION_RESULT",
            JournalEvent::SystemMessage { .. } => "SYSTEM_MESSAGE",
            JournalEvent::HookExecutionAudit { .. } => "HOOK_EXECUTION_AUDIT",
            JournalEvent::RunEnd { .. } => "RUN_END",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_start_round_trips_with_expected_tag() {
        let record = JournalRecord {
            seq: 1,
            timestamp: Utc::now(),
            event: JournalEvent::RunStart {
                run_id: "20260101_000000_abcdef".into(),
                task: "print hello".into(),
                agent_ref: "agents/demo".into(),
            },
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"type\":\"RUN_START\""));
        let parsed: JournalRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, parsed);
    }

    #[test]
    fn action_result_status_serializes_as_spec_enum() {
        let event = JournalEvent::ActionResult {
            action_id: "a1".into(),
            status: ActionStatus::Failed,
            observation_content: "exit 3".into(),
            execution_ref: Some("a1".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["status"], "FAILED");
    }

    #[test]
    fn type_name_matches_serde_tag() {
        let event = JournalEvent::UserMessage {
            content: "hi".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.type_name());
    }
}
