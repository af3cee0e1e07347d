//! Structured run result schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metadata::RunStatus;

const SCHEMA_VERSION: &str = "2.0";

/// `error` field of a FAILED/INTERRUPTED result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// `interaction` field of a WAITING_FOR_INPUT result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionRequest {
    pub prompt: String,
    pub input_type: String,
    pub sensitive: bool,
}

/// Token usage, computed from persisted invocation artifacts rather
/// than trusted verbatim from the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

/// `metrics` field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetrics {
    pub iterations: u64,
    pub duration_ms: i64,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub usage: Usage,
}

/// `metadata` field (distinct from the run's on-disk [`crate::metadata::RunMetadata`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResultMetadata {
    pub agent_name: String,
    pub workspace_path: String,
}

/// The structured JSON output produced by the Run Driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunResult {
    pub schema_version: String,
    pub run_id: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interaction: Option<InteractionRequest>,
    pub metrics: RunMetrics,
    pub metadata: RunResultMetadata,
}

impl RunResult {
    pub fn schema_version() -> &'static str {
        SCHEMA_VERSION
    }
}
