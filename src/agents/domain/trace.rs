//! Execution trace types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal status of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// The model produced a final answer
    Success,
    /// Iterations ran out, but at least one tool call succeeded
    PartialFailure,
    /// A fatal error occurred, or nothing useful was produced
    Failed,
    /// The total time budget elapsed first
    TimedOut,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::PartialFailure => write!(f, "partial_failure"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// One recorded step of an execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    #[serde(rename_all = "camelCase")]
    ModelTurn {
        iteration: u32,
        prompt_summary: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        tokens_used: Option<u32>,
        duration_ms: u64,
        tool_calls_requested: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        iteration: u32,
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_kind: Option<String>,
        duration_ms: u64,
        result_bytes: usize,
    },
}

impl Step {
    pub fn is_successful_tool_call(&self) -> bool {
        matches!(self, Step::ToolCall { error: None, .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceTotals {
    pub tokens_used: u64,
    pub duration_ms: u64,
}

/// Complete, ordered record of one execution.
///
/// Produced by the recorder once a terminal status is assigned; never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTrace {
    pub execution_id: String,
    pub agent_id: String,
    pub input: Value,
    pub steps: Vec<Step>,
    pub totals: TraceTotals,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_output: Option<Value>,
    pub status: ExecutionStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionTrace {
    pub fn tool_calls(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| matches!(s, Step::ToolCall { .. }))
    }

    pub fn model_turns(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, Step::ModelTurn { .. }))
            .count()
    }
}
