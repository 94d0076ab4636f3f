//! Execution Recorder
//!
//! Append-only accumulation of steps for one execution. The recorder makes no
//! decisions; the orchestrator tells it what happened and when the run ended.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Instant;

use crate::agents::domain::{ExecutionStatus, ExecutionTrace, Step, ToolCallResult, TraceTotals};

const PROMPT_SUMMARY_CHARS: usize = 160;

pub struct ExecutionRecorder {
    execution_id: String,
    agent_id: String,
    input: Value,
    steps: Vec<Step>,
    tokens_used: u64,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl ExecutionRecorder {
    pub fn new(execution_id: impl Into<String>, agent_id: impl Into<String>, input: Value) -> Self {
        Self {
            execution_id: execution_id.into(),
            agent_id: agent_id.into(),
            input,
            steps: Vec::new(),
            tokens_used: 0,
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Record a model turn, successful or not.
    pub fn record_model_turn(
        &mut self,
        iteration: u32,
        prompt: &str,
        tokens_used: Option<u32>,
        duration_ms: u64,
        tool_calls_requested: usize,
        error: Option<String>,
    ) {
        if let Some(tokens) = tokens_used {
            self.tokens_used += u64::from(tokens);
        }
        self.steps.push(Step::ModelTurn {
            iteration,
            prompt_summary: summarize(prompt),
            tokens_used,
            duration_ms,
            tool_calls_requested,
            error,
        });
    }

    pub fn record_tool_call(&mut self, iteration: u32, result: &ToolCallResult) {
        let (output, error) = if result.success {
            (Some(result.output.clone()), None)
        } else {
            (None, result.error.clone())
        };

        self.steps.push(Step::ToolCall {
            iteration,
            tool_call_id: result.tool_call_id.clone(),
            tool_name: result.tool_name.clone(),
            arguments: result.input.clone(),
            result: output,
            error,
            error_kind: result.error_kind.clone(),
            duration_ms: result.execution_time_ms,
            result_bytes: result.result_bytes(),
        });
    }

    pub fn has_successful_tool_call(&self) -> bool {
        self.steps.iter().any(Step::is_successful_tool_call)
    }

    /// Assign the terminal status and produce the immutable trace.
    pub fn finish(self, status: ExecutionStatus, final_output: Option<Value>) -> ExecutionTrace {
        ExecutionTrace {
            execution_id: self.execution_id,
            agent_id: self.agent_id,
            input: self.input,
            steps: self.steps,
            totals: TraceTotals {
                tokens_used: self.tokens_used,
                duration_ms: self.started.elapsed().as_millis() as u64,
            },
            final_output,
            status,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// First line of the prompt, capped at a fixed number of characters
fn summarize(prompt: &str) -> String {
    let line = prompt.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() <= PROMPT_SUMMARY_CHARS {
        line.to_string()
    } else {
        let cut: String = line.chars().take(PROMPT_SUMMARY_CHARS).collect();
        format!("{}...", cut)
    }
}
