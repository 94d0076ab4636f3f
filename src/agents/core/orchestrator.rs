//! Execution Orchestrator
//!
//! Runs the model/tool-call loop for one execution:
//!
//! ```text
//! Init -> ModelTurn -> Final
//!              \-> ToolDispatch -> ModelTurn
//! ```
//!
//! bounded by `max_iterations` model turns and the total time budget. Tool
//! calls requested in one turn run concurrently and their results are fed
//! back in the order the model requested them.

use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::{build_user_message, render_system_prompt};
use crate::agents::config::AgentDefinition;
use crate::agents::domain::{ExecutionStatus, ExecutionTrace, Message, ToolCall, ToolCallResult};
use crate::agents::error::{AgentResult, ToolCallError};
use crate::agents::llm::{CompletionRequest, LlmProvider};
use crate::agents::recorder::ExecutionRecorder;
use crate::agents::registry::{ToolContext, ToolRegistry};

/// What the boundary layer returns for one execution
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub execution_id: String,
    pub output: Value,
    pub tokens_used: u64,
    pub duration_ms: u64,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub trace: ExecutionTrace,
}

impl ExecutionResult {
    fn from_trace(trace: ExecutionTrace, error: Option<String>) -> Self {
        Self {
            execution_id: trace.execution_id.clone(),
            output: trace.final_output.clone().unwrap_or(Value::Null),
            tokens_used: trace.totals.tokens_used,
            duration_ms: trace.totals.duration_ms,
            status: trace.status,
            error,
            trace,
        }
    }
}

/// Drives executions against a model and the process-owned tool backends
pub struct Orchestrator {
    llm: Arc<dyn LlmProvider>,
    tools: ToolContext,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: ToolContext) -> Self {
        Self { llm, tools }
    }

    /// Run `agent` on `input` to a terminal status.
    ///
    /// Only registry construction errors are returned as `Err`; every failure
    /// after that ends up in the trace with a terminal status.
    pub async fn execute(&self, agent: &AgentDefinition, input: Value) -> AgentResult<ExecutionResult> {
        let execution_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("execution", execution_id = %execution_id, agent = %agent.id);

        let registry = span.in_scope(|| ToolRegistry::build(agent, &self.tools))?;
        let recorder = ExecutionRecorder::new(execution_id, agent.id.clone(), input.clone());
        Ok(self
            .run(agent, &registry, recorder, input)
            .instrument(span)
            .await)
    }

    async fn run(
        &self,
        agent: &AgentDefinition,
        registry: &ToolRegistry,
        mut recorder: ExecutionRecorder,
        input: Value,
    ) -> ExecutionResult {
        let settings = agent.settings;
        let deadline = Instant::now() + settings.total_timeout();

        info!(tools = registry.len(), max_iterations = settings.max_iterations, "Execution started");

        let tools = match timeout_at(deadline, registry.tool_definitions()).await {
            Ok(tools) => tools,
            Err(_) => {
                return finish(recorder, ExecutionStatus::TimedOut, None, Some(budget_message()));
            }
        };

        let mut messages = vec![
            Message::system(render_system_prompt(&agent.system_prompt, &input)),
            Message::user(build_user_message(&input)),
        ];

        for iteration in 1..=settings.max_iterations {
            let request = CompletionRequest {
                messages: messages.clone(),
                tools: if tools.is_empty() { None } else { Some(tools.clone()) },
                ..Default::default()
            };
            let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();

            let turn_started = Instant::now();
            let response = match timeout_at(deadline, self.llm.complete(request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    warn!(iteration, error = %e, "Model turn failed");
                    recorder.record_model_turn(iteration, &prompt, None, elapsed_ms(turn_started), 0, Some(e.to_string()));
                    return finish(recorder, ExecutionStatus::Failed, None, Some(e.to_string()));
                }
                Err(_) => {
                    recorder.record_model_turn(iteration, &prompt, None, elapsed_ms(turn_started), 0, Some(budget_message()));
                    return finish(recorder, ExecutionStatus::TimedOut, None, Some(budget_message()));
                }
            };

            let calls = response.requested_calls().to_vec();
            recorder.record_model_turn(
                iteration,
                &prompt,
                response.usage.map(|u| u.total_tokens),
                elapsed_ms(turn_started),
                calls.len(),
                None,
            );

            if calls.is_empty() {
                let output = json!({ "content": response.message.content });
                return finish(recorder, ExecutionStatus::Success, Some(output), None);
            }

            debug!(iteration, calls = calls.len(), "Dispatching tool calls");
            messages.push(response.message);

            let outcomes = join_all(
                calls
                    .iter()
                    .map(|call| self.dispatch(registry, call, settings.per_call_timeout(), deadline)),
            )
            .await;

            let mut fatal: Option<ToolCallError> = None;
            for (call, (result, error)) in calls.iter().zip(outcomes) {
                recorder.record_tool_call(iteration, &result);
                messages.push(Message::tool_result(&call.id, &result.message_payload()));
                if fatal.is_none() {
                    fatal = error.filter(ToolCallError::is_fatal);
                }
            }

            if let Some(error) = fatal {
                let status = match error {
                    ToolCallError::Timeout { .. } => ExecutionStatus::TimedOut,
                    _ => ExecutionStatus::Failed,
                };
                warn!(error = %error, %status, "Fatal tool failure");
                return finish(recorder, status, None, Some(error.to_string()));
            }

            if Instant::now() >= deadline {
                return finish(recorder, ExecutionStatus::TimedOut, None, Some(budget_message()));
            }
        }

        let status = if recorder.has_successful_tool_call() {
            ExecutionStatus::PartialFailure
        } else {
            ExecutionStatus::Failed
        };
        let message = format!(
            "iteration limit of {} reached without a final answer",
            settings.max_iterations
        );
        finish(recorder, status, None, Some(message))
    }

    /// Run one tool call under the smaller of its own timeout and the
    /// remaining execution budget. Never fails: errors become results.
    async fn dispatch(
        &self,
        registry: &ToolRegistry,
        call: &ToolCall,
        per_call: Duration,
        deadline: Instant,
    ) -> (ToolCallResult, Option<ToolCallError>) {
        let started = Instant::now();
        let budget_bound = deadline <= started + per_call;
        let call_deadline = if budget_bound { deadline } else { started + per_call };

        let outcome = match registry.resolve(&call.name) {
            Err(_) => Err(ToolCallError::ToolNotFound(call.name.clone())),
            Ok(_) if call.arguments.is_string() => Err(ToolCallError::InvalidArguments(format!(
                "arguments are not valid JSON: {}",
                call.arguments.as_str().unwrap_or_default()
            ))),
            Ok(tool) => {
                let limit = call_deadline.saturating_duration_since(started);
                match timeout_at(call_deadline, tool.invoke(&call.arguments, limit)).await {
                    Ok(result) => result,
                    Err(_) => Err(ToolCallError::Timeout {
                        elapsed: started.elapsed(),
                        budget_exhausted: budget_bound,
                    }),
                }
            }
        };

        let duration_ms = elapsed_ms(started);
        match outcome {
            Ok(output) => {
                debug!(tool = %call.name, duration_ms, "Tool call succeeded");
                (ToolCallResult::success(call, output, duration_ms), None)
            }
            Err(error) => {
                warn!(tool = %call.name, kind = error.kind(), error = %error, "Tool call failed");
                (ToolCallResult::failure(call, &error, duration_ms), Some(error))
            }
        }
    }
}

fn finish(
    recorder: ExecutionRecorder,
    status: ExecutionStatus,
    output: Option<Value>,
    error: Option<String>,
) -> ExecutionResult {
    let trace = recorder.finish(status, output);
    info!(
        %status,
        steps = trace.steps.len(),
        tokens = trace.totals.tokens_used,
        duration_ms = trace.totals.duration_ms,
        "Execution finished"
    );
    ExecutionResult::from_trace(trace, error)
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

fn budget_message() -> String {
    "total time budget exhausted".to_string()
}

#[cfg(test)]
#[path = "orchestrator_test.rs"]
mod orchestrator_test;
