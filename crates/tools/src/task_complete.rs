//! `task_complete`: two-phase verified completion.
//!
//! A completion claim is first checked by an optional evaluator model. A
//! rejected claim comes back to the model in the same step with the
//! evaluator's feedback; an approved claim (or any claim when no evaluator is
//! configured) is finalized by asking the ground model for an object matching
//! the task's output schema. After `force_after` prior attempts the evaluator
//! is skipped and the task is finalized regardless.

use async_trait::async_trait;
use serde::Deserialize;
use screenpilot_core::error::{AiProviderError, Error, ToolError};
use screenpilot_core::message::AgentMessage;
use screenpilot_core::provider::{AiProvider, GenerateObjectRequest};
use screenpilot_core::tool::{MessageHistory, ResponseTarget, Tool, ToolContext, ToolOutcome};
use screenpilot_transport::{TransportGuard, cap_images};
use std::sync::Arc;
use tracing::{info, warn};

pub const TASK_COMPLETE: &str = "task_complete";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionArgs {
    completion_summary: String,
    verification_evidence: String,
    final_state_description: String,
}

impl CompletionArgs {
    fn render(&self) -> String {
        format!(
            "Completion summary: {}\nVerification evidence: {}\nFinal state: {}",
            self.completion_summary, self.verification_evidence, self.final_state_description
        )
    }
}

#[derive(Debug, Deserialize)]
struct Verdict {
    approved: bool,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    feedback: String,
}

/// `{result: string}`, used when the caller supplies no output schema.
pub fn default_output_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": { "result": { "type": "string" } },
        "required": ["result"]
    })
}

fn verdict_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "approved": { "type": "boolean" },
            "reason": { "type": "string" },
            "feedback": { "type": "string" }
        },
        "required": ["approved", "reason", "feedback"]
    })
}

/// Number of `task_complete` calls among `messages`.
pub fn completion_attempts<'a>(messages: impl IntoIterator<Item = &'a AgentMessage>) -> usize {
    messages
        .into_iter()
        .flat_map(|m| m.tool_calls())
        .filter(|call| call.name == TASK_COMPLETE)
        .count()
}

fn into_tool_error(err: Error) -> ToolError {
    match err {
        Error::AiProvider(e) => ToolError::AiProvider(e),
        Error::Transport(e) => ToolError::Transport(e),
        other => ToolError::ExecutionFailed {
            tool_name: TASK_COMPLETE.into(),
            reason: other.to_string(),
        },
    }
}

pub struct TaskCompleteTool {
    ground: Arc<dyn AiProvider>,
    evaluator: Option<Arc<dyn AiProvider>>,
    guard: Arc<TransportGuard>,
    instructions: String,
    output_schema: Option<serde_json::Value>,
    system_prompt: Option<String>,
    force_after: usize,
    max_images: usize,
}

impl TaskCompleteTool {
    pub fn new(
        ground: Arc<dyn AiProvider>,
        guard: Arc<TransportGuard>,
        instructions: impl Into<String>,
    ) -> Self {
        Self {
            ground,
            evaluator: None,
            guard,
            instructions: instructions.into(),
            output_schema: None,
            system_prompt: None,
            force_after: 3,
            max_images: 95,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn AiProvider>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_output_schema(mut self, schema: Option<serde_json::Value>) -> Self {
        self.output_schema = schema;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    /// Finalize without evaluation once this many attempts precede the current one.
    pub fn with_force_after(mut self, attempts: usize) -> Self {
        self.force_after = attempts;
        self
    }

    pub fn with_max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self
    }

    async fn evaluate(
        &self,
        evaluator: &dyn AiProvider,
        args: &CompletionArgs,
        history: &dyn MessageHistory,
    ) -> Result<Verdict, ToolError> {
        let mut messages = cap_images(history.snapshot(), self.max_images);
        messages.push(AgentMessage::user_text(format!(
            "The agent claims this task is complete.\n\nTask: {}\n\n{}\n\n\
             Judge from the conversation and screenshots whether the task was actually \
             accomplished. Reply with approved, a short reason, and concrete feedback \
             the agent can act on if it was not.",
            self.instructions,
            args.render()
        )));

        let response = self
            .guard
            .generate_object(
                evaluator,
                GenerateObjectRequest {
                    schema: verdict_schema(),
                    system_prompt: None,
                    messages,
                },
            )
            .await
            .map_err(into_tool_error)?;

        serde_json::from_value(response.object)
            .map_err(|e| AiProviderError::SchemaMismatch(format!("evaluator verdict: {e}")).into())
    }

    async fn finalize(
        &self,
        args: &CompletionArgs,
        history: &dyn MessageHistory,
    ) -> Result<serde_json::Value, ToolError> {
        let mut messages = cap_images(history.snapshot(), self.max_images);
        messages.push(AgentMessage::user_text(format!(
            "The task is complete.\n\nTask: {}\n\n{}\n\n\
             Produce the final output of the task in the requested format.",
            self.instructions,
            args.render()
        )));

        let schema = self.output_schema.clone().unwrap_or_else(default_output_schema);
        let response = self
            .guard
            .generate_object(
                self.ground.as_ref(),
                GenerateObjectRequest {
                    schema,
                    system_prompt: self.system_prompt.clone(),
                    messages,
                },
            )
            .await
            .map_err(into_tool_error)?;
        Ok(response.object)
    }
}

#[async_trait]
impl Tool for TaskCompleteTool {
    fn name(&self) -> &str {
        TASK_COMPLETE
    }

    fn description(&self) -> &str {
        "Declare the task complete. Only call this once the screen shows the task has been \
         accomplished; include what you did, the evidence you see, and the final state."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "completionSummary": {
                    "type": "string",
                    "description": "What was done to complete the task"
                },
                "verificationEvidence": {
                    "type": "string",
                    "description": "What on screen proves the task is complete"
                },
                "finalStateDescription": {
                    "type": "string",
                    "description": "The final state of the screen"
                }
            },
            "required": ["completionSummary", "verificationEvidence", "finalStateDescription"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError> {
        let args: CompletionArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("task_complete: {e}")))?;

        // The current call is already part of the history.
        let prior = completion_attempts(context.history.messages()).saturating_sub(1);
        let forced = prior >= self.force_after;

        if forced {
            warn!(
                session_id = context.session_id,
                step = context.step,
                prior_attempts = prior,
                "Forcing task finalization"
            );
        } else if let Some(evaluator) = &self.evaluator {
            let verdict = self.evaluate(evaluator.as_ref(), &args, context.history).await?;
            if !verdict.approved {
                info!(
                    session_id = context.session_id,
                    step = context.step,
                    reason = %verdict.reason,
                    "Completion rejected by evaluator"
                );
                let message = format!(
                    "Your task completion needs revision.\n\nReason: {}\n\nFeedback:\n{}\n\n\
                     Address the feedback, then call task_complete again.",
                    verdict.reason, verdict.feedback
                );
                return Ok(ToolOutcome::Response {
                    message: AgentMessage::user_text(message),
                    log_update: None,
                    target: ResponseTarget::CurrentStep,
                });
            }
        }

        let output = self.finalize(&args, context.history).await?;
        info!(
            session_id = context.session_id,
            step = context.step,
            forced,
            "Task finalized"
        );
        Ok(ToolOutcome::Completion { output })
    }
}
