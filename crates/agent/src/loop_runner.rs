//! The step loop: generate, dispatch, repeat.
//!
//! ```text
//! INIT ──> GENERATE ──> DISPATCH ──┬──> GENERATE (next step)
//!                                  ├──> FINALIZED
//!                                  └──> STEP_BUDGET_EXCEEDED
//! ```
//!
//! Steps and the tool calls within a step run strictly in order; a later
//! call may depend on an earlier call's side effects.

use std::sync::Arc;
use chrono::Utc;
use screenpilot_core::computer::ComputerProvider;
use screenpilot_core::error::{Error, Result};
use screenpilot_core::event::{DomainEvent, EventBus};
use screenpilot_core::message::{AgentMessage, ContentItem};
use screenpilot_core::provider::{AiProvider, GenerateTextRequest, Usage};
use screenpilot_core::session::AgentLog;
use screenpilot_core::tool::{MessageHistory, ResponseTarget, ToolContext, ToolOutcome};
use screenpilot_tools::{capture_screen, completion_attempts};
use screenpilot_transport::TransportGuard;
use tracing::{debug, info, warn};

use crate::context::ConversationWindow;
use crate::dispatcher::ToolDispatcher;

pub const NO_TOOL_CALLS_MESSAGE: &str = "You haven't called any tools. Call a tool to make \
    progress on the task, or call task_complete if the task is done.";

/// Drives one task to completion.
pub struct StepLoop {
    /// Model that plans and emits tool calls
    provider: Arc<dyn AiProvider>,

    computer: Arc<dyn ComputerProvider>,

    dispatcher: ToolDispatcher,

    guard: Arc<TransportGuard>,

    event_bus: Arc<EventBus>,

    /// Hard ceiling on steps
    max_steps: u32,

    /// Chunks visible to the model per step
    lookback: usize,

    system_prompt: Option<String>,

    upload_screenshots: bool,
}

impl StepLoop {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        computer: Arc<dyn ComputerProvider>,
        dispatcher: ToolDispatcher,
        guard: Arc<TransportGuard>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            computer,
            dispatcher,
            guard,
            event_bus,
            max_steps: 300,
            lookback: 7,
            system_prompt: None,
            upload_screenshots: true,
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_upload_screenshots(mut self, upload: bool) -> Self {
        self.upload_screenshots = upload;
        self
    }

    /// Run the task and return its typed result.
    pub async fn run(&self, session_id: &str, instructions: &str) -> Result<serde_json::Value> {
        let mut logs = Vec::new();
        self.run_with_log(session_id, instructions, &mut logs).await
    }

    /// Like [`run`](Self::run), recording one [`AgentLog`] per step into
    /// `logs` whether or not the task succeeds.
    pub async fn run_with_log(
        &self,
        session_id: &str,
        instructions: &str,
        logs: &mut Vec<AgentLog>,
    ) -> Result<serde_json::Value> {
        info!(session_id, max_steps = self.max_steps, "Starting task");

        let mut window = ConversationWindow::new(self.lookback);
        let screenshot =
            capture_screen(self.computer.as_ref(), session_id, 0, self.upload_screenshots).await?;
        window.record(
            1,
            [AgentMessage::user(vec![
                ContentItem::text(instructions),
                ContentItem::image(screenshot),
            ])],
        );

        let tools = self.dispatcher.definitions();
        let mut total_usage = Usage::default();
        let mut step: u32 = 1;

        while step < self.max_steps {
            debug!(session_id, step, "Generating");
            let request = GenerateTextRequest {
                system_prompt: self.system_prompt.clone(),
                messages: window.view(step),
                tools: tools.clone(),
            };
            let response = self.guard.generate_text(self.provider.as_ref(), request).await?;

            let text = response.text.unwrap_or_default();
            let mut log = AgentLog::new(step);
            log.model_output = text.clone();
            log.reasoning = response.reasoning;
            log.usage = response.usage;
            if let Some(usage) = &response.usage {
                total_usage.add(usage);
            }
            let step_tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0);

            let calls = response.tool_calls;
            window.record(step, [AgentMessage::assistant(text, calls.clone())]);

            if calls.is_empty() {
                warn!(session_id, step, "Model returned no tool calls");
                window.record(step + 1, [AgentMessage::user_text(NO_TOOL_CALLS_MESSAGE)]);
            }

            for call in &calls {
                let context = ToolContext {
                    session_id,
                    step,
                    history: &window,
                };

                match self.dispatcher.dispatch(call, &context).await {
                    Ok(ToolOutcome::Completion { output }) => {
                        let attempts = completion_attempts(window.messages());
                        logs.push(log);
                        self.event_bus.publish(DomainEvent::StepCompleted {
                            session_id: session_id.to_string(),
                            step,
                            tool_calls: calls.len(),
                            tokens_used: step_tokens,
                            timestamp: Utc::now(),
                        });
                        self.event_bus.publish(DomainEvent::TaskFinalized {
                            session_id: session_id.to_string(),
                            steps: step,
                            completion_attempts: attempts,
                            timestamp: Utc::now(),
                        });
                        info!(
                            session_id,
                            step,
                            total_tokens = total_usage.total_tokens,
                            "Task complete"
                        );
                        return Ok(output);
                    }
                    Ok(ToolOutcome::Response {
                        message,
                        log_update,
                        target,
                    }) => {
                        if let Some(update) = log_update {
                            log.apply(update);
                        }
                        let chunk = match target {
                            ResponseTarget::NextStep => step + 1,
                            ResponseTarget::CurrentStep => step,
                        };
                        window.record(chunk, [message]);
                    }
                    Err(err) => {
                        warn!(
                            session_id,
                            step,
                            tool = %err.tool_name,
                            error = %err.source,
                            "Tool call failed"
                        );
                        window.record(
                            step + 1,
                            [AgentMessage::user_text(format!(
                                "{err}. Check the arguments and try again, or take a different action."
                            ))],
                        );
                    }
                }
            }

            logs.push(log);
            self.event_bus.publish(DomainEvent::StepCompleted {
                session_id: session_id.to_string(),
                step,
                tool_calls: calls.len(),
                tokens_used: step_tokens,
                timestamp: Utc::now(),
            });
            step += 1;
        }

        warn!(session_id, max_steps = self.max_steps, "Step budget exhausted");
        self.event_bus.publish(DomainEvent::StepBudgetExhausted {
            session_id: session_id.to_string(),
            max_steps: self.max_steps,
            timestamp: Utc::now(),
        });
        Err(Error::StepBudgetExceeded {
            max_steps: self.max_steps,
        })
    }
}
