//! `computer_action`: drive the remote desktop.
//!
//! The model sends one [`ComputerAction`] plus optional planning notes. The
//! action is validated, forwarded to the [`ComputerProvider`], and answered
//! with the outcome and a fresh screenshot for the next step. Planning notes
//! only reach the step log.

use async_trait::async_trait;
use serde::Deserialize;
use screenpilot_core::computer::{ActionContext, ComputerAction, ComputerProvider};
use screenpilot_core::error::ToolError;
use screenpilot_core::message::{AgentMessage, ContentItem};
use screenpilot_core::session::PlanningData;
use screenpilot_core::tool::{LogUpdate, ResponseTarget, Tool, ToolContext, ToolOutcome};
use std::sync::Arc;
use tracing::info;

use crate::screen::capture_screen;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionArgs {
    action: ComputerAction,
    #[serde(default)]
    previous_step_evaluation: Option<String>,
    #[serde(default)]
    current_reasoning: Option<String>,
    #[serde(default)]
    next_goal: Option<String>,
}

impl ActionArgs {
    fn planning(&self) -> Option<PlanningData> {
        let planning = PlanningData {
            previous_step_evaluation: self.previous_step_evaluation.clone(),
            current_reasoning: self.current_reasoning.clone(),
            next_goal: self.next_goal.clone(),
        };
        (!planning.is_empty()).then_some(planning)
    }
}

pub struct ComputerActionTool {
    computer: Arc<dyn ComputerProvider>,
    upload_screenshots: bool,
}

impl ComputerActionTool {
    pub fn new(computer: Arc<dyn ComputerProvider>) -> Self {
        Self {
            computer,
            upload_screenshots: true,
        }
    }

    pub fn with_upload(mut self, upload: bool) -> Self {
        self.upload_screenshots = upload;
        self
    }
}

#[async_trait]
impl Tool for ComputerActionTool {
    fn name(&self) -> &str {
        "computer_action"
    }

    fn description(&self) -> &str {
        "Perform one action on the computer (click, double_click, drag, keypress, move, scroll, \
         type, wait). Returns the result and a new screenshot of the screen."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        let point = serde_json::json!({
            "type": "object",
            "properties": { "x": { "type": "integer" }, "y": { "type": "integer" } },
            "required": ["x", "y"]
        });
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "oneOf": [
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "click" },
                                "x": { "type": "integer" },
                                "y": { "type": "integer" },
                                "button": { "enum": ["left", "right", "wheel"], "default": "left" }
                            },
                            "required": ["type", "x", "y"]
                        },
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "double_click" },
                                "x": { "type": "integer" },
                                "y": { "type": "integer" }
                            },
                            "required": ["type", "x", "y"]
                        },
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "drag" },
                                "path": { "type": "array", "items": point, "minItems": 2 }
                            },
                            "required": ["type", "path"]
                        },
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "keypress" },
                                "keys": { "type": "array", "items": { "type": "string" }, "minItems": 1 }
                            },
                            "required": ["type", "keys"]
                        },
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "move" },
                                "x": { "type": "integer" },
                                "y": { "type": "integer" }
                            },
                            "required": ["type", "x", "y"]
                        },
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "scroll" },
                                "x": { "type": "integer" },
                                "y": { "type": "integer" },
                                "scroll_x": { "type": "integer" },
                                "scroll_y": { "type": "integer" }
                            },
                            "required": ["type", "x", "y", "scroll_x", "scroll_y"]
                        },
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "type" },
                                "text": { "type": "string", "minLength": 1 }
                            },
                            "required": ["type", "text"]
                        },
                        {
                            "type": "object",
                            "properties": {
                                "type": { "const": "wait" },
                                "duration": { "type": "number", "minimum": 0, "description": "Seconds" }
                            },
                            "required": ["type", "duration"]
                        }
                    ]
                },
                "previousStepEvaluation": {
                    "type": "string",
                    "description": "Did the previous step achieve its goal?"
                },
                "currentReasoning": {
                    "type": "string",
                    "description": "Why this action is the right next move"
                },
                "nextGoal": {
                    "type": "string",
                    "description": "What this action should accomplish"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolError> {
        let args: ActionArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("computer_action: {e}")))?;
        args.action.validate()?;

        let description = args.action.describe();
        info!(
            session_id = context.session_id,
            step = context.step,
            action = %description,
            "Performing computer action"
        );

        let outcome = self
            .computer
            .perform_action(
                &args.action,
                ActionContext {
                    session_id: context.session_id.to_string(),
                    step: context.step,
                    reasoning: args.current_reasoning.clone(),
                },
            )
            .await?;

        let image = capture_screen(
            self.computer.as_ref(),
            context.session_id,
            context.step,
            self.upload_screenshots,
        )
        .await?;
        let reference = image.reference();

        let message = AgentMessage::user(vec![
            ContentItem::text(format!("Action performed: {}", outcome.action_performed)),
            ContentItem::image(image),
        ]);

        Ok(ToolOutcome::Response {
            message,
            log_update: Some(LogUpdate {
                screenshot: Some(reference),
                planning: args.planning(),
                action: Some(description),
            }),
            target: ResponseTarget::NextStep,
        })
    }
}
