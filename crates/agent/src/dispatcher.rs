//! Tool dispatch with argument repair.
//!
//! Every call is routed through the [`ToolRegistry`]. Unknown tools produce a
//! corrective message instead of an error. When a tool rejects its arguments
//! and an [`ArgumentRepair`] hook is configured, the arguments are repaired
//! and the call retried once.

use async_trait::async_trait;
use screenpilot_core::error::{ToolCallError, ToolError};
use screenpilot_core::event::{DomainEvent, EventBus};
use screenpilot_core::message::{AgentMessage, ToolCall};
use screenpilot_core::provider::{AiProvider, GenerateObjectRequest, ToolDefinition};
use screenpilot_core::tool::{ToolContext, ToolOutcome, ToolRegistry};
use screenpilot_transport::TransportGuard;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fixes malformed tool arguments.
#[async_trait]
pub trait ArgumentRepair: Send + Sync {
    async fn repair(
        &self,
        tool: &ToolDefinition,
        arguments: &serde_json::Value,
        error: &str,
    ) -> Result<serde_json::Value, ToolError>;
}

/// Asks a model to rewrite the arguments against the tool's schema.
pub struct ModelArgumentRepair {
    provider: Arc<dyn AiProvider>,
    guard: Arc<TransportGuard>,
}

impl ModelArgumentRepair {
    pub fn new(provider: Arc<dyn AiProvider>, guard: Arc<TransportGuard>) -> Self {
        Self { provider, guard }
    }
}

#[async_trait]
impl ArgumentRepair for ModelArgumentRepair {
    async fn repair(
        &self,
        tool: &ToolDefinition,
        arguments: &serde_json::Value,
        error: &str,
    ) -> Result<serde_json::Value, ToolError> {
        let prompt = format!(
            "The arguments for the tool '{}' are invalid.\n\nTool description: {}\n\n\
             Arguments: {}\n\nError: {}\n\nReturn corrected arguments that match the schema \
             and keep the original intent.",
            tool.name, tool.description, arguments, error
        );
        let response = self
            .guard
            .generate_object(
                self.provider.as_ref(),
                GenerateObjectRequest {
                    schema: tool.parameters.clone(),
                    system_prompt: None,
                    messages: vec![AgentMessage::user_text(prompt)],
                },
            )
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: tool.name.clone(),
                reason: format!("argument repair failed: {e}"),
            })?;
        Ok(response.object)
    }
}

pub struct ToolDispatcher {
    registry: ToolRegistry,
    repair: Option<Arc<dyn ArgumentRepair>>,
    event_bus: Arc<EventBus>,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, event_bus: Arc<EventBus>) -> Self {
        Self {
            registry,
            repair: None,
            event_bus,
        }
    }

    pub fn with_repair(mut self, repair: Arc<dyn ArgumentRepair>) -> Self {
        self.repair = Some(repair);
        self
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.definitions()
    }

    /// Run one tool call.
    pub async fn dispatch(
        &self,
        call: &ToolCall,
        context: &ToolContext<'_>,
    ) -> Result<ToolOutcome, ToolCallError> {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(
                session_id = context.session_id,
                step = context.step,
                tool = %call.name,
                "Model called an unknown tool"
            );
            let mut available = self.registry.names();
            available.sort_unstable();
            return Ok(ToolOutcome::text(format!(
                "Tool '{}' not found. Select one of the available tools: {}.",
                call.name,
                available.join(", ")
            )));
        };

        let start = Instant::now();
        let mut arguments = call.arguments.clone();
        let mut result = tool.execute(arguments.clone(), context).await;

        let pending_repair = match (&result, &self.repair) {
            (Err(ToolError::InvalidArguments(reason)), Some(repair)) => {
                Some((reason.clone(), Arc::clone(repair)))
            }
            _ => None,
        };
        if let Some((reason, repair)) = pending_repair {
            info!(tool = %call.name, %reason, "Repairing tool arguments");
            match repair.repair(&tool.to_definition(), &arguments, &reason).await {
                Ok(repaired) => {
                    debug!(tool = %call.name, arguments = %repaired, "Retrying with repaired arguments");
                    arguments = repaired;
                    result = tool.execute(arguments.clone(), context).await;
                }
                Err(e) => warn!(tool = %call.name, error = %e, "Argument repair failed"),
            }
        }

        self.event_bus.publish(DomainEvent::ToolExecuted {
            session_id: context.session_id.to_string(),
            tool_name: call.name.clone(),
            success: result.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: chrono::Utc::now(),
        });

        result.map_err(|source| ToolCallError {
            tool_name: call.name.clone(),
            arguments,
            source,
        })
    }
}
