//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what let the model act: drive the remote computer, declare the
//! task complete, keep notes in memory, maintain a todo list. Each tool
//! returns a [`ToolOutcome`]: either a message to feed back to the model, or
//! the final task output.

use async_trait::async_trait;
use std::collections::HashMap;
use crate::error::ToolError;
use crate::message::{AgentMessage, ToolCall};
use crate::provider::ToolDefinition;
use crate::session::PlanningData;

/// Read access to every message recorded for a task, in step order.
///
/// Tools borrow the history instead of receiving a copy; only the ones that
/// forward it to a model take a [`snapshot`](MessageHistory::snapshot).
pub trait MessageHistory: Send + Sync {
    fn messages(&self) -> Box<dyn Iterator<Item = &AgentMessage> + '_>;

    fn snapshot(&self) -> Vec<AgentMessage> {
        self.messages().cloned().collect()
    }
}

impl MessageHistory for Vec<AgentMessage> {
    fn messages(&self) -> Box<dyn Iterator<Item = &AgentMessage> + '_> {
        Box::new(self.iter())
    }

    fn snapshot(&self) -> Vec<AgentMessage> {
        self.clone()
    }
}

/// Per-call context handed to [`Tool::execute`].
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    pub session_id: &'a str,

    /// The step the call was emitted in
    pub step: u32,

    /// Every message recorded so far (not windowed)
    pub history: &'a dyn MessageHistory,
}

impl std::fmt::Debug for ToolContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("session_id", &self.session_id)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

/// Which conversation chunk a tool response lands in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseTarget {
    /// Seed the next step (action, memory and todo results).
    #[default]
    NextStep,
    /// Append to the step that issued the call, so the model sees it
    /// immediately (completion feedback).
    CurrentStep,
}

/// Fields a tool contributes to the step's log record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogUpdate {
    pub screenshot: Option<String>,
    pub planning: Option<PlanningData>,
    pub action: Option<String>,
}

/// The result of a tool execution.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Response {
        message: AgentMessage,
        log_update: Option<LogUpdate>,
        target: ResponseTarget,
    },
    Completion {
        output: serde_json::Value,
    },
}

impl ToolOutcome {
    /// A plain text response for the next step.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Response {
            message: AgentMessage::user_text(text),
            log_update: None,
            target: ResponseTarget::NextStep,
        }
    }

    pub fn is_completion(&self) -> bool {
        matches!(self, Self::Completion { .. })
    }
}

/// The core Tool trait.
///
/// Built-in tools (computer_action, task_complete, memory, todo) implement
/// this trait and are registered in a [`ToolRegistry`] per task.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "computer_action", "memory").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext<'_>,
    ) -> std::result::Result<ToolOutcome, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, looked up by name at dispatch time.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions, sorted by name so requests are stable.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool call.
    pub async fn execute(
        &self,
        call: &ToolCall,
        context: &ToolContext<'_>,
    ) -> std::result::Result<ToolOutcome, ToolError> {
        let tool = self.tools.get(&call.name).ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(call.arguments.clone(), context).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
