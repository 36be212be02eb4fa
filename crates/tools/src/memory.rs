//! `memory`: a key/value scratchpad that outlives the conversation window.

use async_trait::async_trait;
use serde::Deserialize;
use screenpilot_core::error::ToolError;
use screenpilot_core::tool::{Tool, ToolContext, ToolOutcome};
use screenpilot_memory::MemoryStore;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum MemoryAction {
    Store,
    Update,
    Retrieve,
    Delete,
    List,
}

#[derive(Debug, Deserialize)]
struct MemoryArgs {
    action: MemoryAction,
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

impl MemoryArgs {
    fn key(&self) -> Result<&str, ToolError> {
        self.key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("memory: 'key' is required".into()))
    }

    fn data(&self) -> Result<&str, ToolError> {
        self.data
            .as_deref()
            .ok_or_else(|| ToolError::InvalidArguments("memory: 'data' is required".into()))
    }
}

pub struct MemoryTool {
    store: MemoryStore,
}

impl MemoryTool {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for MemoryTool {
    fn name(&self) -> &str {
        "memory"
    }

    fn description(&self) -> &str {
        "Save and recall notes that must survive the whole task (prices, names, progress). \
         Older screenshots and messages are dropped from view; memory is not."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["store", "update", "retrieve", "delete", "list"]
                },
                "key": {
                    "type": "string",
                    "description": "Entry name (not needed for list)"
                },
                "data": {
                    "type": "string",
                    "description": "Value to save (store and update only)"
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
        let args: MemoryArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("memory: {e}")))?;
        debug!(session_id = context.session_id, action = ?args.action, key = ?args.key, "Memory tool");

        let text = match args.action {
            MemoryAction::Store => {
                let key = args.key()?;
                self.store.store(key, args.data()?).await;
                format!("Stored '{key}'.")
            }
            MemoryAction::Update => {
                let key = args.key()?;
                match self.store.update(key, args.data()?).await {
                    Some(_) => format!("Updated '{key}'."),
                    None => format!("Stored '{key}'."),
                }
            }
            MemoryAction::Retrieve => {
                let key = args.key()?;
                match self.store.retrieve(key).await {
                    Some(value) => format!("{key}: {value}"),
                    None => format!("No memory found for '{key}'."),
                }
            }
            MemoryAction::Delete => {
                let key = args.key()?;
                match self.store.delete(key).await {
                    Some(_) => format!("Deleted '{key}'."),
                    None => format!("No memory found for '{key}'."),
                }
            }
            MemoryAction::List => {
                let entries = self.store.list().await;
                if entries.is_empty() {
                    "Memory is empty.".to_string()
                } else {
                    let lines: Vec<String> = entries.iter().map(|(k, v)| format!("- {k}: {v}")).collect();
                    format!("Memory ({} entries):\n{}", entries.len(), lines.join("\n"))
                }
            }
        };

        Ok(ToolOutcome::text(text))
    }
}
