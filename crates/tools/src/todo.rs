//! `todo`: the model's running plan for multi-part tasks.

use async_trait::async_trait;
use serde::Deserialize;
use screenpilot_core::error::ToolError;
use screenpilot_core::tool::{Tool, ToolContext, ToolOutcome};
use screenpilot_memory::{TodoItem, TodoList, TodoStatus, TodoUpdate};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TodoAction {
    Add,
    Update,
    List,
}

#[derive(Debug, Deserialize)]
struct TodoEntry {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<TodoStatus>,
}

#[derive(Debug, Deserialize)]
struct TodoArgs {
    action: TodoAction,
    #[serde(default)]
    todos: Vec<TodoEntry>,
}

fn render(items: &[TodoItem]) -> String {
    if items.is_empty() {
        return "Todo list is empty.".to_string();
    }
    items
        .iter()
        .map(|i| format!("{}. [{}] {}", i.id, i.status, i.description))
        .collect::<Vec<_>>()
        .join("\n")
}

pub struct TodoTool {
    todos: TodoList,
}

impl TodoTool {
    pub fn new(todos: TodoList) -> Self {
        Self { todos }
    }
}

#[async_trait]
impl Tool for TodoTool {
    fn name(&self) -> &str {
        "todo"
    }

    fn description(&self) -> &str {
        "Keep a todo list for multi-part tasks: add items, update their status, or list them."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": { "type": "string", "enum": ["add", "update", "list"] },
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": { "type": "integer", "description": "Required for update" },
                            "description": { "type": "string" },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed", "cancelled"]
                            }
                        }
                    }
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
        let args: TodoArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(format!("todo: {e}")))?;
        debug!(session_id = context.session_id, action = ?args.action, count = args.todos.len(), "Todo tool");

        let header = match args.action {
            TodoAction::Add => {
                let entries = args
                    .todos
                    .into_iter()
                    .map(|t| {
                        let description = t
                            .description
                            .filter(|d| !d.trim().is_empty())
                            .ok_or_else(|| ToolError::InvalidArguments("todo: add needs a description".into()))?;
                        Ok((description, t.status.unwrap_or_default()))
                    })
                    .collect::<Result<Vec<_>, ToolError>>()?;
                let added = self.todos.add(entries).await;
                format!("Added {} item(s).", added.len())
            }
            TodoAction::Update => {
                let mut updates = Vec::with_capacity(args.todos.len());
                for t in args.todos {
                    let id = t
                        .id
                        .ok_or_else(|| ToolError::InvalidArguments("todo: update needs an id".into()))?;
                    updates.push(TodoUpdate {
                        id,
                        description: t.description,
                        status: t.status,
                    });
                }
                let requested = updates.len();
                let applied = self.todos.update(updates).await;
                if applied.len() == requested {
                    format!("Updated {} item(s).", applied.len())
                } else {
                    format!(
                        "Updated {} item(s); {} unknown id(s) skipped.",
                        applied.len(),
                        requested - applied.len()
                    )
                }
            }
            TodoAction::List => "Current todo list:".to_string(),
        };

        let items = self.todos.list().await;
        Ok(ToolOutcome::text(format!("{header}\n{}", render(&items))))
    }
}
