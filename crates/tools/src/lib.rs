//! Built-in tools for screenpilot.
//!
//! - [`ComputerActionTool`]: perform one action on the remote desktop
//! - [`TaskCompleteTool`]: verified, schema-typed task completion
//! - [`MemoryTool`]: key/value notes that outlive the conversation window
//! - [`TodoTool`]: a running plan for multi-part tasks

pub mod computer_action;
pub mod memory;
pub mod screen;
pub mod task_complete;
pub mod todo;

#[cfg(test)]
mod test_support;

pub use computer_action::ComputerActionTool;
pub use memory::MemoryTool;
pub use screen::capture_screen;
pub use task_complete::{TASK_COMPLETE, TaskCompleteTool, completion_attempts, default_output_schema};
pub use todo::TodoTool;

use screenpilot_core::tool::ToolRegistry;
use screenpilot_memory::{MemoryStore, TodoList};

/// The registry the step loop offers the model for one task.
pub fn task_registry(
    computer: ComputerActionTool,
    completion: TaskCompleteTool,
    memory: MemoryStore,
    todos: TodoList,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(computer));
    registry.register(Box::new(completion));
    registry.register(Box::new(MemoryTool::new(memory)));
    registry.register(Box::new(TodoTool::new(todos)));
    registry
}
