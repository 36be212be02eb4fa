//! The screenpilot agent: a computer-use step loop.
//!
//! Each task follows the same cycle:
//!
//! 1. **Observe**: the model sees the instructions, the latest screenshots
//!    and a bounded window of recent steps
//! 2. **Act**: it emits tool calls (computer actions, memory, todo)
//! 3. **Feed back**: results and fresh screenshots seed the next step
//! 4. **Finish**: a verified `task_complete` call produces the typed result
//!
//! The loop ends on completion or when the step budget runs out; the latter
//! is always reported as an error.

pub mod context;
pub mod dispatcher;
pub mod loop_runner;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use context::ConversationWindow;
pub use dispatcher::{ArgumentRepair, ModelArgumentRepair, ToolDispatcher};
pub use loop_runner::{NO_TOOL_CALLS_MESSAGE, StepLoop};
pub use session::{SessionManager, guard_from_config};
