//! Session-scoped state for screenpilot.
//!
//! Everything here lives in memory behind `tokio::sync::RwLock`; nothing is
//! ever dropped implicitly.

pub mod kv;
pub mod sessions;
pub mod todo;

pub use kv::MemoryStore;
pub use sessions::InMemorySessionStore;
pub use todo::{TodoItem, TodoList, TodoStatus, TodoUpdate};
