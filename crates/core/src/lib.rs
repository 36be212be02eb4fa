//! # screenpilot core
//!
//! Domain types, collaborator traits, and error definitions for the
//! screenpilot computer-use agent. This crate has **no framework
//! dependencies**; it defines the model every other crate builds on.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here:
//! - [`AiProvider`] for model generation and structured output
//! - [`ComputerProvider`] for the remote desktop / browser sandbox
//! - [`SessionStore`] for session state
//! - [`Tool`] for everything the model can invoke
//!
//! Implementations live in their respective crates (or outside the
//! workspace), which keeps the loop testable with scripted mocks.

pub mod computer;
pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use computer::{
    ActionContext, ActionOutcome, ComputerAction, ComputerProvider, MouseButton, Point,
    ScreenSize, StartOptions, StartedSession, UploadRequest,
};
pub use error::{
    AiProviderError, ComputerError, Error, Result, SessionError, ToolCallError, ToolError,
    TransportError,
};
pub use event::{DomainEvent, EventBus};
pub use message::{AgentMessage, ContentItem, ImageSource, ToolCall};
pub use provider::{
    AiProvider, GenerateObjectRequest, GenerateObjectResponse, GenerateTextRequest,
    GenerateTextResponse, ToolDefinition, Usage,
};
pub use session::{
    AgentLog, PlanningData, Session, SessionStatus, SessionStore, Task, TaskStatus,
};
pub use tool::{
    LogUpdate, MessageHistory, ResponseTarget, Tool, ToolContext, ToolOutcome, ToolRegistry,
};
