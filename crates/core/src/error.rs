//! Error types for the screenpilot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] ties them together
//! for callers of the step loop and session manager.

use thiserror::Error;

/// The top-level error type for all screenpilot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model generation ---
    #[error("AI provider error: {0}")]
    AiProvider(#[from] AiProviderError),

    // --- Remote computer ---
    #[error("Computer provider error: {0}")]
    Computer(#[from] ComputerError),

    // --- Tool dispatch ---
    #[error("{0}")]
    ToolCall(#[from] ToolCallError),

    // --- Loop termination ---
    #[error("Step budget exceeded: no completion after {max_steps} steps")]
    StepBudgetExceeded { max_steps: u32 },

    // --- Image download / payload ---
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // --- Session lifecycle ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A generation call against a model backend failed.
#[derive(Debug, Clone, Error)]
pub enum AiProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Structured output did not match schema: {0}")]
    SchemaMismatch(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl AiProviderError {
    /// Whether a retry has a chance of succeeding (5xx, network, timeout).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::Network(_) | Self::Timeout(_) => true,
            Self::RateLimited { .. }
            | Self::AuthenticationFailed(_)
            | Self::MalformedResponse(_)
            | Self::SchemaMismatch(_) => false,
        }
    }
}

/// Session lifecycle or action execution failed at the computer boundary.
#[derive(Debug, Clone, Error)]
pub enum ComputerError {
    #[error("Failed to start computer session {session_id}: {reason}")]
    StartFailed { session_id: String, reason: String },

    #[error("Action failed in session {session_id}: {reason}")]
    ActionFailed { session_id: String, reason: String },

    #[error("Screenshot failed in session {session_id}: {reason}")]
    ScreenshotFailed { session_id: String, reason: String },

    #[error("Screenshot upload failed: {0}")]
    UploadFailed(String),

    #[error("Operation not supported by this computer provider: {0}")]
    Unsupported(String),

    #[error("Computer session not found: {0}")]
    SessionNotFound(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ComputerError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Network(_))
    }
}

/// A tool's own execution failed.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool {tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error(transparent)]
    Computer(#[from] ComputerError),

    #[error(transparent)]
    AiProvider(#[from] AiProviderError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A tool execution failure annotated with the call that produced it.
#[derive(Debug, Clone, Error)]
#[error("Tool call '{tool_name}' failed: {source}")]
pub struct ToolCallError {
    pub tool_name: String,
    pub arguments: serde_json::Value,
    #[source]
    pub source: ToolError,
}

/// Image download and message payload failures.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("HTTP {status} fetching {url}")]
    Http { url: String, status: u16 },

    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("Invalid image payload from {url}: {reason}")]
    InvalidPayload { url: String, reason: String },
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status >= 500,
            Self::Network { .. } | Self::Timeout { .. } => true,
            Self::InvalidPayload { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session {session_id} is busy (status: {status})")]
    Busy { session_id: String, status: String },

    #[error("Session {0} has been stopped")]
    Stopped(String),

    #[error("Session store failure: {0}")]
    Storage(String),
}
