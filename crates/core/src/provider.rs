//! AI provider trait — the abstraction over multimodal model backends.
//!
//! A provider can run a tool-calling text generation over a message history,
//! or a structured generation that must return an object matching a JSON
//! schema. Concrete OpenAI/Anthropic/Google wrappers live outside this
//! workspace and implement [`AiProvider`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::AiProviderError;
use crate::message::{AgentMessage, ToolCall};

/// A tool definition sent to the model so it knows what tools it can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// A tool-calling generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateTextRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    pub messages: Vec<AgentMessage>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// The result of one tool-calling generation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateTextResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Provider-exposed reasoning / thinking text, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A structured generation request validated against `schema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateObjectRequest {
    pub schema: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub messages: Vec<AgentMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateObjectResponse {
    pub object: serde_json::Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// The core AI provider trait.
///
/// The step loop, the completion evaluator and the argument-repair hook all
/// call into this trait without knowing which backend is in use.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// The model identifier, used to pick a payload budget family.
    fn model_name(&self) -> &str;

    /// Generate text and/or tool calls for the given history.
    async fn generate_text(
        &self,
        request: GenerateTextRequest,
    ) -> std::result::Result<GenerateTextResponse, AiProviderError>;

    /// Generate an object conforming to `request.schema`.
    async fn generate_object(
        &self,
        request: GenerateObjectRequest,
    ) -> std::result::Result<GenerateObjectResponse, AiProviderError>;
}
