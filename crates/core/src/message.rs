//! Message domain types.
//!
//! An [`AgentMessage`] is either a user turn (ordered text/image items) or an
//! assistant turn (text plus zero or more tool calls). Messages are immutable
//! once appended to a conversation chunk.

use serde::{Deserialize, Serialize};

/// Where the bytes of an image live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    /// A remote reference that must be resolved before it reaches a model.
    Url(String),
    /// Inline base64 data.
    Base64 { media_type: String, data: String },
}

impl ImageSource {
    pub fn png(data: impl Into<String>) -> Self {
        Self::Base64 {
            media_type: "image/png".into(),
            data: data.into(),
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Base64 { .. })
    }

    /// Short reference suitable for logs: the URL, or a data-size marker.
    pub fn reference(&self) -> String {
        match self {
            Self::Url(url) => url.clone(),
            Self::Base64 { media_type, data } => {
                format!("inline:{media_type}:{}b", data.len())
            }
        }
    }
}

/// One item of a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text { text: String },
    Image { image: ImageSource },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(image: ImageSource) -> Self {
        Self::Image { image }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Self::Image { .. })
    }
}

/// A tool invocation emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the model's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// A single message in the agent conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum AgentMessage {
    User {
        content: Vec<ContentItem>,
    },
    Assistant {
        #[serde(default)]
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
}

impl AgentMessage {
    /// A user message with a single text item.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::User {
            content: vec![ContentItem::text(text)],
        }
    }

    pub fn user(content: Vec<ContentItem>) -> Self {
        Self::User { content }
    }

    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self::Assistant {
            text: text.into(),
            tool_calls,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    /// Tool calls carried by this message (empty for user turns).
    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::Assistant { tool_calls, .. } => tool_calls,
            Self::User { .. } => &[],
        }
    }

    /// Number of image items in this message.
    pub fn image_count(&self) -> usize {
        match self {
            Self::User { content } => content.iter().filter(|c| c.is_image()).count(),
            Self::Assistant { .. } => 0,
        }
    }

    /// Concatenated text of the message, for logs and assertions.
    pub fn text(&self) -> String {
        match self {
            Self::User { content } => content
                .iter()
                .filter_map(|c| match c {
                    ContentItem::Text { text } => Some(text.as_str()),
                    ContentItem::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Assistant { text, .. } => text.clone(),
        }
    }
}
