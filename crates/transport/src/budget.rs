//! Per-model-family payload budgeting.
//!
//! Some backends cap the number of attached images, others the total request
//! size. Both limiters walk the history newest → oldest so the most recent
//! context survives, and neither ever splits a single content item.

use screenpilot_core::message::{AgentMessage, ContentItem, ImageSource};

/// How a model family bounds its request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    /// Attachment-count ceiling
    CountBounded,
    /// Payload-size ceiling
    ByteBounded,
    /// No known ceiling; history passes through untouched
    Unrecognized,
}

/// Maps model names to a [`ModelFamily`] by prefix.
#[derive(Debug, Clone)]
pub struct FamilyRules {
    pub count_bounded_prefixes: Vec<String>,
    pub byte_bounded_prefixes: Vec<String>,
}

impl FamilyRules {
    pub fn classify(&self, model_name: &str) -> ModelFamily {
        let name = model_name.trim().to_lowercase();
        let matches = |prefixes: &[String]| prefixes.iter().any(|p| name.starts_with(&p.to_lowercase()));
        if matches(&self.count_bounded_prefixes) {
            ModelFamily::CountBounded
        } else if matches(&self.byte_bounded_prefixes) {
            ModelFamily::ByteBounded
        } else {
            ModelFamily::Unrecognized
        }
    }
}

impl Default for FamilyRules {
    fn default() -> Self {
        Self {
            count_bounded_prefixes: vec!["claude".into(), "anthropic/".into()],
            byte_bounded_prefixes: ["gemini", "google/", "gpt", "openai/", "o1", "o3", "o4"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Limits for both families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadBudget {
    pub max_images: usize,
    pub max_bytes: usize,
    /// Size assumed for an image that is still a URL reference
    pub unresolved_image_bytes: usize,
}

impl Default for PayloadBudget {
    fn default() -> Self {
        Self {
            max_images: 95,
            max_bytes: 18 * 1024 * 1024,
            unresolved_image_bytes: 1024 * 1024,
        }
    }
}

impl PayloadBudget {
    /// Apply the limiter for `family`.
    pub fn apply(&self, family: ModelFamily, messages: Vec<AgentMessage>) -> Vec<AgentMessage> {
        match family {
            ModelFamily::CountBounded => limit_image_count(messages, self.max_images),
            ModelFamily::ByteBounded => {
                limit_payload_bytes(messages, self.max_bytes, self.unresolved_image_bytes)
            }
            ModelFamily::Unrecognized => messages,
        }
    }
}

/// Keep at most `max_images` images, preferring the newest.
///
/// Whole messages are kept while the running image count fits. The first
/// message that would overflow keeps its text and its newest images that
/// still fit; everything older is dropped.
pub fn limit_image_count(messages: Vec<AgentMessage>, max_images: usize) -> Vec<AgentMessage> {
    let mut kept = Vec::with_capacity(messages.len());
    let mut images = 0usize;

    for message in messages.into_iter().rev() {
        let count = message.image_count();
        if images + count <= max_images {
            images += count;
            kept.push(message);
            continue;
        }

        let remaining = max_images - images;
        if let AgentMessage::User { content } = message {
            let skip = count - remaining;
            let mut seen = 0usize;
            let trimmed: Vec<ContentItem> = content
                .into_iter()
                .filter(|item| {
                    if item.is_image() {
                        seen += 1;
                        seen > skip
                    } else {
                        true
                    }
                })
                .collect();
            if !trimmed.is_empty() {
                kept.push(AgentMessage::User { content: trimmed });
            }
        }
        break;
    }

    kept.reverse();
    kept
}

/// Drop the oldest images beyond `max_images`, keeping every text item.
///
/// Unlike [`limit_image_count`] no message is cut off wholesale; a message is
/// only removed if it held nothing but dropped images.
pub fn cap_images(messages: Vec<AgentMessage>, max_images: usize) -> Vec<AgentMessage> {
    let total: usize = messages.iter().map(|m| m.image_count()).sum();
    let mut to_drop = total.saturating_sub(max_images);
    if to_drop == 0 {
        return messages;
    }

    messages
        .into_iter()
        .filter_map(|message| match message {
            AgentMessage::User { content } => {
                let content: Vec<ContentItem> = content
                    .into_iter()
                    .filter(|item| {
                        if item.is_image() && to_drop > 0 {
                            to_drop -= 1;
                            false
                        } else {
                            true
                        }
                    })
                    .collect();
                (!content.is_empty()).then_some(AgentMessage::User { content })
            }
            assistant => Some(assistant),
        })
        .collect()
}

/// Estimated encoded size of a content item.
pub fn estimate_item_bytes(item: &ContentItem, unresolved_image_bytes: usize) -> usize {
    match item {
        ContentItem::Text { text } => text.len(),
        ContentItem::Image { image: ImageSource::Base64 { data, .. } } => decoded_len(data),
        ContentItem::Image { image: ImageSource::Url(_) } => unresolved_image_bytes,
    }
}

fn estimate_assistant_bytes(message: &AgentMessage) -> usize {
    match message {
        AgentMessage::Assistant { text, tool_calls } => {
            text.len()
                + tool_calls
                    .iter()
                    .map(|c| c.id.len() + c.name.len() + c.arguments.to_string().len())
                    .sum::<usize>()
        }
        AgentMessage::User { .. } => 0,
    }
}

/// Decoded length of base64 data without decoding it.
fn decoded_len(data: &str) -> usize {
    let trimmed = data.trim_end_matches('=');
    trimmed.len() * 3 / 4
}

/// Keep the newest content whose estimated size totals at most `max_bytes`.
///
/// Within a message, text items are admitted before images; images are then
/// admitted newest first. Items that do not fit are dropped whole, and a
/// message left with nothing is dropped.
pub fn limit_payload_bytes(
    messages: Vec<AgentMessage>,
    max_bytes: usize,
    unresolved_image_bytes: usize,
) -> Vec<AgentMessage> {
    let mut kept = Vec::with_capacity(messages.len());
    let mut total = 0usize;

    for message in messages.into_iter().rev() {
        match message {
            AgentMessage::User { content } => {
                let sizes: Vec<usize> = content
                    .iter()
                    .map(|item| estimate_item_bytes(item, unresolved_image_bytes))
                    .collect();
                let mut keep = vec![false; content.len()];

                for (i, item) in content.iter().enumerate() {
                    if !item.is_image() && total + sizes[i] <= max_bytes {
                        total += sizes[i];
                        keep[i] = true;
                    }
                }
                for (i, item) in content.iter().enumerate().rev() {
                    if item.is_image() && total + sizes[i] <= max_bytes {
                        total += sizes[i];
                        keep[i] = true;
                    }
                }

                let trimmed: Vec<ContentItem> = content
                    .into_iter()
                    .zip(keep)
                    .filter_map(|(item, keep)| keep.then_some(item))
                    .collect();
                if !trimmed.is_empty() {
                    kept.push(AgentMessage::User { content: trimmed });
                }
            }
            assistant @ AgentMessage::Assistant { .. } => {
                let size = estimate_assistant_bytes(&assistant);
                if total + size <= max_bytes {
                    total += size;
                    kept.push(assistant);
                }
            }
        }
    }

    kept.reverse();
    kept
}

/// Total estimated size of a history, as the byte limiter counts it.
pub fn estimate_history_bytes(messages: &[AgentMessage], unresolved_image_bytes: usize) -> usize {
    messages
        .iter()
        .map(|m| match m {
            AgentMessage::User { content } => content
                .iter()
                .map(|item| estimate_item_bytes(item, unresolved_image_bytes))
                .sum(),
            AgentMessage::Assistant { .. } => estimate_assistant_bytes(m),
        })
        .sum()
}
