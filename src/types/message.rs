//! Unified chat message format shared by chat, response and sampling requests.

use serde::{Deserialize, Serialize};

/// Unified message structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
    /// Required by most vendors when `role` is `tool`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self::with_content(MessageRole::System, MessageContent::Text(text.into()))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_content(MessageRole::User, MessageContent::Text(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_content(MessageRole::Assistant, MessageContent::Text(text.into()))
    }

    pub fn tool(tool_call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: MessageContent::Text(text.into()),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn with_content(role: MessageRole, content: MessageContent) -> Self {
        Self {
            role,
            content,
            tool_call_id: None,
        }
    }

    /// Concatenated text of all text blocks; non-text blocks are skipped.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }

    pub fn contains_image(&self) -> bool {
        match &self.content {
            MessageContent::Text(_) => false,
            MessageContent::Blocks(bs) => {
                bs.iter().any(|b| matches!(b, ContentBlock::Image { .. }))
            }
        }
    }
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Message content (can be string or array of content blocks)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        MessageContent::Text(text.into())
    }

    pub fn blocks(blocks: Vec<ContentBlock>) -> Self {
        MessageContent::Blocks(blocks)
    }
}

/// Content block (for multimodal input)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: MediaSource },
    Audio { source: MediaSource },
}

/// Inline (base64) or remote (URL) media payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSource {
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub data: String,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn image_base64(data: String, media_type: Option<String>) -> Self {
        ContentBlock::Image {
            source: MediaSource {
                source_type: "base64".to_string(),
                media_type,
                data,
            },
        }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentBlock::Image {
            source: MediaSource {
                source_type: "url".to_string(),
                media_type: None,
                data: url.into(),
            },
        }
    }

    pub fn audio_base64(data: String, media_type: Option<String>) -> Self {
        ContentBlock::Audio {
            source: MediaSource {
                source_type: "base64".to_string(),
                media_type,
                data,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_joins_text_blocks_only() {
        let msg = Message::with_content(
            MessageRole::User,
            MessageContent::blocks(vec![
                ContentBlock::text("draw "),
                ContentBlock::image_url("https://example.com/cat.png"),
                ContentBlock::text("a cat"),
            ]),
        );
        assert_eq!(msg.text(), "draw a cat");
        assert!(msg.contains_image());
    }

    #[test]
    fn tool_message_serializes_call_id() {
        let v = serde_json::to_value(Message::tool("call_1", "42")).unwrap();
        assert_eq!(v["role"], "tool");
        assert_eq!(v["toolCallId"], "call_1");
        assert_eq!(v["content"], "42");
    }
}
