//! Unified, provider-agnostic request records, one per capability.
//!
//! Field names (camelCase on the wire) are a public contract: add fields, never rename.
//! Every request carries a [`ProviderOptions`] bag that only the backend owning the
//! matching slug ever decodes.

use crate::provider_options::{HasProviderOptions, ProviderOptions};
use crate::types::message::Message;
use crate::types::tool::ToolDefinition;
use serde::{Deserialize, Serialize};

/// Requests addressed by a `"<provider>/<model>"` identifier.
pub trait ModelRequest: HasProviderOptions + Clone + Send + Sync + 'static {
    fn model(&self) -> &str;
    fn set_model(&mut self, model: String);
}

macro_rules! model_request {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl HasProviderOptions for $ty {
                fn provider_options(&self) -> &ProviderOptions {
                    &self.provider_options
                }
            }

            impl ModelRequest for $ty {
                fn model(&self) -> &str {
                    &self.model
                }

                fn set_model(&mut self, model: String) {
                    self.model = model;
                }
            }
        )+
    };
}

model_request!(
    ChatRequest,
    ImageRequest,
    SpeechRequest,
    TranscriptionRequest,
    RerankRequest,
    RealtimeRequest,
    ResponseRequest,
    SamplingRequest,
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    #[serde(
        default,
        alias = "providerMetadata",
        skip_serializing_if = "ProviderOptions::is_empty"
    )]
    pub provider_options: ProviderOptions,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            top_p: None,
            top_k: None,
            stop: None,
            seed: None,
            tools: None,
            tool_choice: None,
            provider_options: ProviderOptions::default(),
        }
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn provider_option(mut self, slug: impl Into<String>, value: serde_json::Value) -> Self {
        self.provider_options.insert(slug, value);
        self
    }

    /// Text of the most recent user message, used when a chat prompt must be re-targeted
    /// to a prompt-only capability (e.g. image generation).
    pub fn last_user_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::types::message::MessageRole::User)
            .map(|m| m.text())
            .filter(|t| !t.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(
        default,
        alias = "providerMetadata",
        skip_serializing_if = "ProviderOptions::is_empty"
    )]
    pub provider_options: ProviderOptions,
}

impl ImageRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            n: None,
            size: None,
            aspect_ratio: None,
            seed: None,
            provider_options: ProviderOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechRequest {
    pub model: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,
    /// `mp3`, `opus`, `aac`, `flac`, `wav` or `pcm`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(
        default,
        alias = "providerMetadata",
        skip_serializing_if = "ProviderOptions::is_empty"
    )]
    pub provider_options: ProviderOptions,
}

impl SpeechRequest {
    pub fn new(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            text: text.into(),
            voice: None,
            speed: None,
            output_format: None,
            instructions: None,
            language: None,
            provider_options: ProviderOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionRequest {
    pub model: String,
    /// Base64 encoded audio.
    pub audio: String,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(
        default,
        alias = "providerMetadata",
        skip_serializing_if = "ProviderOptions::is_empty"
    )]
    pub provider_options: ProviderOptions,
}

impl TranscriptionRequest {
    pub fn new(
        model: impl Into<String>,
        audio_base64: impl Into<String>,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            audio: audio_base64.into(),
            media_type: media_type.into(),
            language: None,
            prompt: None,
            temperature: None,
            provider_options: ProviderOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankRequest {
    pub model: String,
    pub query: String,
    pub documents: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_n: Option<usize>,
    #[serde(
        default,
        alias = "providerMetadata",
        skip_serializing_if = "ProviderOptions::is_empty"
    )]
    pub provider_options: ProviderOptions,
}

impl RerankRequest {
    pub fn new(model: impl Into<String>, query: impl Into<String>, documents: Vec<String>) -> Self {
        Self {
            model: model.into(),
            query: query.into(),
            documents,
            top_n: None,
            provider_options: ProviderOptions::default(),
        }
    }
}

/// Request for an ephemeral realtime session token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeRequest {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(
        default,
        alias = "providerMetadata",
        skip_serializing_if = "ProviderOptions::is_empty"
    )]
    pub provider_options: ProviderOptions,
}

impl RealtimeRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            voice: None,
            instructions: None,
            provider_options: ProviderOptions::default(),
        }
    }
}

/// Long-running "response" request (Response-API style).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRequest {
    pub model: String,
    pub input: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(
        default,
        alias = "providerMetadata",
        skip_serializing_if = "ProviderOptions::is_empty"
    )]
    pub provider_options: ProviderOptions,
}

impl ResponseRequest {
    pub fn new(model: impl Into<String>, input: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            input,
            instructions: None,
            temperature: None,
            max_output_tokens: None,
            previous_response_id: None,
            tools: None,
            provider_options: ProviderOptions::default(),
        }
    }
}

/// Model-context sampling ("create message") request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(
        default,
        alias = "providerMetadata",
        skip_serializing_if = "ProviderOptions::is_empty"
    )]
    pub provider_options: ProviderOptions,
}

impl SamplingRequest {
    /// Equivalent chat request; the system prompt becomes a leading system message.
    pub fn to_chat_request(&self) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.extend(self.messages.iter().cloned());
        ChatRequest {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stop: self.stop_sequences.clone(),
            provider_options: self.provider_options.clone(),
            ..ChatRequest::new(self.model.clone(), messages)
        }
    }
}
