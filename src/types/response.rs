//! Unified response records.
//!
//! Every response carries `warnings` (capability gaps that were safely ignored) and a
//! `response` envelope with the resolved model and, for debugging, the raw vendor body.

use crate::types::events::{FinishReason, Usage};
use crate::types::tool::ToolCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A non-fatal capability gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Warning {
    /// The vendor does not support a requested setting; it was not forwarded.
    #[serde(rename_all = "camelCase")]
    UnsupportedSetting {
        setting: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Other { message: String },
}

impl Warning {
    pub fn unsupported_setting(setting: impl Into<String>, details: Option<&str>) -> Self {
        Warning::UnsupportedSetting {
            setting: setting.into(),
            details: details.map(String::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub timestamp: DateTime<Utc>,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl ResponseEnvelope {
    pub fn new(model_id: impl Into<String>, body: Option<serde_json::Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            model_id: model_id.into(),
            body,
        }
    }
}

/// Base64 payload plus its media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFile {
    pub media_type: String,
    pub base64: String,
}

impl GeneratedFile {
    pub fn from_bytes(media_type: impl Into<String>, bytes: &[u8]) -> Self {
        use base64::Engine as _;
        Self {
            media_type: media_type.into(),
            base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    pub response: ResponseEnvelope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub images: Vec<GeneratedFile>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    pub response: ResponseEnvelope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechResponse {
    pub audio: GeneratedFile,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    pub response: ResponseEnvelope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionSegment {
    pub start: f32,
    pub end: f32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionResponse {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptionSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_in_seconds: Option<f32>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    pub response: ResponseEnvelope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedDocument {
    pub index: usize,
    pub relevance_score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankResponse {
    /// Sorted by descending relevance.
    pub ranking: Vec<RankedDocument>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    pub response: ResponseEnvelope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeSession {
    pub client_secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    pub response: ResponseEnvelope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

/// Result of a long-running "response" call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseObject {
    pub id: String,
    pub status: String,
    pub output_text: String,
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    pub response: ResponseEnvelope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingResponse {
    pub model: String,
    pub role: String,
    pub text: String,
    pub stop_reason: FinishReason,
}

/// One entry of a provider's model catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Full routing identifier, `"<provider>/<vendor-model>"`.
    pub id: String,
    pub provider: String,
    /// Vendor model name as the backend knows it.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
}

impl ModelInfo {
    pub fn new(provider: impl Into<String>, name: impl Into<String>) -> Self {
        let provider = provider.into();
        let name = name.into();
        Self {
            id: format!("{}/{}", provider, name),
            provider,
            name,
            owned_by: None,
        }
    }
}
