//! The unified output-part protocol.
//!
//! Every streaming call, whatever the vendor wire format, is re-emitted as an ordered
//! sequence of [`OutputPart`]s serialized one JSON object per part:
//!
//! ```text
//! {"type":"text-start","id":"text-0"}
//! {"type":"text-delta","id":"text-0","delta":"Hel"}
//! {"type":"text-delta","id":"text-0","delta":"lo"}
//! {"type":"text-end","id":"text-0"}
//! {"type":"finish","finishReason":"stop","usage":{"inputTokens":3,"outputTokens":2,"totalTokens":5}}
//! ```
//!
//! Ordering rules: a `text-delta` only appears between the `text-start` and `text-end`
//! of its id, and a sequence ends with exactly one `finish` or `error` part (or
//! `abort`, when the vendor cancelled the work itself). A caller-side cancellation
//! simply ends the sequence with no terminal part.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};

/// One element of the unified streaming protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutputPart {
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    /// Binary artifact (image, audio), base64 encoded.
    #[serde(rename_all = "camelCase")]
    File { media_type: String, data: String },
    #[serde(rename_all = "camelCase")]
    Source {
        id: String,
        source_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Finish {
        finish_reason: FinishReason,
        usage: Usage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        temperature: Option<f32>,
    },
    #[serde(rename_all = "camelCase")]
    Error { kind: ErrorKind, error_text: String },
    Abort {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

impl OutputPart {
    pub fn text_start(id: impl Into<String>) -> Self {
        OutputPart::TextStart { id: id.into() }
    }

    pub fn text_delta(id: impl Into<String>, delta: impl Into<String>) -> Self {
        OutputPart::TextDelta {
            id: id.into(),
            delta: delta.into(),
        }
    }

    pub fn text_end(id: impl Into<String>) -> Self {
        OutputPart::TextEnd { id: id.into() }
    }

    pub fn finish(finish_reason: FinishReason, usage: Usage, temperature: Option<f32>) -> Self {
        OutputPart::Finish {
            finish_reason,
            usage,
            temperature,
        }
    }

    pub fn error(err: &crate::Error) -> Self {
        OutputPart::Error {
            kind: err.kind(),
            error_text: err.to_string(),
        }
    }

    /// `finish`, `error` and `abort` close the sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OutputPart::Finish { .. } | OutputPart::Error { .. } | OutputPart::Abort { .. }
        )
    }

    /// The correlation id of text parts.
    pub fn text_id(&self) -> Option<&str> {
        match self {
            OutputPart::TextStart { id }
            | OutputPart::TextDelta { id, .. }
            | OutputPart::TextEnd { id } => Some(id),
            _ => None,
        }
    }

    /// Consumer-side decoding that ignores part types this version does not know.
    pub fn from_json_lenient(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Why generation stopped, normalized across vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Error,
    #[serde(other)]
    Other,
}

impl FinishReason {
    /// Map a vendor finish/stop reason onto the unified set.
    pub fn from_vendor(reason: &str) -> Self {
        match reason.to_ascii_lowercase().as_str() {
            "stop" | "end_turn" | "stop_sequence" | "completed" | "eos" => FinishReason::Stop,
            "length" | "max_tokens" | "max_output_tokens" | "incomplete" => FinishReason::Length,
            "content_filter" | "safety" | "recitation" => FinishReason::ContentFilter,
            "tool_calls" | "function_call" | "tool_use" => FinishReason::ToolCalls,
            "error" | "failed" => FinishReason::Error,
            _ => FinishReason::Other,
        }
    }
}

/// Token accounting carried by `finish` parts and unified responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
}

impl Usage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens: Some(input_tokens),
            output_tokens: Some(output_tokens),
            total_tokens: Some(input_tokens + output_tokens),
        }
    }
}
