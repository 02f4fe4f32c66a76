//! # Streaming Translation Engine
//!
//! Turns whatever a backend sends back into the unified [`OutputPart`] sequence.
//!
//! ## Pipeline Stages
//!
//! ```text
//! Raw Bytes → SseDecoder → SseFrame ─┬─ chat_delta      → OutputPart
//!                                    └─ response_events → ResponseStreamEvent → OutputPart
//! JobBackend → Poller → artifact ────── job             → OutputPart
//! ```
//!
//! Each translator is a small synchronous state machine (`on_*` methods returning the
//! parts to emit) wrapped in a lazy `stream::unfold`, so frames are pulled one at a
//! time and nothing is buffered beyond the current frame. The state lives inside the
//! stream: two requests never share translation state.
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | SSE framing (`data:` / `event:` lines, `[DONE]` sentinel) |
//! | [`chat_delta`] | Chat-delta SSE → output parts, tolerant of a missing finish |
//! | [`response_events`] | Typed Response-API events, strict about unknown tags |
//! | [`job`] | Async job backends → output parts, via the poller |
//! | [`collect`] | Fold an output-part stream back into a [`ChatResponse`] |
//! | [`cancel`] | Cancellation handle and stream adapter |
//!
//! [`ChatResponse`]: crate::types::ChatResponse

pub mod cancel;
pub mod chat_delta;
pub mod collect;
pub mod decode;
pub mod job;
pub mod response_events;

pub use cancel::{cancellable, CancelHandle};
pub use chat_delta::{translate_chat_deltas, ChatDeltaTranslator};
pub use collect::{collect_chat_response, collect_text};
pub use decode::{SseDecoder, SseFrame};
pub use job::{run_job, stream_job, FinishedJob, JobBackend, JobOutcome};
pub use response_events::{
    decode_response_events, translate_response_events, ResponseEventTranslator,
    ResponseSnapshot, ResponseStreamEvent,
};

use crate::types::chunk::ChatCompletionChunk;
use crate::types::events::OutputPart;
use crate::BoxStream;
use futures::Stream;
use std::pin::Pin;

/// Unified output-part stream. Failures are carried in-band as `error` parts.
pub type PartStream = Pin<Box<dyn Stream<Item = OutputPart> + Send + 'static>>;

/// Chat completion chunks for `chat-complete-stream`.
pub type ChunkStream = BoxStream<'static, ChatCompletionChunk>;

/// Typed Response-API events for `response-stream`.
pub type ResponseEventStream = BoxStream<'static, ResponseStreamEvent>;

/// A stream consisting of a single `error` part.
pub fn error_stream(err: &crate::Error) -> PartStream {
    Box::pin(futures::stream::iter(vec![OutputPart::error(err)]))
}

/// Wire-level protocol failures. All of them surface as
/// [`ErrorKind::ProtocolViolation`](crate::ErrorKind::ProtocolViolation).
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Invalid frame: {reason} (data: {data})")]
    InvalidFrame { data: String, reason: String },

    #[error("Unknown event type '{event_type}'{}", .hint.as_ref().map(|h| format!("\n💡 Hint: {}", h)).unwrap_or_default())]
    UnknownEventType {
        event_type: String,
        hint: Option<String>,
    },

    #[error("Event '{event_type}' has an unexpected payload: {reason}")]
    InvalidPayload { event_type: String, reason: String },

    #[error("Stream ended before a terminal event{}", .hint.as_ref().map(|h| format!("\n💡 Hint: {}", h)).unwrap_or_default())]
    UnexpectedEnd { hint: Option<String> },
}

impl PipelineError {
    /// Attach an actionable hint to the error
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        let hint_val = Some(hint.into());
        match self {
            PipelineError::UnknownEventType { ref mut hint, .. } => *hint = hint_val,
            PipelineError::UnexpectedEnd { ref mut hint } => *hint = hint_val,
            _ => (),
        }
        self
    }

    pub(crate) fn invalid_frame(data: &str, reason: impl std::fmt::Display) -> Self {
        PipelineError::InvalidFrame {
            data: data.chars().take(256).collect(),
            reason: reason.to_string(),
        }
    }
}
