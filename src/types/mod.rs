//! # Types Module
//!
//! The unified data model exchanged with callers, independent of any vendor.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ChatRequest`] and friends | One request record per capability |
//! | [`ChatResponse`] and friends | One response record per capability, with warnings and envelope |
//! | [`OutputPart`] | Element of the unified streaming protocol |
//! | [`ChatCompletionChunk`] | OpenAI-compatible delta chunk |
//! | [`Message`] | Chat message with role and content |
//!
//! ## Submodules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`events`] | Output parts, finish reasons, usage |
//! | [`request`] | Unified requests |
//! | [`response`] | Unified responses |
//! | [`chunk`] | Chat completion chunk records |
//! | [`message`] | Messages with multimodal content |
//! | [`tool`] | Tool/function calling types |

pub mod chunk;
pub mod events;
pub mod message;
pub mod request;
pub mod response;
pub mod tool;

pub use chunk::{ChatCompletionChunk, ChunkChoice, ChunkDelta, WireUsage};
pub use events::{FinishReason, OutputPart, Usage};
pub use message::{ContentBlock, MediaSource, Message, MessageContent, MessageRole};
pub use request::{
    ChatRequest, ImageRequest, ModelRequest, RealtimeRequest, RerankRequest, ResponseRequest,
    SamplingRequest, SpeechRequest, TranscriptionRequest,
};
pub use response::{
    ChatResponse, GeneratedFile, ImageResponse, ModelInfo, RankedDocument, RealtimeSession,
    RerankResponse, ResponseEnvelope, ResponseError, ResponseObject, SamplingResponse,
    SpeechResponse, TranscriptionResponse, TranscriptionSegment, Warning,
};
pub use tool::{FunctionDefinition, ToolCall, ToolDefinition};
