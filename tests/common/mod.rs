//! Shared fixtures for integration tests

#![allow(dead_code)]

use ai_gateway_rust::drivers::ProviderDriver;
use ai_gateway_rust::pipeline::decode::bytes_stream;
use ai_gateway_rust::pipeline::{translate_chat_deltas, PartStream, SseDecoder};
use ai_gateway_rust::types::{
    ChatRequest, GeneratedFile, ImageRequest, ImageResponse, ModelInfo, OutputPart,
    ResponseEnvelope,
};
use ai_gateway_rust::{Error, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_stream::StreamExt as _;

/// Ordering rules every part sequence obeys: one terminal part, last; text deltas only
/// inside their start/end pair.
pub fn assert_well_formed(parts: &[OutputPart]) {
    let terminals = parts.iter().filter(|p| p.is_terminal()).count();
    assert_eq!(terminals, 1, "expected exactly one terminal part: {parts:?}");
    assert!(parts.last().is_some_and(|p| p.is_terminal()), "terminal part must be last: {parts:?}");

    let mut open = HashSet::new();
    for part in parts {
        match part {
            OutputPart::TextStart { id } => assert!(open.insert(id.clone()), "{id} started twice"),
            OutputPart::TextDelta { id, .. } => assert!(open.contains(id), "delta outside {id}"),
            OutputPart::TextEnd { id } => assert!(open.remove(id), "{id} ended without start"),
            _ => {}
        }
    }
}

/// Streams a canned chat-delta SSE body through the real decoder and translator.
#[derive(Debug)]
pub struct ScriptedChat {
    pub id: &'static str,
    pub sse: String,
    pub models: Vec<&'static str>,
    pub seen_models: Mutex<Vec<String>>,
    pub chat_calls: AtomicUsize,
}

impl ScriptedChat {
    pub fn new(id: &'static str, sse: impl Into<String>) -> Self {
        Self {
            id,
            sse: sse.into(),
            models: Vec::new(),
            seen_models: Mutex::new(Vec::new()),
            chat_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_models(mut self, models: Vec<&'static str>) -> Self {
        self.models = models;
        self
    }

    pub fn seen_models(&self) -> Vec<String> {
        self.seen_models.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderDriver for ScriptedChat {
    fn provider_id(&self) -> &str {
        self.id
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<PartStream> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_models.lock().unwrap().push(request.model.clone());
        let frames = SseDecoder::default().decode(bytes_stream(vec![self.sse.clone()]));
        Ok(translate_chat_deltas(frames, request.temperature))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self.models.iter().map(|m| ModelInfo::new(self.id, *m)).collect())
    }
}

/// Image-only backend.
#[derive(Debug)]
pub struct ImageOnly {
    pub id: &'static str,
    pub prompts: Mutex<Vec<String>>,
}

impl ImageOnly {
    pub fn new(id: &'static str) -> Self {
        Self {
            id,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ProviderDriver for ImageOnly {
    fn provider_id(&self) -> &str {
        self.id
    }

    async fn generate_image(&self, request: ImageRequest) -> Result<ImageResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        Ok(ImageResponse {
            images: vec![GeneratedFile::from_bytes("image/png", b"\x89PNG")],
            warnings: Vec::new(),
            response: ResponseEnvelope::new(format!("{}/{}", self.id, request.model), None),
        })
    }
}

/// Supports nothing at all.
#[derive(Debug)]
pub struct Bare(pub &'static str);

#[async_trait]
impl ProviderDriver for Bare {
    fn provider_id(&self) -> &str {
        self.0
    }
}

/// Model listing that fails outright.
#[derive(Debug)]
pub struct BrokenListing(pub &'static str);

#[async_trait]
impl ProviderDriver for BrokenListing {
    fn provider_id(&self) -> &str {
        self.0
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Err(Error::upstream(self.0, 503, "overloaded"))
    }
}

/// Model listing that never answers in time; counts calls.
#[derive(Debug)]
pub struct SlowListing {
    pub id: &'static str,
    pub delay: Duration,
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ProviderDriver for SlowListing {
    fn provider_id(&self) -> &str {
        self.id
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(vec![ModelInfo::new(self.id, "late")])
    }
}

/// Chat stream that sends one delta and then hangs until dropped.
#[derive(Debug)]
pub struct Hanging(pub &'static str);

#[async_trait]
impl ProviderDriver for Hanging {
    fn provider_id(&self) -> &str {
        self.0
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<PartStream> {
        let head = tokio_stream::iter(vec![
            OutputPart::text_start("text-0"),
            OutputPart::text_delta("text-0", "partial"),
        ]);
        Ok(Box::pin(head.chain(tokio_stream::pending())))
    }
}

/// Build an SSE body from `data:` payloads, ending in `[DONE]`.
pub fn sse(payloads: &[&str]) -> String {
    let mut body: String = payloads.iter().map(|p| format!("data: {p}\n\n")).collect();
    body.push_str("data: [DONE]\n\n");
    body
}

pub const HELLO: &[&str] = &[
    r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"},"finish_reason":null}]}"#,
    r#"{"choices":[{"index":0,"delta":{"content":"lo"},"finish_reason":null}]}"#,
    r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#,
];

/// OpenAI's `include_usage` shape: the finish frame has no usage, a choice-less frame
/// follows with the totals.
pub const TRAILING_USAGE: &[&str] = &[
    r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"},"finish_reason":null}],"usage":null}"#,
    r#"{"choices":[{"index":0,"delta":{},"finish_reason":"stop"}],"usage":null}"#,
    r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#,
];
