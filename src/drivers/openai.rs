//! OpenAI-compatible driver. Works for OpenAI itself and the long tail of vendors that
//! mirror its HTTP surface (chat completions, images, audio, rerank, realtime sessions,
//! responses, models), each path overridable per provider.

use async_trait::async_trait;
use base64::Engine as _;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::ProviderDriver;
use crate::error::{Error, ErrorContext};
use crate::pipeline::{
    decode_response_events, error_stream, translate_chat_deltas, ChunkStream, PartStream,
    PipelineError, ResponseEventStream, SseDecoder,
};
use crate::provider_options::extract;
use crate::transport::HttpTransport;
use crate::types::chunk::{ChatCompletionChunk, WireUsage};
use crate::types::events::{FinishReason, Usage};
use crate::types::message::{ContentBlock, Message, MessageContent, MessageRole};
use crate::types::request::{
    ChatRequest, ImageRequest, RealtimeRequest, RerankRequest, ResponseRequest, SpeechRequest,
    TranscriptionRequest,
};
use crate::types::response::{
    ChatResponse, GeneratedFile, ImageResponse, ModelInfo, RankedDocument, RealtimeSession,
    RerankResponse, ResponseEnvelope, ResponseError, ResponseObject, SpeechResponse,
    TranscriptionResponse, TranscriptionSegment, Warning,
};
use crate::types::tool::ToolCall;
use crate::Result;

/// Endpoint paths, relative to the provider's base URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiEndpoints {
    pub chat: String,
    pub images: String,
    pub speech: String,
    pub transcriptions: String,
    pub rerank: String,
    pub realtime_sessions: String,
    pub responses: String,
    pub models: String,
}

impl Default for OpenAiEndpoints {
    fn default() -> Self {
        Self {
            chat: "/chat/completions".into(),
            images: "/images/generations".into(),
            speech: "/audio/speech".into(),
            transcriptions: "/audio/transcriptions".into(),
            rerank: "/rerank".into(),
            realtime_sessions: "/realtime/sessions".into(),
            responses: "/responses".into(),
            models: "/models".into(),
        }
    }
}

/// Vendor knobs read from the request's provider options under this driver's slug.
/// Unknown keys are forwarded verbatim, but never over a field the request already set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiOptions {
    pub user: Option<String>,
    pub reasoning_effort: Option<String>,
    pub parallel_tool_calls: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OpenAiOptions {
    fn apply(self, body: &mut Value, warnings: &mut Vec<Warning>) {
        let Some(obj) = body.as_object_mut() else {
            return;
        };
        let named = [
            ("user", self.user.map(Value::String)),
            ("reasoning_effort", self.reasoning_effort.map(Value::String)),
            ("parallel_tool_calls", self.parallel_tool_calls.map(Value::Bool)),
        ];
        let named = named
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)));
        for (key, value) in named.chain(self.extra) {
            if obj.contains_key(&key) {
                warnings.push(Warning::unsupported_setting(
                    format!("providerOptions.{key}"),
                    Some("overlaps a request field"),
                ));
                continue;
            }
            obj.insert(key, value);
        }
    }
}

/// OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    transport: HttpTransport,
    endpoints: OpenAiEndpoints,
}

impl OpenAiCompatibleProvider {
    pub fn new(provider_id: &str, base_url: &str, api_key: Option<String>) -> Result<Self> {
        Ok(Self::from_transport(HttpTransport::new(
            provider_id,
            base_url,
            api_key,
            None,
        )?))
    }

    pub fn from_transport(transport: HttpTransport) -> Self {
        Self {
            transport,
            endpoints: OpenAiEndpoints::default(),
        }
    }

    pub fn with_endpoints(mut self, endpoints: OpenAiEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn id(&self) -> &str {
        self.transport.provider_id()
    }

    fn options<R: crate::provider_options::HasProviderOptions>(&self, request: &R) -> OpenAiOptions {
        extract(request, self.id())
    }

    /// Build the chat-completions body. `top_k` has no OpenAI equivalent and is reported
    /// as a warning instead of being sent.
    pub fn build_chat_body(&self, request: &ChatRequest, stream: bool) -> (Value, Vec<Warning>) {
        let mut warnings = Vec::new();
        let mut body = json!({
            "model": request.model,
            "messages": messages_to_openai(&request.messages),
        });
        if stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({ "include_usage": true });
        }
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(mt) = request.max_tokens {
            body["max_tokens"] = json!(mt);
        }
        if let Some(p) = request.top_p {
            body["top_p"] = json!(p);
        }
        if request.top_k.is_some() {
            warnings.push(Warning::unsupported_setting("topK", None));
        }
        if let Some(stop) = &request.stop {
            body["stop"] = json!(stop);
        }
        if let Some(seed) = request.seed {
            body["seed"] = json!(seed);
        }
        if let Some(tools) = &request.tools {
            body["tools"] = json!(tools);
        }
        if let Some(choice) = &request.tool_choice {
            body["tool_choice"] = choice.clone();
        }
        self.options(request).apply(&mut body, &mut warnings);
        (body, warnings)
    }

    fn envelope(&self, model: &str, body: Value) -> ResponseEnvelope {
        ResponseEnvelope::new(format!("{}/{}", self.id(), model), Some(body))
    }
}

/// Unified messages → OpenAI chat messages.
pub fn messages_to_openai(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                MessageRole::System => "system",
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
                MessageRole::Tool => "tool",
            };
            let content = match &m.content {
                MessageContent::Text(s) => Value::String(s.clone()),
                MessageContent::Blocks(blocks) => {
                    Value::Array(blocks.iter().map(block_to_openai).collect())
                }
            };
            let mut obj = json!({ "role": role, "content": content });
            if m.role == MessageRole::Tool {
                if let Some(ref id) = m.tool_call_id {
                    obj["tool_call_id"] = Value::String(id.clone());
                }
            }
            obj
        })
        .collect()
}

fn block_to_openai(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({ "type": "text", "text": text }),
        ContentBlock::Image { source } => {
            let url = if source.source_type == "url" {
                source.data.clone()
            } else {
                format!(
                    "data:{};base64,{}",
                    source.media_type.as_deref().unwrap_or("image/png"),
                    source.data
                )
            };
            json!({ "type": "image_url", "image_url": { "url": url } })
        }
        ContentBlock::Audio { source } => {
            let format = source
                .media_type
                .as_deref()
                .and_then(|m| m.rsplit('/').next())
                .unwrap_or("wav");
            json!({ "type": "input_audio", "input_audio": { "data": source.data, "format": format } })
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireCompletion {
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireImages {
    #[serde(default)]
    data: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f32>,
    #[serde(default)]
    segments: Vec<TranscriptionSegment>,
}

#[derive(Debug, Deserialize)]
struct WireRerank {
    #[serde(default)]
    results: Vec<WireRerankResult>,
}

#[derive(Debug, Deserialize)]
struct WireRerankResult {
    index: usize,
    relevance_score: f32,
}

#[derive(Debug, Deserialize)]
struct WireRealtimeSession {
    client_secret: WireClientSecret,
}

#[derive(Debug, Deserialize)]
struct WireClientSecret {
    value: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Vec<Value>,
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    usage: Option<crate::pipeline::response_events::ResponseUsage>,
    #[serde(default)]
    error: Option<ResponseError>,
}

#[derive(Debug, Deserialize)]
struct WireModels {
    #[serde(default)]
    data: Vec<WireModel>,
}

#[derive(Debug, Deserialize)]
struct WireModel {
    id: String,
    #[serde(default)]
    owned_by: Option<String>,
}

fn speech_media_type(format: &str) -> &'static str {
    match format {
        "opus" => "audio/opus",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "pcm" => "audio/pcm",
        _ => "audio/mpeg",
    }
}

/// Concatenated `output_text` parts of Response-API output items.
fn response_output_text(output: &[Value]) -> String {
    output
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
        .filter_map(|item| item.get("content").and_then(Value::as_array))
        .flatten()
        .filter(|c| c.get("type").and_then(Value::as_str) == Some("output_text"))
        .filter_map(|c| c.get("text").and_then(Value::as_str))
        .collect()
}

#[async_trait]
impl ProviderDriver for OpenAiCompatibleProvider {
    fn provider_id(&self) -> &str {
        self.id()
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<PartStream> {
        let (body, warnings) = self.build_chat_body(&request, true);
        if !warnings.is_empty() {
            warn!(provider = self.id(), ?warnings, "dropping unsupported settings");
        }
        let resp = match self.transport.post_stream(&self.endpoints.chat, &body).await {
            Ok(resp) => resp,
            Err(e) => return Ok(error_stream(&e)),
        };
        let resp = match self.transport.check_status(resp).await {
            Ok(resp) => resp,
            Err(e) => return Ok(error_stream(&e)),
        };
        let frames = SseDecoder::default().decode(HttpTransport::byte_stream(resp));
        Ok(translate_chat_deltas(frames, request.temperature))
    }

    async fn complete_chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let (body, warnings) = self.build_chat_body(&request, false);
        let resp = self.transport.post_json(&self.endpoints.chat, &body).await?;
        let raw: Value = self.transport.read_json(resp).await?;
        let completion: WireCompletion = serde_json::from_value(raw.clone())
            .map_err(|e| Error::malformed_body(self.id(), 200, e.to_string()))?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::malformed_body(self.id(), 200, "no choices"))?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                name: c.function.name,
                arguments: serde_json::from_str(&c.function.arguments)
                    .unwrap_or(Value::String(c.function.arguments)),
            })
            .collect();

        Ok(ChatResponse {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
            finish_reason: choice
                .finish_reason
                .as_deref()
                .map(FinishReason::from_vendor)
                .unwrap_or(FinishReason::Stop),
            usage: completion.usage.map(Usage::from).unwrap_or_default(),
            warnings,
            response: self.envelope(&request.model, raw),
        })
    }

    async fn complete_chat_stream(&self, request: ChatRequest) -> Result<ChunkStream> {
        let (body, _) = self.build_chat_body(&request, true);
        let resp = self.transport.post_stream(&self.endpoints.chat, &body).await?;
        let resp = self.transport.check_status(resp).await?;
        let frames = SseDecoder::default().decode(HttpTransport::byte_stream(resp));
        let chunks = frames.map(|frame| -> Result<ChatCompletionChunk> {
            let frame = frame?;
            serde_json::from_str::<ChatCompletionChunk>(&frame.data)
                .map_err(|e| PipelineError::invalid_frame(&frame.data, e).into())
        });
        Ok(Box::pin(chunks))
    }

    async fn generate_image(&self, request: ImageRequest) -> Result<ImageResponse> {
        let mut warnings = Vec::new();
        let mut body = json!({
            "model": request.model,
            "prompt": request.prompt,
            "response_format": "b64_json",
        });
        if let Some(n) = request.n {
            body["n"] = json!(n);
        }
        if let Some(size) = &request.size {
            body["size"] = json!(size);
        }
        if request.aspect_ratio.is_some() {
            warnings.push(Warning::unsupported_setting(
                "aspectRatio",
                Some("use size instead"),
            ));
        }
        if request.seed.is_some() {
            warnings.push(Warning::unsupported_setting("seed", None));
        }
        self.options(&request).apply(&mut body, &mut warnings);

        let resp = self.transport.post_json(&self.endpoints.images, &body).await?;
        let raw: Value = self.transport.read_json(resp).await?;
        let wire: WireImages = serde_json::from_value(raw.clone())
            .map_err(|e| Error::malformed_body(self.id(), 200, e.to_string()))?;

        let mut images = Vec::with_capacity(wire.data.len());
        for image in wire.data {
            match (image.b64_json, image.url) {
                (Some(b64), _) => images.push(GeneratedFile {
                    media_type: "image/png".into(),
                    base64: b64,
                }),
                (None, Some(url)) => warnings.push(Warning::Other {
                    message: format!("image returned as URL only: {url}"),
                }),
                (None, None) => {}
            }
        }
        if images.is_empty() {
            return Err(Error::malformed_body(self.id(), 200, "no image data"));
        }
        Ok(ImageResponse {
            images,
            warnings,
            response: self.envelope(&request.model, raw),
        })
    }

    async fn synthesize_speech(&self, request: SpeechRequest) -> Result<SpeechResponse> {
        let mut warnings = Vec::new();
        let format = request.output_format.clone().unwrap_or_else(|| "mp3".into());
        let mut body = json!({
            "model": request.model,
            "input": request.text,
            "voice": request.voice.as_deref().unwrap_or("alloy"),
            "response_format": format,
        });
        if let Some(speed) = request.speed {
            body["speed"] = json!(speed);
        }
        if let Some(instructions) = &request.instructions {
            body["instructions"] = json!(instructions);
        }
        if request.language.is_some() {
            warnings.push(Warning::unsupported_setting("language", None));
        }
        self.options(&request).apply(&mut body, &mut warnings);

        let resp = self.transport.post_json(&self.endpoints.speech, &body).await?;
        let (content_type, bytes) = self.transport.read_bytes(resp).await?;
        let media_type = content_type
            .filter(|c| c.starts_with("audio/"))
            .unwrap_or_else(|| speech_media_type(&format).to_string());
        Ok(SpeechResponse {
            audio: GeneratedFile::from_bytes(media_type, &bytes),
            warnings,
            response: ResponseEnvelope::new(format!("{}/{}", self.id(), request.model), None),
        })
    }

    async fn transcribe(&self, request: TranscriptionRequest) -> Result<TranscriptionResponse> {
        let audio = base64::engine::general_purpose::STANDARD
            .decode(request.audio.as_bytes())
            .map_err(|e| {
                Error::validation_with_context(
                    "audio is not valid base64",
                    ErrorContext::new()
                        .with_field_path("audio")
                        .with_details(e.to_string()),
                )
            })?;
        let extension = request.media_type.rsplit('/').next().unwrap_or("wav").to_string();
        let file = reqwest::multipart::Part::bytes(audio)
            .file_name(format!("audio.{extension}"))
            .mime_str(&request.media_type)
            .map_err(|e| {
                Error::validation_with_context(
                    "unsupported media type",
                    ErrorContext::new()
                        .with_field_path("mediaType")
                        .with_details(e.to_string()),
                )
            })?;
        let mut form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("model", request.model.clone())
            .text("response_format", "verbose_json");
        if let Some(language) = &request.language {
            form = form.text("language", language.clone());
        }
        if let Some(prompt) = &request.prompt {
            form = form.text("prompt", prompt.clone());
        }
        if let Some(t) = request.temperature {
            form = form.text("temperature", t.to_string());
        }

        let resp = self
            .transport
            .post_multipart(&self.endpoints.transcriptions, form)
            .await?;
        let raw: Value = self.transport.read_json(resp).await?;
        let wire: WireTranscription = serde_json::from_value(raw.clone())
            .map_err(|e| Error::malformed_body(self.id(), 200, e.to_string()))?;
        Ok(TranscriptionResponse {
            text: wire.text,
            segments: wire.segments,
            language: wire.language,
            duration_in_seconds: wire.duration,
            warnings: Vec::new(),
            response: self.envelope(&request.model, raw),
        })
    }

    async fn rerank(&self, request: RerankRequest) -> Result<RerankResponse> {
        let mut warnings = Vec::new();
        let mut body = json!({
            "model": request.model,
            "query": request.query,
            "documents": request.documents,
            "return_documents": false,
        });
        if let Some(top_n) = request.top_n {
            body["top_n"] = json!(top_n);
        }
        self.options(&request).apply(&mut body, &mut warnings);

        let resp = self.transport.post_json(&self.endpoints.rerank, &body).await?;
        let raw: Value = self.transport.read_json(resp).await?;
        let wire: WireRerank = serde_json::from_value(raw.clone())
            .map_err(|e| Error::malformed_body(self.id(), 200, e.to_string()))?;

        let mut ranking: Vec<RankedDocument> = wire
            .results
            .into_iter()
            .map(|r| RankedDocument {
                index: r.index,
                relevance_score: r.relevance_score,
                document: request.documents.get(r.index).cloned(),
            })
            .collect();
        ranking.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        Ok(RerankResponse {
            ranking,
            warnings,
            response: self.envelope(&request.model, raw),
        })
    }

    async fn realtime_session(&self, request: RealtimeRequest) -> Result<RealtimeSession> {
        let mut warnings = Vec::new();
        let mut body = json!({ "model": request.model });
        if let Some(voice) = &request.voice {
            body["voice"] = json!(voice);
        }
        if let Some(instructions) = &request.instructions {
            body["instructions"] = json!(instructions);
        }
        self.options(&request).apply(&mut body, &mut warnings);

        let resp = self
            .transport
            .post_json(&self.endpoints.realtime_sessions, &body)
            .await?;
        let raw: Value = self.transport.read_json(resp).await?;
        let wire: WireRealtimeSession = serde_json::from_value(raw.clone())
            .map_err(|e| Error::malformed_body(self.id(), 200, e.to_string()))?;
        Ok(RealtimeSession {
            client_secret: wire.client_secret.value,
            expires_at: wire
                .client_secret
                .expires_at
                .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0)),
            warnings,
            // The secret is in the body; keep it out of the debug envelope.
            response: ResponseEnvelope::new(format!("{}/{}", self.id(), request.model), None),
        })
    }

    async fn create_response(&self, request: ResponseRequest) -> Result<ResponseObject> {
        let (body, warnings) = response_body(self, &request, false);
        let resp = self.transport.post_json(&self.endpoints.responses, &body).await?;
        let raw: Value = self.transport.read_json(resp).await?;
        let wire: WireResponse = serde_json::from_value(raw.clone())
            .map_err(|e| Error::malformed_body(self.id(), 200, e.to_string()))?;
        let output_text = wire
            .output_text
            .unwrap_or_else(|| response_output_text(&wire.output));
        Ok(ResponseObject {
            id: wire.id,
            status: wire.status.unwrap_or_else(|| "completed".into()),
            output_text,
            usage: wire.usage.map(Usage::from).unwrap_or_default(),
            error: wire.error,
            warnings,
            response: self.envelope(&request.model, raw),
        })
    }

    async fn response_stream(&self, request: ResponseRequest) -> Result<ResponseEventStream> {
        let (body, warnings) = response_body(self, &request, true);
        if !warnings.is_empty() {
            warn!(provider = self.id(), ?warnings, "dropping unsupported settings");
        }
        let resp = self.transport.post_stream(&self.endpoints.responses, &body).await?;
        let resp = self.transport.check_status(resp).await?;
        let frames = SseDecoder::default().decode(HttpTransport::byte_stream(resp));
        Ok(decode_response_events(frames))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        if !self.transport.has_api_key() {
            debug!(provider = self.id(), "no API key configured; skipping model listing");
            return Ok(Vec::new());
        }
        let resp = self.transport.get(&self.endpoints.models).await?;
        let wire: WireModels = self.transport.read_json(resp).await?;
        Ok(wire
            .data
            .into_iter()
            .map(|m| ModelInfo {
                owned_by: m.owned_by,
                ..ModelInfo::new(self.id(), m.id)
            })
            .collect())
    }
}

fn response_body(
    provider: &OpenAiCompatibleProvider,
    request: &ResponseRequest,
    stream: bool,
) -> (Value, Vec<Warning>) {
    let mut warnings = Vec::new();
    let mut body = json!({
        "model": request.model,
        "input": messages_to_openai(&request.input),
    });
    if stream {
        body["stream"] = json!(true);
    }
    if let Some(instructions) = &request.instructions {
        body["instructions"] = json!(instructions);
    }
    if let Some(t) = request.temperature {
        body["temperature"] = json!(t);
    }
    if let Some(max) = request.max_output_tokens {
        body["max_output_tokens"] = json!(max);
    }
    if let Some(prev) = &request.previous_response_id {
        body["previous_response_id"] = json!(prev);
    }
    if let Some(tools) = &request.tools {
        // The Responses API flattens function tools.
        let tools: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": t.tool_type,
                    "name": t.function.name,
                    "description": t.function.description,
                    "parameters": t.function.parameters,
                })
            })
            .collect();
        body["tools"] = Value::Array(tools);
    }
    provider.options(request).apply(&mut body, &mut warnings);
    (body, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tool::ToolDefinition;

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new("openai", "http://localhost:1/v1", Some("sk-test".into()))
            .unwrap()
    }

    #[test]
    fn chat_body_maps_fields_and_options() {
        let mut req = ChatRequest::new("gpt-test", vec![Message::system("s"), Message::user("hi")])
            .temperature(0.2)
            .max_tokens(64)
            .tools(vec![ToolDefinition::function("lookup", None, None)])
            .provider_option("openai", json!({"user": "u-1", "reasoningEffort": "low", "logprobs": true}))
            .provider_option("anthropic", json!({"thinking": true}));
        req.top_k = Some(5);

        let (body, warnings) = provider().build_chat_body(&req, true);
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["tools"][0]["function"]["name"], "lookup");
        assert_eq!(body["user"], "u-1");
        assert_eq!(body["reasoning_effort"], "low");
        assert_eq!(body["logprobs"], true);
        assert!(body.get("thinking").is_none());
        assert!(body.get("top_k").is_none());
        assert_eq!(warnings, vec![Warning::unsupported_setting("topK", None)]);
    }

    #[test]
    fn provider_options_never_replace_request_fields() {
        let req = ChatRequest::new("gpt-test", vec![Message::user("hi")]).provider_option(
            "openai",
            json!({"stream": false, "model": "other", "stream_options": null, "store": true}),
        );

        let (body, warnings) = provider().build_chat_body(&req, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["store"], true);
        assert_eq!(warnings.len(), 3);
        assert!(warnings.contains(&Warning::unsupported_setting(
            "providerOptions.stream",
            Some("overlaps a request field")
        )));
    }

    #[test]
    fn non_streaming_body_accepts_stream_free_options() {
        let req = ChatRequest::new("gpt-test", vec![Message::user("hi")])
            .provider_option("openai", json!({"user": "u-2"}));
        let (body, warnings) = provider().build_chat_body(&req, false);
        assert!(body.get("stream").is_none());
        assert_eq!(body["user"], "u-2");
        assert!(warnings.is_empty());
    }

    #[test]
    fn image_blocks_become_data_urls() {
        let msg = Message::with_content(
            MessageRole::User,
            MessageContent::blocks(vec![
                ContentBlock::text("what is this"),
                ContentBlock::image_base64("AAAA".into(), Some("image/jpeg".into())),
            ]),
        );
        let out = messages_to_openai(&[msg]);
        assert_eq!(out[0]["content"][1]["type"], "image_url");
        assert_eq!(out[0]["content"][1]["image_url"]["url"], "data:image/jpeg;base64,AAAA");
    }

    #[test]
    fn response_output_text_collects_message_parts() {
        let output = vec![
            json!({"type": "reasoning", "summary": []}),
            json!({"type": "message", "content": [
                {"type": "output_text", "text": "Hel"},
                {"type": "output_text", "text": "lo"}
            ]}),
        ];
        assert_eq!(response_output_text(&output), "Hello");
    }

    #[test]
    fn endpoints_deserialize_partially() {
        let e: OpenAiEndpoints = serde_json::from_value(json!({"chat": "/v2/chat"})).unwrap();
        assert_eq!(e.chat, "/v2/chat");
        assert_eq!(e.models, "/models");
    }
}
