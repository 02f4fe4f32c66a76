//! Provider driver abstraction layer.
//!
//! One [`ProviderDriver`] per backend. Every capability is an async method with a default
//! body that reports [`Error::Unsupported`], so a backend implements only what its vendor
//! offers and the router can tell "not offered" apart from "failed". Drivers are shared as
//! `Arc<dyn ProviderDriver>` and must not keep per-request state.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::pipeline::{collect_chat_response, ChunkStream, PartStream, ResponseEventStream};
use crate::types::request::{
    ChatRequest, ImageRequest, RealtimeRequest, RerankRequest, ResponseRequest, SamplingRequest,
    SpeechRequest, TranscriptionRequest,
};
use crate::types::response::{
    ChatResponse, ImageResponse, ModelInfo, RealtimeSession, RerankResponse, ResponseObject,
    SamplingResponse, SpeechResponse, TranscriptionResponse,
};
use crate::Result;

pub use openai::{OpenAiCompatibleProvider, OpenAiEndpoints};

/// Everything a backend may be asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    ChatStream,
    ChatComplete,
    ChatCompleteStream,
    Image,
    Speech,
    Transcription,
    Rerank,
    RealtimeToken,
    Sampling,
    Response,
    ResponseStream,
    ListModels,
}

impl Capability {
    pub const ALL: [Capability; 12] = [
        Capability::ChatStream,
        Capability::ChatComplete,
        Capability::ChatCompleteStream,
        Capability::Image,
        Capability::Speech,
        Capability::Transcription,
        Capability::Rerank,
        Capability::RealtimeToken,
        Capability::Sampling,
        Capability::Response,
        Capability::ResponseStream,
        Capability::ListModels,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ChatStream => "chat-stream",
            Capability::ChatComplete => "chat-complete",
            Capability::ChatCompleteStream => "chat-complete-stream",
            Capability::Image => "image",
            Capability::Speech => "speech",
            Capability::Transcription => "transcription",
            Capability::Rerank => "rerank",
            Capability::RealtimeToken => "realtime-token",
            Capability::Sampling => "sampling",
            Capability::Response => "response",
            Capability::ResponseStream => "response-stream",
            Capability::ListModels => "list-models",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The provider contract.
///
/// Requests reach a driver with `model` already reduced to the vendor model name (the
/// `provider/` prefix is stripped by the router).
///
/// Streaming methods return `Ok(stream)` once the call is under way; failures after that
/// point travel inside the stream as a single `error` part. `Err` is reserved for
/// failures before any part could be produced (unsupported capability, bad request).
#[async_trait]
pub trait ProviderDriver: Send + Sync + std::fmt::Debug {
    /// Routing slug, lowercase (e.g. `"openai"`).
    fn provider_id(&self) -> &str;

    async fn chat_stream(&self, _request: ChatRequest) -> Result<PartStream> {
        Err(Error::unsupported(self.provider_id(), Capability::ChatStream))
    }

    /// Single-shot chat. Defaults to draining [`chat_stream`](Self::chat_stream).
    async fn complete_chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let model = request.model.clone();
        match self.chat_stream(request).await {
            Ok(parts) => collect_chat_response(parts, &model).await,
            Err(e) if e.is_unsupported() => {
                Err(Error::unsupported(self.provider_id(), Capability::ChatComplete))
            }
            Err(e) => Err(e),
        }
    }

    /// Raw OpenAI-style delta chunks.
    async fn complete_chat_stream(&self, _request: ChatRequest) -> Result<ChunkStream> {
        Err(Error::unsupported(
            self.provider_id(),
            Capability::ChatCompleteStream,
        ))
    }

    async fn generate_image(&self, _request: ImageRequest) -> Result<ImageResponse> {
        Err(Error::unsupported(self.provider_id(), Capability::Image))
    }

    async fn synthesize_speech(&self, _request: SpeechRequest) -> Result<SpeechResponse> {
        Err(Error::unsupported(self.provider_id(), Capability::Speech))
    }

    async fn transcribe(&self, _request: TranscriptionRequest) -> Result<TranscriptionResponse> {
        Err(Error::unsupported(self.provider_id(), Capability::Transcription))
    }

    async fn rerank(&self, _request: RerankRequest) -> Result<RerankResponse> {
        Err(Error::unsupported(self.provider_id(), Capability::Rerank))
    }

    async fn realtime_session(&self, _request: RealtimeRequest) -> Result<RealtimeSession> {
        Err(Error::unsupported(self.provider_id(), Capability::RealtimeToken))
    }

    /// Tool-protocol sampling. Defaults to a single-shot chat.
    async fn sample(&self, request: SamplingRequest) -> Result<SamplingResponse> {
        let chat = request.to_chat_request();
        match self.complete_chat(chat).await {
            Ok(resp) => Ok(SamplingResponse {
                model: request.model.clone(),
                role: "assistant".to_string(),
                text: resp.text,
                stop_reason: resp.finish_reason,
            }),
            Err(e) if e.is_unsupported() => {
                Err(Error::unsupported(self.provider_id(), Capability::Sampling))
            }
            Err(e) => Err(e),
        }
    }

    async fn create_response(&self, _request: ResponseRequest) -> Result<ResponseObject> {
        Err(Error::unsupported(self.provider_id(), Capability::Response))
    }

    async fn response_stream(&self, _request: ResponseRequest) -> Result<ResponseEventStream> {
        Err(Error::unsupported(self.provider_id(), Capability::ResponseStream))
    }

    /// Models this backend serves, with full `provider/name` identifiers.
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Err(Error::unsupported(self.provider_id(), Capability::ListModels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::events::{FinishReason, OutputPart, Usage};
    use crate::types::message::Message;
    use futures::stream;

    #[derive(Debug)]
    struct ChatOnly;

    #[async_trait]
    impl ProviderDriver for ChatOnly {
        fn provider_id(&self) -> &str {
            "chat-only"
        }

        async fn chat_stream(&self, _request: ChatRequest) -> Result<PartStream> {
            Ok(Box::pin(stream::iter(vec![
                OutputPart::text_start("t"),
                OutputPart::text_delta("t", "pong"),
                OutputPart::text_end("t"),
                OutputPart::finish(FinishReason::Stop, Usage::new(1, 1), None),
            ])))
        }
    }

    #[derive(Debug)]
    struct Nothing;

    #[async_trait]
    impl ProviderDriver for Nothing {
        fn provider_id(&self) -> &str {
            "nothing"
        }
    }

    #[tokio::test]
    async fn defaults_derive_from_chat_stream() {
        let p = ChatOnly;
        let resp = p
            .complete_chat(ChatRequest::new("m", vec![Message::user("ping")]))
            .await
            .unwrap();
        assert_eq!(resp.text, "pong");

        let sampled = p
            .sample(SamplingRequest {
                model: "m".into(),
                messages: vec![Message::user("ping")],
                system_prompt: None,
                max_tokens: None,
                temperature: None,
                stop_sequences: None,
                provider_options: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(sampled.text, "pong");
        assert_eq!(sampled.stop_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn unimplemented_capabilities_are_unsupported() {
        let p = Nothing;
        let err = p.rerank(RerankRequest::new("m", "q", vec![])).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Unsupported {
                capability: Capability::Rerank,
                ..
            }
        ));
        let err = p
            .complete_chat(ChatRequest::new("m", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Unsupported {
                capability: Capability::ChatComplete,
                ..
            }
        ));
    }

    #[test]
    fn capability_names_are_kebab_case() {
        assert_eq!(Capability::RealtimeToken.to_string(), "realtime-token");
        assert_eq!(
            serde_json::to_value(Capability::ChatCompleteStream).unwrap(),
            "chat-complete-stream"
        );
    }
}
