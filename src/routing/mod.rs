//! Model routing.
//!
//! Callers address models as `"<provider>/<vendor-model>"` (e.g. `"openai/gpt-4o"`). The
//! [`Router`] splits the identifier at the first `/`, looks the provider slug up in the
//! [`ProviderRegistry`] (case-insensitive), rewrites the request's `model` to the vendor
//! part and dispatches to the matching [`ProviderDriver`] capability.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`registry`] | Slug → driver map, swapped wholesale |
//! | [`catalog`] | Aggregate, cached model listing |
//! | [`builder`] | [`RouterBuilder`], including construction from [`GatewayConfig`](crate::config::GatewayConfig) |

pub mod builder;
pub mod catalog;
pub mod registry;

pub use builder::RouterBuilder;
pub use catalog::ModelCatalog;
pub use registry::ProviderRegistry;

use crate::drivers::{Capability, ProviderDriver};
use crate::pipeline::{
    cancellable, error_stream, stream_job, translate_response_events, CancelHandle, ChunkStream,
    JobBackend, PartStream, ResponseEventStream,
};
use crate::poller::PollConfig;
use crate::types::events::{FinishReason, OutputPart, Usage};
use crate::types::request::{
    ChatRequest, ImageRequest, ModelRequest, RealtimeRequest, RerankRequest, ResponseRequest,
    SamplingRequest, SpeechRequest, TranscriptionRequest,
};
use crate::types::response::{
    ChatResponse, ImageResponse, ModelInfo, RealtimeSession, RerankResponse, ResponseObject,
    SamplingResponse, SpeechResponse, TranscriptionResponse,
};
use crate::{Error, ErrorContext, Result};
use futures::{stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// A parsed `"<provider>/<vendor-model>"` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelId {
    /// Lowercase provider slug.
    pub provider: String,
    /// Everything after the first `/`, verbatim (may itself contain `/`).
    pub model: String,
}

impl ModelId {
    pub fn parse(id: &str) -> Result<Self> {
        let invalid = |details: &str| {
            Error::validation_with_context(
                format!("invalid model id '{id}'"),
                ErrorContext::new()
                    .with_field_path("model")
                    .with_details(details.to_string())
                    .with_source("router"),
            )
        };
        let (provider, model) = id
            .trim()
            .split_once('/')
            .ok_or_else(|| invalid("expected '<provider>/<model>'"))?;
        if provider.is_empty() {
            return Err(invalid("provider part is empty"));
        }
        if model.is_empty() {
            return Err(invalid("model part is empty"));
        }
        Ok(Self {
            provider: provider.to_ascii_lowercase(),
            model: model.to_string(),
        })
    }
}

impl std::str::FromStr for ModelId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Resolves model identifiers to backends and dispatches capability calls.
#[derive(Debug)]
pub struct Router {
    registry: Arc<ProviderRegistry>,
    catalog: ModelCatalog,
    poll_config: PollConfig,
}

impl Router {
    pub(crate) fn new(registry: Arc<ProviderRegistry>, catalog: ModelCatalog, poll_config: PollConfig) -> Self {
        Self {
            registry,
            catalog,
            poll_config,
        }
    }

    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll_config
    }

    /// Backend and parsed identifier for `model`.
    pub fn resolve(&self, model: &str) -> Result<(Arc<dyn ProviderDriver>, ModelId)> {
        let id = ModelId::parse(model)?;
        let provider = self
            .registry
            .get(&id.provider)
            .ok_or_else(|| Error::ProviderNotFound {
                slug: id.provider.clone(),
                registered: self.registry.ids(),
            })?;
        Ok((provider, id))
    }

    /// Resolve and strip the provider prefix from the request.
    fn prepare<R: ModelRequest>(&self, mut request: R, capability: Capability) -> Result<(Arc<dyn ProviderDriver>, R, ModelId)> {
        let (provider, id) = self.resolve(request.model())?;
        debug!(provider = %id.provider, model = %id.model, %capability, "routing request");
        request.set_model(id.model.clone());
        Ok((provider, request, id))
    }

    /// Streaming chat. If the backend has no chat but can generate images, the last user
    /// message is used as the image prompt and the images come back as `file` parts.
    ///
    /// Cancelling `cancel` ends the returned stream without a terminal part.
    pub async fn chat_stream(&self, request: ChatRequest, cancel: &CancelHandle) -> Result<PartStream> {
        let (provider, request, id) = self.prepare(request, Capability::ChatStream)?;
        let Some(result) = until_cancelled(cancel, provider.chat_stream(request.clone())).await else {
            return Ok(empty());
        };
        match result {
            Ok(parts) => Ok(cancellable(parts, cancel.token().clone())),
            Err(e) if e.is_unsupported() => {
                self.chat_via_image(provider, request, id, cancel, e).await
            }
            Err(e) => Err(e),
        }
    }

    async fn chat_via_image(
        &self,
        provider: Arc<dyn ProviderDriver>,
        request: ChatRequest,
        id: ModelId,
        cancel: &CancelHandle,
        chat_error: Error,
    ) -> Result<PartStream> {
        let Some(prompt) = request.last_user_text() else {
            return Err(chat_error);
        };
        let image_request = ImageRequest {
            provider_options: request.provider_options.clone(),
            ..ImageRequest::new(request.model.clone(), prompt)
        };
        let Some(result) = until_cancelled(cancel, provider.generate_image(image_request)).await else {
            return Ok(empty());
        };
        match result {
            Ok(resp) => {
                info!(provider = %id.provider, model = %id.model, images = resp.images.len(), "served chat request with image generation");
                let mut parts: Vec<OutputPart> = resp
                    .images
                    .into_iter()
                    .map(|img| OutputPart::File {
                        media_type: img.media_type,
                        data: img.base64,
                    })
                    .collect();
                parts.push(OutputPart::finish(FinishReason::Stop, Usage::default(), None));
                Ok(cancellable(Box::pin(stream::iter(parts)), cancel.token().clone()))
            }
            Err(e) if e.is_unsupported() => Err(chat_error),
            Err(e) => Ok(error_stream(&e)),
        }
    }

    pub async fn complete_chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let (provider, request, _) = self.prepare(request, Capability::ChatComplete)?;
        provider.complete_chat(request).await
    }

    pub async fn complete_chat_stream(&self, request: ChatRequest, cancel: &CancelHandle) -> Result<ChunkStream> {
        let (provider, request, _) = self.prepare(request, Capability::ChatCompleteStream)?;
        let Some(result) = until_cancelled(cancel, provider.complete_chat_stream(request)).await else {
            return Ok(Box::pin(stream::empty()));
        };
        let token = cancel.token().clone();
        Ok(Box::pin(result?.take_until(async move { token.cancelled().await })))
    }

    pub async fn generate_image(&self, request: ImageRequest) -> Result<ImageResponse> {
        let (provider, request, _) = self.prepare(request, Capability::Image)?;
        provider.generate_image(request).await
    }

    pub async fn synthesize_speech(&self, request: SpeechRequest) -> Result<SpeechResponse> {
        let (provider, request, _) = self.prepare(request, Capability::Speech)?;
        provider.synthesize_speech(request).await
    }

    pub async fn transcribe(&self, request: TranscriptionRequest) -> Result<TranscriptionResponse> {
        let (provider, request, _) = self.prepare(request, Capability::Transcription)?;
        provider.transcribe(request).await
    }

    pub async fn rerank(&self, request: RerankRequest) -> Result<RerankResponse> {
        let (provider, request, _) = self.prepare(request, Capability::Rerank)?;
        provider.rerank(request).await
    }

    pub async fn realtime_session(&self, request: RealtimeRequest) -> Result<RealtimeSession> {
        let (provider, request, _) = self.prepare(request, Capability::RealtimeToken)?;
        provider.realtime_session(request).await
    }

    pub async fn sample(&self, request: SamplingRequest) -> Result<SamplingResponse> {
        let (provider, request, id) = self.prepare(request, Capability::Sampling)?;
        let mut resp = provider.sample(request).await?;
        resp.model = id.to_string();
        Ok(resp)
    }

    pub async fn create_response(&self, request: ResponseRequest) -> Result<ResponseObject> {
        let (provider, request, _) = self.prepare(request, Capability::Response)?;
        provider.create_response(request).await
    }

    /// Typed Response-API events, as the backend sends them.
    pub async fn response_events(&self, request: ResponseRequest, cancel: &CancelHandle) -> Result<ResponseEventStream> {
        let (provider, request, _) = self.prepare(request, Capability::ResponseStream)?;
        let Some(result) = until_cancelled(cancel, provider.response_stream(request)).await else {
            return Ok(Box::pin(stream::empty()));
        };
        let token = cancel.token().clone();
        Ok(Box::pin(result?.take_until(async move { token.cancelled().await })))
    }

    /// Response-API stream translated into output parts. Unlike chat, a stream that
    /// ends without `response.completed` ends with an `error` part.
    pub async fn response_stream(&self, request: ResponseRequest, cancel: &CancelHandle) -> Result<PartStream> {
        let temperature = request.temperature;
        let events = self.response_events(request, cancel).await?;
        Ok(cancellable(
            translate_response_events(events, temperature),
            cancel.token().clone(),
        ))
    }

    /// Run an asynchronous job backend with this router's polling policy.
    pub fn stream_job<B>(&self, backend: Arc<B>, cancel: &CancelHandle) -> PartStream
    where
        B: JobBackend + ?Sized + 'static,
    {
        stream_job(backend, self.poll_config.clone(), cancel.token().clone())
    }

    /// Aggregate model list across all backends, cached for the configured TTL.
    pub async fn list_models(&self) -> Arc<Vec<ModelInfo>> {
        self.catalog.list(&self.registry.all()).await
    }

    /// Re-aggregate the model list now.
    pub async fn refresh_models(&self) -> Arc<Vec<ModelInfo>> {
        self.catalog.refresh(&self.registry.all()).await
    }

    /// Swap in a new set of backends; the model cache is dropped with the old set.
    pub fn replace_providers<I>(&self, drivers: I)
    where
        I: IntoIterator<Item = Arc<dyn ProviderDriver>>,
    {
        self.registry.replace_all(drivers);
        self.catalog.invalidate();
    }
}

fn empty() -> PartStream {
    Box::pin(stream::empty())
}

/// `None` when the caller cancels before `fut` completes.
async fn until_cancelled<F: Future>(cancel: &CancelHandle, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.token().cancelled() => None,
        out = fut => Some(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_provider_and_model() {
        let id = ModelId::parse("OpenAI/gpt-4o").unwrap();
        assert_eq!(id.provider, "openai");
        assert_eq!(id.model, "gpt-4o");
        assert_eq!(id.to_string(), "openai/gpt-4o");
    }

    #[test]
    fn only_the_first_slash_splits() {
        let id: ModelId = "together/meta-llama/Llama-3-8b".parse().unwrap();
        assert_eq!(id.provider, "together");
        assert_eq!(id.model, "meta-llama/Llama-3-8b");
    }

    #[test]
    fn malformed_ids_are_validation_errors() {
        for bad in ["gpt-4o", "/gpt-4o", "openai/", ""] {
            let err = ModelId::parse(bad).unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Validation, "{bad}");
        }
    }
}
