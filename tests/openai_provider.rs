//! OpenAI-compatible backend against a mock HTTP server.

mod common;

use ai_gateway_rust::drivers::{OpenAiCompatibleProvider, OpenAiEndpoints, ProviderDriver};
use ai_gateway_rust::types::{
    ChatRequest, FinishReason, Message, OutputPart, RealtimeRequest, RerankRequest,
    ResponseRequest, SpeechRequest, Usage,
};
use ai_gateway_rust::{CancelHandle, Error, ErrorKind, RouterBuilder};
use common::*;
use futures::StreamExt;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;

async fn provider(server: &ServerGuard) -> OpenAiCompatibleProvider {
    OpenAiCompatibleProvider::new("mock", &server.url(), Some("sk-test".into())).unwrap()
}

#[tokio::test]
async fn chat_stream_end_to_end() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "stream": true,
            "stream_options": { "include_usage": true }
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse(TRAILING_USAGE))
        .create_async()
        .await;

    let router = RouterBuilder::new()
        .with_provider(Arc::new(provider(&server).await))
        .build();
    let request = ChatRequest::new("mock/gpt-4o", vec![Message::user("hi")]);
    let parts: Vec<OutputPart> = router
        .chat_stream(request, &CancelHandle::new())
        .await
        .unwrap()
        .collect()
        .await;

    mock.assert_async().await;
    assert_well_formed(&parts);
    assert_eq!(
        parts.last(),
        Some(&OutputPart::finish(FinishReason::Stop, Usage::new(3, 2), None))
    );
}

#[tokio::test]
async fn chat_stream_http_error_becomes_error_part() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_body(r#"{"error":{"message":"slow down"}}"#)
        .create_async()
        .await;

    let p = provider(&server).await;
    let parts: Vec<OutputPart> = p
        .chat_stream(ChatRequest::new("gpt-4o", vec![Message::user("hi")]))
        .await
        .unwrap()
        .collect()
        .await;
    match parts.as_slice() {
        [OutputPart::Error { kind, error_text }] => {
            assert_eq!(*kind, ErrorKind::UpstreamFailure);
            assert!(error_text.contains("429"));
        }
        other => panic!("expected a single error part, got {other:?}"),
    }
}

#[tokio::test]
async fn complete_chat_parses_tool_calls() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "choices": [{
                    "message": {
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": { "name": "get_weather", "arguments": "{\"city\":\"Oslo\"}" }
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let resp = provider(&server)
        .await
        .complete_chat(ChatRequest::new("gpt-4o", vec![Message::user("weather?")]))
        .await
        .unwrap();
    assert_eq!(resp.finish_reason, FinishReason::ToolCalls);
    assert_eq!(resp.tool_calls.len(), 1);
    assert_eq!(resp.tool_calls[0].name, "get_weather");
    assert_eq!(resp.tool_calls[0].arguments, json!({ "city": "Oslo" }));
    assert_eq!(resp.usage, Usage::new(10, 5));
    assert_eq!(resp.response.model_id, "mock/gpt-4o");
}

#[tokio::test]
async fn custom_endpoints_are_used() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/v2/rank")
        .match_body(Matcher::PartialJson(json!({ "query": "fruit", "top_n": 2 })))
        .with_status(200)
        .with_body(
            json!({ "results": [
                { "index": 0, "relevance_score": 0.1 },
                { "index": 2, "relevance_score": 0.9 }
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let endpoints: OpenAiEndpoints = serde_json::from_value(json!({ "rerank": "/v2/rank" })).unwrap();
    let p = provider(&server).await.with_endpoints(endpoints);
    let mut request = RerankRequest::new(
        "rerank-1",
        "fruit",
        vec!["apple".into(), "car".into(), "banana".into()],
    );
    request.top_n = Some(2);
    let resp = p.rerank(request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(resp.ranking[0].index, 2);
    assert_eq!(resp.ranking[0].document.as_deref(), Some("banana"));
    assert_eq!(resp.ranking[1].document.as_deref(), Some("apple"));
}

#[tokio::test]
async fn speech_returns_base64_audio() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/audio/speech")
        .with_status(200)
        .with_header("content-type", "audio/mpeg")
        .with_body(b"ID3audio".as_slice())
        .create_async()
        .await;

    let mut request = SpeechRequest::new("tts-1", "hello");
    request.language = Some("en".into());
    let resp = provider(&server).await.synthesize_speech(request).await.unwrap();
    assert_eq!(resp.audio.media_type, "audio/mpeg");
    assert_eq!(resp.audio.base64, "SUQzYXVkaW8=");
    assert_eq!(resp.warnings.len(), 1);
}

#[tokio::test]
async fn realtime_session_exposes_client_secret() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/realtime/sessions")
        .with_status(200)
        .with_body(
            json!({ "id": "sess_1", "client_secret": { "value": "ek_123", "expires_at": 1700000000 } })
                .to_string(),
        )
        .create_async()
        .await;

    let session = provider(&server)
        .await
        .realtime_session(RealtimeRequest::new("gpt-4o-realtime"))
        .await
        .unwrap();
    assert_eq!(session.client_secret, "ek_123");
    assert_eq!(session.expires_at.map(|t| t.timestamp()), Some(1_700_000_000));
    assert!(session.response.body.is_none());
}

#[tokio::test]
async fn response_stream_through_router() {
    let body = concat!(
        "event: response.output_text.delta\n",
        "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"msg_1\",\"delta\":\"Hi\"}\n\n",
        "event: response.completed\n",
        "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"r\",\"status\":\"completed\"}}\n\n",
    );
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/responses")
        .match_body(Matcher::PartialJson(json!({ "model": "gpt-4o", "stream": true })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .create_async()
        .await;

    let router = RouterBuilder::new()
        .with_provider(Arc::new(provider(&server).await))
        .build();
    let parts: Vec<OutputPart> = router
        .response_stream(
            ResponseRequest::new("mock/gpt-4o", vec![Message::user("hi")]),
            &CancelHandle::new(),
        )
        .await
        .unwrap()
        .collect()
        .await;
    assert_well_formed(&parts);
    assert_eq!(parts[1], OutputPart::text_delta("msg_1", "Hi"));
}

#[tokio::test]
async fn list_models_maps_owner() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/models")
        .with_status(200)
        .with_body(
            json!({ "data": [
                { "id": "gpt-4o", "owned_by": "openai" },
                { "id": "whisper-1" }
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let models = provider(&server).await.list_models().await.unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id, "mock/gpt-4o");
    assert_eq!(models[0].owned_by.as_deref(), Some("openai"));
}

#[tokio::test]
async fn malformed_json_body_is_upstream_failure() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/images/generations")
        .with_status(200)
        .with_body("<html>gateway error</html>")
        .create_async()
        .await;

    let err = provider(&server)
        .await
        .generate_image(ai_gateway_rust::types::ImageRequest::new("dall-e-3", "cat"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UpstreamFailure);
    assert!(!matches!(err, Error::Unsupported { .. }));
}
