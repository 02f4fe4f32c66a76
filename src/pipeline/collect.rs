//! Fold an output-part stream back into a single-shot [`ChatResponse`].

use super::PartStream;
use crate::error::ErrorKind;
use crate::types::events::{FinishReason, OutputPart, Usage};
use crate::types::response::{ChatResponse, ResponseEnvelope, Warning};
use crate::{Error, Result};
use futures::StreamExt;

/// Drain `parts`. Text deltas are concatenated in order; `finish` supplies the reason and
/// usage. An `error` or `abort` part, or a stream that ends without a terminal part
/// (the caller cancelled), becomes an `Err`.
pub async fn collect_chat_response(mut parts: PartStream, model_id: &str) -> Result<ChatResponse> {
    let mut text = String::new();
    while let Some(part) = parts.next().await {
        match part {
            OutputPart::TextDelta { delta, .. } => text.push_str(&delta),
            OutputPart::Finish {
                finish_reason,
                usage,
                ..
            } => {
                return Ok(chat_response(model_id, text, finish_reason, usage));
            }
            OutputPart::Error { kind, error_text } => {
                return Err(Error::Streamed {
                    kind,
                    message: error_text,
                })
            }
            OutputPart::Abort { reason } => {
                return Err(Error::Streamed {
                    kind: ErrorKind::Cancelled,
                    message: reason.unwrap_or_else(|| "aborted by provider".to_string()),
                })
            }
            _ => {}
        }
    }
    Err(Error::Cancelled)
}

/// Concatenated text of a part stream, whatever its terminal part.
pub async fn collect_text(mut parts: PartStream) -> String {
    let mut text = String::new();
    while let Some(part) = parts.next().await {
        if let OutputPart::TextDelta { delta, .. } = part {
            text.push_str(&delta);
        }
    }
    text
}

fn chat_response(model_id: &str, text: String, finish_reason: FinishReason, usage: Usage) -> ChatResponse {
    ChatResponse {
        text,
        tool_calls: Vec::new(),
        finish_reason,
        usage,
        warnings: Vec::<Warning>::new(),
        response: ResponseEnvelope::new(model_id, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn parts(v: Vec<OutputPart>) -> PartStream {
        Box::pin(stream::iter(v))
    }

    #[tokio::test]
    async fn concatenates_deltas() {
        let resp = collect_chat_response(
            parts(vec![
                OutputPart::text_start("t"),
                OutputPart::text_delta("t", "Hel"),
                OutputPart::text_delta("t", "lo"),
                OutputPart::text_end("t"),
                OutputPart::finish(FinishReason::Length, Usage::new(1, 2), None),
            ]),
            "m",
        )
        .await
        .unwrap();
        assert_eq!(resp.text, "Hello");
        assert_eq!(resp.finish_reason, FinishReason::Length);
        assert_eq!(resp.usage.total_tokens, Some(3));
        assert_eq!(resp.response.model_id, "m");
    }

    #[tokio::test]
    async fn error_part_keeps_its_kind() {
        let err = collect_chat_response(
            parts(vec![OutputPart::Error {
                kind: ErrorKind::ProtocolViolation,
                error_text: "bad frame".into(),
            }]),
            "m",
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    }

    #[tokio::test]
    async fn truncated_stream_is_cancelled() {
        let err = collect_chat_response(parts(vec![OutputPart::text_start("t")]), "m")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
