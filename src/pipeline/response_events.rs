//! Typed Response-API events.
//!
//! Unlike chat deltas, this stream is strict: every frame must decode to a known event,
//! an unknown `type` is a protocol violation, and a stream that ends without
//! `response.completed` (or `response.failed`) is an error rather than a quiet stop.

use super::{PartStream, PipelineError, ResponseEventStream, SseFrame};
use crate::error::ErrorKind;
use crate::types::events::{FinishReason, OutputPart, Usage};
use crate::{BoxStream, Error};
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// Every `type` tag this version understands.
pub const KNOWN_EVENT_TYPES: &[&str] = &[
    "response.created",
    "response.in_progress",
    "response.output_text.delta",
    "response.output_text.done",
    "response.completed",
    "response.failed",
    "error",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseStreamEvent {
    #[serde(rename = "response.created")]
    Created { response: ResponseSnapshot },
    #[serde(rename = "response.in_progress")]
    InProgress { response: ResponseSnapshot },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        item_id: String,
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        delta: String,
    },
    #[serde(rename = "response.output_text.done")]
    OutputTextDone {
        item_id: String,
        #[serde(default)]
        output_index: u32,
        #[serde(default)]
        content_index: u32,
        text: String,
    },
    #[serde(rename = "response.completed")]
    Completed { response: ResponseSnapshot },
    #[serde(rename = "response.failed")]
    Failed { response: ResponseSnapshot },
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        code: Option<String>,
        message: String,
        #[serde(default)]
        param: Option<String>,
    },
}

impl ResponseStreamEvent {
    /// Decode one frame payload. The frame's `event:` name is used when the payload
    /// itself has no `type`.
    pub fn parse(data: &str, event_name: Option<&str>) -> Result<Self, PipelineError> {
        let mut value: serde_json::Value =
            serde_json::from_str(data).map_err(|e| PipelineError::invalid_frame(data, e))?;
        let event_type = match value.get("type").and_then(|t| t.as_str()) {
            Some(t) => t.to_string(),
            None => match (event_name, value.as_object_mut()) {
                (Some(name), Some(obj)) => {
                    obj.insert("type".into(), serde_json::Value::String(name.to_string()));
                    name.to_string()
                }
                _ => return Err(PipelineError::invalid_frame(data, "missing event type")),
            },
        };
        if !KNOWN_EVENT_TYPES.contains(&event_type.as_str()) {
            return Err(PipelineError::UnknownEventType {
                event_type,
                hint: None,
            }
            .with_hint(format!("known event types: {}", KNOWN_EVENT_TYPES.join(", "))));
        }
        serde_json::from_value(value).map_err(|e| PipelineError::InvalidPayload {
            event_type,
            reason: e.to_string(),
        })
    }
}

/// Response object as carried by lifecycle events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<ResponseUsage>,
    #[serde(default)]
    pub error: Option<ResponseSnapshotError>,
    #[serde(default)]
    pub output: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl From<ResponseUsage> for Usage {
    fn from(u: ResponseUsage) -> Self {
        let mut usage = Usage::new(u.input_tokens, u.output_tokens);
        if u.total_tokens != 0 {
            usage.total_tokens = Some(u.total_tokens);
        }
        usage
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshotError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
}

/// Decode frames into typed events. The first bad frame yields one `Err` and ends the stream.
pub fn decode_response_events(frames: BoxStream<'static, SseFrame>) -> ResponseEventStream {
    let stream = stream::unfold((frames, false), |(mut frames, failed)| async move {
        if failed {
            return None;
        }
        match frames.next().await? {
            Ok(frame) => match ResponseStreamEvent::parse(&frame.data, frame.event.as_deref()) {
                Ok(event) => Some((Ok(event), (frames, false))),
                Err(e) => {
                    warn!(error = %e, "rejecting response stream frame");
                    Some((Err(e.into()), (frames, true)))
                }
            },
            Err(e) => Some((Err(e), (frames, true))),
        }
    });
    Box::pin(stream)
}

/// Per-stream state for typed-event translation.
#[derive(Debug, Default)]
pub struct ResponseEventTranslator {
    open: Vec<String>,
    streamed: HashSet<String>,
    closed: HashSet<String>,
    temperature: Option<f32>,
    finished: bool,
}

impl ResponseEventTranslator {
    pub fn new(temperature: Option<f32>) -> Self {
        Self {
            temperature,
            ..Default::default()
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn on_event(&mut self, event: ResponseStreamEvent) -> Vec<OutputPart> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        match event {
            ResponseStreamEvent::Created { response } | ResponseStreamEvent::InProgress { response } => {
                debug!(response_id = %response.id, status = ?response.status, "response lifecycle");
            }
            ResponseStreamEvent::OutputTextDelta { item_id, delta, .. } => {
                if self.closed.contains(&item_id) {
                    return self.reject_closed("response.output_text.delta", &item_id);
                }
                self.open_item(&item_id, &mut out);
                if !delta.is_empty() {
                    out.push(OutputPart::text_delta(item_id, delta));
                }
            }
            ResponseStreamEvent::OutputTextDone { item_id, text, .. } => {
                if self.closed.contains(&item_id) {
                    return self.reject_closed("response.output_text.done", &item_id);
                }
                // A done without any preceding delta still carries the full text.
                if !self.streamed.contains(&item_id) {
                    self.open_item(&item_id, &mut out);
                    if !text.is_empty() {
                        out.push(OutputPart::text_delta(item_id.clone(), text));
                    }
                }
                self.close_item(&item_id, &mut out);
            }
            ResponseStreamEvent::Completed { response } => {
                self.close_all(&mut out);
                let finish_reason = match response.status.as_deref() {
                    Some(status) => FinishReason::from_vendor(status),
                    None => FinishReason::Stop,
                };
                out.push(OutputPart::finish(
                    finish_reason,
                    response.usage.map(Usage::from).unwrap_or_default(),
                    self.temperature,
                ));
                self.finished = true;
            }
            ResponseStreamEvent::Failed { response } => {
                let message = response
                    .error
                    .map(|e| e.message)
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| format!("response {} failed", response.id));
                self.fail(&mut out, ErrorKind::UpstreamFailure, message);
            }
            ResponseStreamEvent::Error { code, message, .. } => {
                let message = match code {
                    Some(code) => format!("{code}: {message}"),
                    None => message,
                };
                self.fail(&mut out, ErrorKind::UpstreamFailure, message);
            }
        }
        out
    }

    /// Called when the event stream is exhausted without a terminal event.
    pub fn on_end(&mut self) -> Vec<OutputPart> {
        if self.finished {
            return Vec::new();
        }
        let err: Error = PipelineError::UnexpectedEnd { hint: None }
            .with_hint("expected 'response.completed' or 'response.failed'")
            .into();
        self.on_error(&err)
    }

    pub fn on_error(&mut self, err: &Error) -> Vec<OutputPart> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.close_all(&mut out);
        out.push(OutputPart::error(err));
        self.finished = true;
        out
    }

    fn reject_closed(&mut self, event_type: &str, item_id: &str) -> Vec<OutputPart> {
        warn!(item_id, event_type, "text event for an item that was already closed");
        let err: Error = PipelineError::InvalidPayload {
            event_type: event_type.to_string(),
            reason: format!("text item '{item_id}' was already closed"),
        }
        .into();
        self.on_error(&err)
    }

    fn fail(&mut self, out: &mut Vec<OutputPart>, kind: ErrorKind, error_text: String) {
        self.close_all(out);
        out.push(OutputPart::Error { kind, error_text });
        self.finished = true;
    }

    fn open_item(&mut self, item_id: &str, out: &mut Vec<OutputPart>) {
        if self.streamed.insert(item_id.to_string()) {
            self.open.push(item_id.to_string());
            out.push(OutputPart::text_start(item_id));
        }
    }

    fn close_item(&mut self, item_id: &str, out: &mut Vec<OutputPart>) {
        if let Some(pos) = self.open.iter().position(|id| id == item_id) {
            self.open.remove(pos);
            self.closed.insert(item_id.to_string());
            out.push(OutputPart::text_end(item_id));
        }
    }

    fn close_all(&mut self, out: &mut Vec<OutputPart>) {
        for id in self.open.drain(..) {
            out.push(OutputPart::text_end(id));
        }
    }
}

/// Translate typed events lazily into output parts.
pub fn translate_response_events(events: ResponseEventStream, temperature: Option<f32>) -> PartStream {
    let state = (
        events,
        ResponseEventTranslator::new(temperature),
        VecDeque::<OutputPart>::new(),
    );
    let stream = stream::unfold(state, |(mut events, mut tr, mut pending)| async move {
        loop {
            if let Some(part) = pending.pop_front() {
                return Some((part, (events, tr, pending)));
            }
            if tr.is_finished() {
                return None;
            }
            match events.next().await {
                Some(Ok(event)) => pending.extend(tr.on_event(event)),
                Some(Err(e)) => pending.extend(tr.on_error(&e)),
                None => pending.extend(tr.on_end()),
            }
        }
    });
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::decode::{bytes_stream, SseDecoder};
    use crate::pipeline::test_support::assert_well_formed;

    async fn run(sse: &'static str) -> Vec<OutputPart> {
        let frames = SseDecoder::default().decode(bytes_stream(vec![sse]));
        translate_response_events(decode_response_events(frames), None)
            .collect()
            .await
    }

    #[tokio::test]
    async fn deltas_then_completed() {
        let parts = run(concat!(
            "event: response.created\ndata: {\"type\":\"response.created\",\"response\":{\"id\":\"r1\",\"status\":\"in_progress\"}}\n\n",
            "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"msg_1\",\"output_index\":0,\"content_index\":0,\"delta\":\"Hel\"}\n\n",
            "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"msg_1\",\"output_index\":0,\"content_index\":0,\"delta\":\"lo\"}\n\n",
            "data: {\"type\":\"response.output_text.done\",\"item_id\":\"msg_1\",\"output_index\":0,\"content_index\":0,\"text\":\"Hello\"}\n\n",
            "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"r1\",\"status\":\"completed\",\"usage\":{\"input_tokens\":3,\"output_tokens\":2,\"total_tokens\":5}}}\n\n",
        ))
        .await;
        assert_well_formed(&parts);
        assert_eq!(
            parts,
            vec![
                OutputPart::text_start("msg_1"),
                OutputPart::text_delta("msg_1", "Hel"),
                OutputPart::text_delta("msg_1", "lo"),
                OutputPart::text_end("msg_1"),
                OutputPart::finish(FinishReason::Stop, Usage::new(3, 2), None),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_event_type_is_a_protocol_violation() {
        let parts = run(concat!(
            "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"a\",\"delta\":\"x\"}\n\n",
            "data: {\"type\":\"response.reasoning.delta\",\"delta\":\"hmm\"}\n\n",
            "data: {\"type\":\"response.completed\",\"response\":{\"id\":\"r\"}}\n\n",
        ))
        .await;
        assert_well_formed(&parts);
        match parts.last() {
            Some(OutputPart::Error { kind, error_text }) => {
                assert_eq!(*kind, ErrorKind::ProtocolViolation);
                assert!(error_text.contains("response.reasoning.delta"));
            }
            other => panic!("expected error part, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn stream_without_completed_is_an_error() {
        let parts = run(
            "data: {\"type\":\"response.output_text.delta\",\"item_id\":\"a\",\"delta\":\"x\"}\n\n",
        )
        .await;
        assert_well_formed(&parts);
        assert!(matches!(
            parts.last(),
            Some(OutputPart::Error {
                kind: ErrorKind::ProtocolViolation,
                ..
            })
        ));
    }

    #[test]
    fn done_without_deltas_emits_full_text() {
        let mut tr = ResponseEventTranslator::new(None);
        let out = tr.on_event(ResponseStreamEvent::OutputTextDone {
            item_id: "m".into(),
            output_index: 0,
            content_index: 0,
            text: "whole".into(),
        });
        assert_eq!(
            out,
            vec![
                OutputPart::text_start("m"),
                OutputPart::text_delta("m", "whole"),
                OutputPart::text_end("m"),
            ]
        );
    }

    #[test]
    fn failed_event_closes_open_items() {
        let mut tr = ResponseEventTranslator::new(None);
        tr.on_event(ResponseStreamEvent::OutputTextDelta {
            item_id: "m".into(),
            output_index: 0,
            content_index: 0,
            delta: "x".into(),
        });
        let out = tr.on_event(ResponseStreamEvent::Failed {
            response: ResponseSnapshot {
                id: "r".into(),
                error: Some(ResponseSnapshotError {
                    code: Some("server_error".into()),
                    message: "boom".into(),
                }),
                ..Default::default()
            },
        });
        assert_eq!(out[0], OutputPart::text_end("m"));
        assert_eq!(
            out[1],
            OutputPart::Error {
                kind: ErrorKind::UpstreamFailure,
                error_text: "boom".into()
            }
        );
    }

    fn delta(item_id: &str, text: &str) -> ResponseStreamEvent {
        ResponseStreamEvent::OutputTextDelta {
            item_id: item_id.into(),
            output_index: 0,
            content_index: 0,
            delta: text.into(),
        }
    }

    #[test]
    fn delta_after_done_is_rejected() {
        let mut tr = ResponseEventTranslator::new(None);
        let mut parts = tr.on_event(delta("m", "a"));
        parts.extend(tr.on_event(ResponseStreamEvent::OutputTextDone {
            item_id: "m".into(),
            output_index: 0,
            content_index: 0,
            text: "a".into(),
        }));
        parts.extend(tr.on_event(delta("m", "b")));
        parts.extend(tr.on_event(ResponseStreamEvent::Completed {
            response: ResponseSnapshot::default(),
        }));

        assert_well_formed(&parts);
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[2], OutputPart::text_end("m"));
        match &parts[3] {
            OutputPart::Error { kind, error_text } => {
                assert_eq!(*kind, ErrorKind::ProtocolViolation);
                assert!(error_text.contains("already closed"));
            }
            other => panic!("expected error part, got {other:?}"),
        }
        assert!(tr.is_finished());
    }

    #[test]
    fn second_done_for_closed_item_is_rejected() {
        let mut tr = ResponseEventTranslator::new(None);
        let done = ResponseStreamEvent::OutputTextDone {
            item_id: "m".into(),
            output_index: 0,
            content_index: 0,
            text: "x".into(),
        };
        assert_eq!(tr.on_event(done.clone()).len(), 3);
        let out = tr.on_event(done);
        assert!(matches!(
            out.as_slice(),
            [OutputPart::Error { kind: ErrorKind::ProtocolViolation, .. }]
        ));
    }

    #[test]
    fn distinct_items_open_and_close_independently() {
        let mut tr = ResponseEventTranslator::new(None);
        let mut parts = tr.on_event(delta("a", "1"));
        parts.extend(tr.on_event(delta("b", "2")));
        parts.extend(tr.on_event(ResponseStreamEvent::Completed {
            response: ResponseSnapshot::default(),
        }));
        assert_well_formed(&parts);
        assert!(matches!(parts.last(), Some(OutputPart::Finish { .. })));
    }

    #[test]
    fn event_name_fills_in_missing_type() {
        let ev = ResponseStreamEvent::parse(r#"{"message":"nope"}"#, Some("error")).unwrap();
        assert!(matches!(ev, ResponseStreamEvent::Error { .. }));
    }
}
