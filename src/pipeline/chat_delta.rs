//! Chat-delta SSE translation.
//!
//! Each frame carries an OpenAI-style [`ChatCompletionChunk`]. Text is re-emitted under a
//! single text id per response. A `finish_reason` closes the text but the finish part is
//! held until the frames run out, so a trailing usage-only frame (`"choices": []`) still
//! lands in it. A stream that simply stops without a `finish_reason` ends with a
//! synthesized `stop` finish.

use super::{PartStream, PipelineError, SseFrame};
use crate::types::chunk::ChatCompletionChunk;
use crate::types::events::{FinishReason, OutputPart, Usage};
use crate::{BoxStream, Error};
use futures::{stream, StreamExt};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Per-stream state for chat-delta translation.
#[derive(Debug, Default)]
pub struct ChatDeltaTranslator {
    text_id: Option<String>,
    next_id: u32,
    usage: Usage,
    temperature: Option<f32>,
    /// Reason seen on the wire, emitted by [`Self::on_end`].
    pending_finish: Option<FinishReason>,
    finished: bool,
}

impl ChatDeltaTranslator {
    pub fn new(temperature: Option<f32>) -> Self {
        Self {
            temperature,
            ..Default::default()
        }
    }

    /// Whether a terminal part has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Parse and translate one SSE data payload.
    pub fn on_data(&mut self, data: &str) -> Vec<OutputPart> {
        if self.finished {
            return Vec::new();
        }
        match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => self.on_chunk(chunk),
            Err(e) => {
                warn!(error = %e, "chat-delta frame is not a valid chunk");
                let err: Error = PipelineError::invalid_frame(data, e).into();
                self.on_error(&err)
            }
        }
    }

    pub fn on_chunk(&mut self, chunk: ChatCompletionChunk) -> Vec<OutputPart> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        if let Some(usage) = chunk.usage {
            self.usage = usage.into();
        }
        if self.pending_finish.is_some() {
            return out;
        }

        if let Some(delta) = chunk.content().filter(|d| !d.is_empty()) {
            let id = self.open_text(&mut out);
            out.push(OutputPart::text_delta(id, delta));
        }

        if let Some(reason) = chunk.finish_reason() {
            debug!(finish_reason = reason, "chat-delta stream finished");
            self.close_text(&mut out);
            self.pending_finish = Some(FinishReason::from_vendor(reason));
        }
        out
    }

    /// Called when the frame stream is exhausted.
    pub fn on_end(&mut self) -> Vec<OutputPart> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.close_text(&mut out);
        out.push(OutputPart::finish(
            self.pending_finish.take().unwrap_or(FinishReason::Stop),
            self.usage,
            self.temperature,
        ));
        self.finished = true;
        out
    }

    /// Mid-stream failure: close whatever is open, then one `error` part.
    pub fn on_error(&mut self, err: &Error) -> Vec<OutputPart> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.close_text(&mut out);
        out.push(OutputPart::error(err));
        self.finished = true;
        out
    }

    fn open_text(&mut self, out: &mut Vec<OutputPart>) -> String {
        if let Some(id) = &self.text_id {
            return id.clone();
        }
        let id = format!("text-{}", self.next_id);
        self.next_id += 1;
        out.push(OutputPart::text_start(id.clone()));
        self.text_id = Some(id.clone());
        id
    }

    fn close_text(&mut self, out: &mut Vec<OutputPart>) {
        if let Some(id) = self.text_id.take() {
            out.push(OutputPart::text_end(id));
        }
    }
}

/// Translate a chat-delta frame stream lazily. The returned stream always ends with
/// exactly one `finish` or `error` part.
pub fn translate_chat_deltas(
    frames: BoxStream<'static, SseFrame>,
    temperature: Option<f32>,
) -> PartStream {
    let state = (
        frames,
        ChatDeltaTranslator::new(temperature),
        VecDeque::<OutputPart>::new(),
    );
    let stream = stream::unfold(state, |(mut frames, mut tr, mut pending)| async move {
        loop {
            if let Some(part) = pending.pop_front() {
                return Some((part, (frames, tr, pending)));
            }
            if tr.is_finished() {
                return None;
            }
            match frames.next().await {
                Some(Ok(frame)) => pending.extend(tr.on_data(&frame.data)),
                Some(Err(e)) => pending.extend(tr.on_error(&e)),
                None => pending.extend(tr.on_end()),
            }
        }
    });
    Box::pin(stream)
}
