//! SSE framing (Bytes -> SseFrame)
//!
//! Decodes the *format* only; what a frame's payload means is up to the translators.

use crate::{BoxStream, Result};
use bytes::Bytes;
use futures::{stream, StreamExt};

/// One server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field, if the vendor sends one.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
}

/// Incremental SSE decoder:
/// - frames are separated by a blank line (`\n\n`, CRLF tolerated)
/// - `data:` lines are concatenated, `event:` is kept, comments (`:`) and `id:`/`retry:` are dropped
/// - a bare line without a field name is kept as data so that garbage reaches the translator
///   (and becomes a protocol error) instead of vanishing
/// - the stream ends on the `done_signal` (default `[DONE]`)
#[derive(Debug, Clone)]
pub struct SseDecoder {
    done_signal: String,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new(None)
    }
}

impl SseDecoder {
    pub fn new(done_signal: Option<String>) -> Self {
        Self {
            done_signal: done_signal.unwrap_or_else(|| "[DONE]".to_string()),
        }
    }

    /// Parse one raw frame. `None` for frames carrying no data (comments, keep-alives).
    pub fn parse_frame(raw: &str) -> Option<SseFrame> {
        let mut event = None;
        let mut data: Vec<&str> = Vec::new();
        for line in raw.lines() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(rest) = line.strip_prefix("data:") {
                data.push(rest.strip_prefix(' ').unwrap_or(rest));
            } else if let Some(rest) = line.strip_prefix("event:") {
                event = Some(rest.trim().to_string());
            } else if line.starts_with("id:") || line.starts_with("retry:") {
                continue;
            } else {
                data.push(line.trim());
            }
        }
        if data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event,
            data: data.join("\n"),
        })
    }

    /// Lazily decode a byte stream into frames, one frame per pull.
    pub fn decode(&self, input: BoxStream<'static, Bytes>) -> BoxStream<'static, SseFrame> {
        let done_signal = self.done_signal.clone();

        // Incrementally buffer bytes and emit full frames split by a blank line.
        // Bytes (not chars) are buffered so multi-byte UTF-8 split across chunks survives.
        let stream = stream::unfold(
            (input, Vec::<u8>::new(), false),
            move |(mut input, mut buf, done)| {
                let done_signal = done_signal.clone();
                async move {
                    if done {
                        return None;
                    }
                    loop {
                        if let Some(idx) = find_delimiter(&buf) {
                            let raw = String::from_utf8_lossy(&buf[..idx]).into_owned();
                            buf.drain(..idx + 2);
                            match Self::parse_frame(&raw) {
                                Some(frame) if frame.data.trim() == done_signal => return None,
                                Some(frame) => return Some((Ok(frame), (input, buf, false))),
                                None => continue,
                            }
                        }

                        // Need more data.
                        match input.next().await {
                            Some(Ok(bytes)) => {
                                buf.extend(bytes.iter().copied().filter(|b| *b != b'\r'));
                                continue;
                            }
                            Some(Err(e)) => return Some((Err(e), (input, buf, true))),
                            None => {
                                // EOF: whatever is left is the last frame.
                                let raw = String::from_utf8_lossy(&buf).into_owned();
                                return match Self::parse_frame(&raw) {
                                    Some(frame) if frame.data.trim() != done_signal => {
                                        Some((Ok(frame), (input, Vec::new(), true)))
                                    }
                                    _ => None,
                                };
                            }
                        }
                    }
                }
            },
        );

        Box::pin(stream)
    }
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

/// Convenience for fixtures and tests: a byte stream over static chunks.
pub fn bytes_stream<I, S>(chunks: I) -> BoxStream<'static, Bytes>
where
    I: IntoIterator<Item = S>,
    I::IntoIter: Send + 'static,
    S: Into<Bytes>,
{
    let chunks: Vec<Result<Bytes>> = chunks.into_iter().map(|c| Ok(c.into())).collect();
    Box::pin(stream::iter(chunks))
}
