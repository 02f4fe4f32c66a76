//! Caller-side cancellation.
//!
//! Cancelling never produces a part of its own: the stream just stops, and the consumer
//! learns about it through the handle it cancelled.

use super::PartStream;
use futures::{stream, StreamExt};
use tokio_util::sync::CancellationToken;

/// Cloneable cancellation handle passed alongside a streaming request.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// A handle cancelled together with this one, but cancellable on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }
}

impl From<CancellationToken> for CancelHandle {
    fn from(token: CancellationToken) -> Self {
        Self { token }
    }
}

/// End `parts` as soon as `token` fires, dropping the upstream stream (and its connection).
pub fn cancellable(parts: PartStream, token: CancellationToken) -> PartStream {
    let stream = stream::unfold((parts, token), |(mut parts, token)| async move {
        tokio::select! {
            biased;
            _ = token.cancelled() => None,
            next = parts.next() => next.map(|part| (part, (parts, token))),
        }
    });
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::events::OutputPart;
    use std::time::Duration;

    #[tokio::test]
    async fn stops_without_terminal_part() {
        let handle = CancelHandle::new();
        let source: PartStream = Box::pin(
            stream::iter(0..)
                .then(|i| async move {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    OutputPart::text_delta("t", i.to_string())
                }),
        );
        let mut out = cancellable(source, handle.token().clone());
        assert!(out.next().await.is_some());
        handle.cancel();
        assert!(out.next().await.is_none());
    }

    #[test]
    fn child_follows_parent() {
        let parent = CancelHandle::new();
        let child = parent.child();
        parent.cancel();
        assert!(child.is_cancelled());
    }
}
