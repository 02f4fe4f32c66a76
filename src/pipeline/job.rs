//! Asynchronous job backends.
//!
//! A job emits nothing while it runs: once the poller observes a terminal state the
//! artifact is fetched and the whole result goes out as one short terminal sequence.

use super::PartStream;
use crate::poller::{JobState, PollConfig, Poller};
use crate::types::events::{FinishReason, OutputPart, Usage};
use crate::types::response::GeneratedFile;
use crate::{Error, ErrorContext, ErrorKind, Result};
use async_trait::async_trait;
use futures::{stream, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How a terminal job ended, from the vendor's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed(String),
    /// The vendor cancelled the job on its side.
    Cancelled(Option<String>),
}

/// A vendor's "create job, then GET status" API.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Vendor-specific status enumeration.
    type Status: Send + Sync + 'static;

    fn provider_id(&self) -> &str;

    /// Create the job and return its handle.
    async fn submit(&self) -> Result<String>;

    async fn poll(&self, job_id: &str) -> Result<JobState<Self::Status>>;

    fn is_terminal(&self, status: &Self::Status) -> bool;

    fn outcome(&self, state: &JobState<Self::Status>) -> JobOutcome;

    /// Download and decode the finished artifact.
    async fn fetch_artifact(&self, job_id: &str, state: &JobState<Self::Status>) -> Result<GeneratedFile>;
}

/// Result of a job that reached a terminal state.
#[derive(Debug, Clone)]
pub struct FinishedJob<S> {
    pub job_id: String,
    pub state: JobState<S>,
    pub outcome: JobOutcome,
    /// Present only when the job succeeded.
    pub artifact: Option<GeneratedFile>,
}

/// Submit, poll until terminal, and fetch the artifact of a successful job.
pub async fn run_job<B>(
    backend: &B,
    config: &PollConfig,
    cancel: &CancellationToken,
) -> Result<FinishedJob<B::Status>>
where
    B: JobBackend + ?Sized,
{
    let poller = Poller::new(config.clone()).with_cancellation(cancel.clone());
    let (job_id, state) = poller
        .submit_and_poll(
            || backend.submit(),
            |id: String| async move { backend.poll(&id).await },
            |s| backend.is_terminal(s),
        )
        .await?;

    let outcome = backend.outcome(&state);
    info!(provider = backend.provider_id(), job_id = %job_id, outcome = ?outcome, "job finished");

    let artifact = match outcome {
        JobOutcome::Succeeded => {
            let fetch = backend.fetch_artifact(&job_id, &state);
            let file = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                f = fetch => f?,
            };
            Some(file)
        }
        _ => None,
    };

    Ok(FinishedJob {
        job_id,
        state,
        outcome,
        artifact,
    })
}

/// Run a job and present it as an output-part stream.
///
/// Success yields `file` then `finish`; a vendor failure or a poll timeout yields a single
/// `error`; a vendor-side cancellation yields `abort`; caller cancellation yields nothing.
pub fn stream_job<B>(backend: Arc<B>, config: PollConfig, cancel: CancellationToken) -> PartStream
where
    B: JobBackend + ?Sized + 'static,
{
    let parts = async move {
        let provider = backend.provider_id().to_string();
        match run_job(backend.as_ref(), &config, &cancel).await {
            Ok(job) => job_parts(&provider, job),
            Err(Error::Cancelled) => Vec::new(),
            Err(e) => {
                warn!(provider = %provider, error = %e, "job failed");
                vec![OutputPart::error(&e)]
            }
        }
    };
    Box::pin(stream::once(parts).flat_map(stream::iter))
}

fn job_parts<S>(provider: &str, job: FinishedJob<S>) -> Vec<OutputPart> {
    match (job.outcome, job.artifact) {
        (JobOutcome::Succeeded, Some(file)) => vec![
            OutputPart::File {
                media_type: file.media_type,
                data: file.base64,
            },
            OutputPart::finish(FinishReason::Stop, Usage::default(), None),
        ],
        (JobOutcome::Succeeded, None) => vec![OutputPart::Error {
            kind: ErrorKind::Internal,
            error_text: format!("job {} succeeded without an artifact", job.job_id),
        }],
        (JobOutcome::Failed(message), _) => {
            let err = Error::runtime_with_context(
                message,
                ErrorContext::new()
                    .with_source(provider.to_string())
                    .with_details(format!("job {}", job.job_id)),
            );
            vec![OutputPart::Error {
                kind: ErrorKind::UpstreamFailure,
                error_text: err.to_string(),
            }]
        }
        (JobOutcome::Cancelled(reason), _) => vec![OutputPart::Abort { reason }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::assert_well_formed;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Render {
        Queued,
        Done,
        Failed,
        Cancelled,
    }

    struct FakeRender {
        ready_after: u32,
        end: Render,
        polls: AtomicU32,
    }

    impl FakeRender {
        fn new(ready_after: u32, end: Render) -> Arc<Self> {
            Arc::new(Self {
                ready_after,
                end,
                polls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl JobBackend for FakeRender {
        type Status = Render;

        fn provider_id(&self) -> &str {
            "fake"
        }

        async fn submit(&self) -> Result<String> {
            Ok("job-1".into())
        }

        async fn poll(&self, _job_id: &str) -> Result<JobState<Render>> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            let status = if n >= self.ready_after { self.end } else { Render::Queued };
            Ok(JobState::new(status, serde_json::json!({ "poll": n })))
        }

        fn is_terminal(&self, status: &Render) -> bool {
            *status != Render::Queued
        }

        fn outcome(&self, state: &JobState<Render>) -> JobOutcome {
            match state.status {
                Render::Done => JobOutcome::Succeeded,
                Render::Cancelled => JobOutcome::Cancelled(Some("moderation".into())),
                _ => JobOutcome::Failed("render failed".into()),
            }
        }

        async fn fetch_artifact(&self, _job_id: &str, _state: &JobState<Render>) -> Result<GeneratedFile> {
            Ok(GeneratedFile::from_bytes("video/mp4", b"\x00\x01"))
        }
    }

    fn fast() -> PollConfig {
        PollConfig::new(Duration::from_millis(1)).with_timeout(Some(Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn success_emits_file_then_finish() {
        let backend = FakeRender::new(3, Render::Done);
        let parts: Vec<_> = stream_job(backend.clone(), fast(), CancellationToken::new())
            .collect()
            .await;
        assert_well_formed(&parts);
        assert_eq!(parts.len(), 2);
        assert!(matches!(&parts[0], OutputPart::File { media_type, .. } if media_type == "video/mp4"));
        assert_eq!(backend.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn vendor_failure_and_cancellation() {
        let parts: Vec<_> = stream_job(FakeRender::new(1, Render::Failed), fast(), CancellationToken::new())
            .collect()
            .await;
        assert!(matches!(
            parts.as_slice(),
            [OutputPart::Error { kind: ErrorKind::UpstreamFailure, .. }]
        ));

        let parts: Vec<_> = stream_job(FakeRender::new(1, Render::Cancelled), fast(), CancellationToken::new())
            .collect()
            .await;
        assert_eq!(
            parts,
            vec![OutputPart::Abort {
                reason: Some("moderation".into())
            }]
        );
    }

    #[tokio::test]
    async fn timeout_is_reported_as_timeout_part() {
        let config = PollConfig::new(Duration::from_millis(5)).with_timeout(Some(Duration::from_millis(30)));
        let parts: Vec<_> = stream_job(FakeRender::new(u32::MAX, Render::Done), config, CancellationToken::new())
            .collect()
            .await;
        assert!(matches!(
            parts.as_slice(),
            [OutputPart::Error { kind: ErrorKind::Timeout, .. }]
        ));
    }

    #[tokio::test]
    async fn caller_cancellation_emits_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let parts: Vec<_> = stream_job(FakeRender::new(2, Render::Done), fast(), token)
            .collect()
            .await;
        assert!(parts.is_empty());
    }
}
