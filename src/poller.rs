//! Async job poller.
//!
//! Vendors that render video, queue speech synthesis or run long "responses" hand back a
//! job handle and expect the client to GET its status until it is done. [`Poller`] is the
//! one place that loop lives:
//!
//! ```text
//! submit ──▶ poll ──▶ terminal? ──yes──▶ JobState
//!              ▲          │no
//!              │          ▼
//!              └──── wait interval (cancellable, bounded by the deadline)
//! ```
//!
//! The poller stops with [`Error::Timeout`] when the overall timeout elapses or the attempt
//! cap is hit, and with [`Error::Cancelled`] when the caller's token fires. Errors returned by
//! the poll function itself propagate unchanged; the poller never retries a failed poll.

use crate::{Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// A polled job status plus whatever raw payload the vendor returned with it.
#[derive(Debug, Clone, PartialEq)]
pub struct JobState<S, R = serde_json::Value> {
    pub status: S,
    pub raw: R,
}

impl<S, R> JobState<S, R> {
    pub fn new(status: S, raw: R) -> Self {
        Self { status, raw }
    }
}

/// Polling policy.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Wait between two polls.
    pub interval: Duration,
    /// Overall budget, measured from the first poll.
    pub timeout: Option<Duration>,
    /// Maximum number of poll calls.
    pub max_attempts: Option<u32>,
    /// Interval multiplier applied after every non-terminal poll (1.0 = fixed interval).
    pub backoff: f64,
    /// Upper bound for the interval when backing off.
    pub max_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Some(Duration::from_secs(600)),
            max_attempts: None,
            backoff: 1.0,
            max_interval: Duration::from_secs(30),
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff = if factor.is_finite() && factor >= 1.0 {
            factor
        } else {
            1.0
        };
        self.max_interval = max_interval;
        self
    }

    fn next_interval(&self, current: Duration) -> Duration {
        if self.backoff <= 1.0 {
            return current;
        }
        current.mul_f64(self.backoff).min(self.max_interval.max(self.interval))
    }
}

/// Poll-until-terminal driver. Cheap to construct; holds no job state between runs.
#[derive(Debug, Clone, Default)]
pub struct Poller {
    config: PollConfig,
    cancel: CancellationToken,
}

impl Poller {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `token` at every poll and every wait.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Call `poll` until `is_terminal` accepts the returned status.
    pub async fn run<S, R, F, Fut, T>(&self, mut poll: F, is_terminal: T) -> Result<JobState<S, R>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<JobState<S, R>>>,
        T: Fn(&S) -> bool,
    {
        let started = Instant::now();
        let deadline = self.config.timeout.map(|t| started + t);
        let mut interval = self.config.interval;
        let mut attempts: u32 = 0;

        let timed_out = |attempts: u32| Error::Timeout {
            attempts,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        loop {
            attempts += 1;

            let state = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                res = bounded(deadline, poll()) => match res {
                    Some(res) => res?,
                    None => {
                        warn!(attempts, "job poll exceeded the overall timeout");
                        return Err(timed_out(attempts));
                    }
                },
            };

            if is_terminal(&state.status) {
                debug!(attempts, elapsed_ms = started.elapsed().as_millis() as u64, "job reached terminal state");
                return Ok(state);
            }

            if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                warn!(attempts, "job did not finish within the attempt cap");
                return Err(timed_out(attempts));
            }

            let wait = match deadline {
                Some(d) => interval.min(d.saturating_duration_since(Instant::now())),
                None => interval,
            };
            debug!(attempts, wait_ms = wait.as_millis() as u64, "job still running");

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }

            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(attempts, "job did not finish before the overall timeout");
                return Err(timed_out(attempts));
            }

            interval = self.config.next_interval(interval);
        }
    }

    /// Submit a job, then poll it by handle until it is terminal.
    pub async fn submit_and_poll<H, S, R, SF, SFut, F, Fut, T>(
        &self,
        submit: SF,
        mut poll: F,
        is_terminal: T,
    ) -> Result<(H, JobState<S, R>)>
    where
        H: Clone,
        SF: FnOnce() -> SFut,
        SFut: Future<Output = Result<H>>,
        F: FnMut(H) -> Fut,
        Fut: Future<Output = Result<JobState<S, R>>>,
        T: Fn(&S) -> bool,
    {
        let handle = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            h = submit() => h?,
        };
        let state = self.run(|| poll(handle.clone()), is_terminal).await?;
        Ok((handle, state))
    }
}

/// `None` when the deadline passes first.
async fn bounded<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(d) => tokio::time::timeout_at(d.into(), fut).await.ok(),
        None => Some(fut.await),
    }
}
