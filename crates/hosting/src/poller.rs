//! Deployment readiness polling.
//!
//! Polling is strictly sequential: one status check at a time, followed by a
//! fixed delay. The total count of checks is bounded by the maximum wait time.

use std::{future::Future, time::Duration};

use tracing::{debug, warn};

use crate::provider::{ProviderError, ReadyState};

/// Result of the readiness polling.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Deployment became ready.
    Ready,

    /// Provider reported a failed build.
    Failed,

    /// Deployment did not reach a terminal state in time.
    TimedOut,
}

/// Fixed interval poller bounded by a maximum wait time.
#[derive(Copy, Clone, Debug)]
pub struct Poller {
    interval: Duration,
    max_wait: Duration,
}

impl Poller {
    /// Create a new poller.
    ///
    /// A zero `interval` is treated as one millisecond.
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
            max_wait,
        }
    }

    /// Max count of status checks, equal to `ceil(max_wait / interval)`.
    pub fn max_attempts(&self) -> u32 {
        let interval = self.interval.as_millis();
        let attempts = (self.max_wait.as_millis() + interval - 1) / interval;

        attempts.min(u32::MAX as u128) as u32
    }

    /// Call `check` until it reports a terminal state or the attempts are exhausted.
    ///
    /// Errors returned by `check` are logged and count as a regular attempt.
    pub async fn wait<F, Fut>(&self, mut check: F) -> PollOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ReadyState, ProviderError>>,
    {
        let max_attempts = self.max_attempts();

        for attempt in 1..=max_attempts {
            match check().await {
                Ok(ReadyState::Ready) => return PollOutcome::Ready,
                Ok(ReadyState::Error) => return PollOutcome::Failed,
                Ok(ReadyState::Building) => debug!(attempt, "deployment is still building"),
                Err(err) => warn!(%err, attempt, "unable to check deployment status"),
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.interval).await;
            }
        }

        PollOutcome::TimedOut
    }
}
