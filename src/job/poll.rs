//! Waiting for jobs to reach a terminal state.
//!
//! Polls the job status with bounded exponential backoff until the job is
//! terminal or the deadline passes.

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{RelayError, Result};
use crate::job::{JobStatus, QueryService};

/// Bounded exponential backoff with a deadline.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the second status check.
    pub initial_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Growth factor applied after each check.
    pub multiplier: f64,
    /// Total time allowed for the job to become terminal.
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            timeout: Duration::from_secs(120),
        }
    }
}

impl PollPolicy {
    /// Sets the deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the (infinite) sequence of delays between checks.
    pub fn delays(&self) -> Backoff {
        Backoff {
            next: self.initial_delay.min(self.max_delay),
            max: self.max_delay,
            multiplier: self.multiplier,
        }
    }
}

/// Iterator over backoff delays.
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    multiplier: f64,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = Duration::try_from_secs_f64(current.as_secs_f64() * self.multiplier)
            .map_or(self.max, |next| next.min(self.max));
        Some(current)
    }
}

/// How the runner waits between submission and result retrieval.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitStrategy {
    /// Poll the job status until terminal.
    Poll(PollPolicy),
    /// Sleep a fixed delay and fetch without checking status.
    ///
    /// Assumes the job finished within the delay. When it has not, the fetch
    /// fails with `ObjectNotFound` or reads a partial object.
    FixedDelay(Duration),
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::Poll(PollPolicy::default())
    }
}

/// Polls `execution_id` until it reaches a terminal state.
///
/// Returns the terminal status, or `Timeout` with the last observed state.
/// A timeout too large to represent waits without a deadline. Status lookup
/// errors propagate immediately.
pub async fn wait_for_terminal(
    service: &dyn QueryService,
    execution_id: &str,
    policy: &PollPolicy,
) -> Result<JobStatus> {
    let start = Instant::now();
    let deadline = start.checked_add(policy.timeout);
    let mut delays = policy.delays();
    let mut checks = 0u32;

    loop {
        let status = service.query_status(execution_id).await?;
        checks += 1;

        if status.state.is_terminal() {
            debug!(
                "Query {} reached {} after {} checks ({:?})",
                execution_id,
                status.state,
                checks,
                start.elapsed()
            );
            return Ok(status);
        }

        let now = Instant::now();
        let mut delay = delays.next().unwrap_or(policy.max_delay);
        if let Some(deadline) = deadline {
            if now >= deadline {
                return Err(RelayError::Timeout {
                    execution_id: execution_id.to_string(),
                    waited: now - start,
                    last_state: status.state,
                });
            }
            delay = delay.min(deadline - now);
        }
        debug!(
            "Query {} is {}, checking again in {:?}",
            execution_id, status.state, delay
        );
        tokio::time::sleep(delay).await;
    }
}
