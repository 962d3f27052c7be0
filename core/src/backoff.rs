//! Fixed-interval polling bounded by a deadline.
//!
//! A probe is invoked until it reports [`PollOutcome::Ready`] or the
//! deadline passes. Every attempt is itself bounded, so a run always
//! returns within `timeout + interval`.

use backoff::backoff::{Backoff, Constant};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn from_secs(interval_secs: u64, timeout_secs: u64) -> Self {
        Self::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(timeout_secs),
        )
    }
}

/// Classification of a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Ready(T),
    /// The probe answered but the data is not there yet.
    NotReady(String),
    /// The probe itself failed. Still retried until the deadline.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Deadline<T> {
    Ready {
        value: T,
        attempts: u32,
        elapsed: Duration,
    },
    TimedOut {
        attempts: u32,
        elapsed: Duration,
        /// Reason given by the final attempt.
        last_failure: String,
    },
}

impl<T> Deadline<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Deadline::Ready { attempts, .. } | Deadline::TimedOut { attempts, .. } => *attempts,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self {
            Deadline::Ready { elapsed, .. } | Deadline::TimedOut { elapsed, .. } => *elapsed,
        }
    }
}

pub async fn poll_until<F, Fut, T>(
    policy: PollPolicy,
    mut probe: F,
    operation_name: &str,
) -> Deadline<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PollOutcome<T>>,
{
    let mut schedule = Constant::new(policy.interval);
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let budget = deadline
            .saturating_duration_since(Instant::now())
            .max(policy.interval);

        let outcome = match tokio::time::timeout(budget, probe()).await {
            Ok(outcome) => outcome,
            Err(_) => PollOutcome::Failed(format!(
                "attempt exceeded its {}ms budget",
                budget.as_millis()
            )),
        };

        let last_failure = match outcome {
            PollOutcome::Ready(value) => {
                let elapsed = started.elapsed();
                debug!(
                    operation = operation_name,
                    attempts,
                    elapsed_ms = elapsed.as_millis(),
                    "Probe ready"
                );
                return Deadline::Ready {
                    value,
                    attempts,
                    elapsed,
                };
            }
            PollOutcome::NotReady(reason) => {
                debug!(operation = operation_name, attempt = attempts, %reason, "Probe not ready");
                reason
            }
            PollOutcome::Failed(reason) => {
                warn!(operation = operation_name, attempt = attempts, %reason, "Probe failed");
                reason
            }
        };

        let now = Instant::now();
        if now >= deadline {
            let elapsed = started.elapsed();
            warn!(
                operation = operation_name,
                attempts,
                elapsed_ms = elapsed.as_millis(),
                "Deadline reached without a ready probe"
            );
            return Deadline::TimedOut {
                attempts,
                elapsed,
                last_failure,
            };
        }

        let wait = schedule.next_backoff().unwrap_or(policy.interval);
        tokio::time::sleep_until((now + wait).min(deadline)).await;
    }
}
