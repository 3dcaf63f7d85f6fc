//! Bounded async retry.
//!
//! [`retry`] drives an operation until it yields `Some` or the attempt budget
//! runs out. Each attempt first waits its backoff delay. The loop holds no
//! background task: dropping the future cancels it at the current await.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// Doubles after every attempt, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self::new(max_attempts, Backoff::Fixed(interval))
    }

    /// Delay before the 1-based `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(interval) => interval,
            Backoff::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}

/// Run `op` up to `policy.max_attempts` times, returning the first `Some`.
///
/// `op` receives the 1-based attempt number.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Option<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.delay_for(attempt)).await;
        if let Some(value) = op(attempt).await {
            tracing::debug!(attempt, "retry succeeded");
            return Some(value);
        }
        tracing::trace!(attempt, max_attempts = policy.max_attempts, "retry attempt came up empty");
    }
    None
}
