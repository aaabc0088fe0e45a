//! Retry budget for failed poll cycles.
//!
//! A consumer tolerates `retry_count` failed cycles. Each failure consumes one
//! retry and waits the fixed delay; the failure after the last retry is fatal.
//! Whether the budget ever refills is decided by [`RetryResetPolicy`].

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;

/// Default number of tolerated failures
pub const DEFAULT_RETRY_COUNT: u32 = 5;

/// Default wait between a failed cycle and the next attempt
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// When a partially spent retry budget is refilled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryResetPolicy {
    /// The budget only ever decreases over the consumer's lifetime
    #[default]
    Never,
    /// Any successful cycle restores the full budget
    AfterSuccess,
    /// A failure arriving at least `quiet_period_ms` after the previous one
    /// starts from a full budget
    Window { quiet_period_ms: u64 },
}

/// Retry settings for one consumer
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub retry_count: u32,
    pub delay: Duration,
    pub reset: RetryResetPolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: DEFAULT_RETRY_COUNT,
            delay: DEFAULT_RETRY_DELAY,
            reset: RetryResetPolicy::Never,
        }
    }
}

impl RetryPolicy {
    pub fn new(retry_count: u32, delay: Duration) -> Self {
        Self {
            retry_count,
            delay,
            reset: RetryResetPolicy::Never,
        }
    }

    pub fn with_reset(mut self, reset: RetryResetPolicy) -> Self {
        self.reset = reset;
        self
    }

    pub fn budget(&self) -> RetryBudget {
        RetryBudget::new(self.clone())
    }
}

/// What to do after a failed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then run another cycle
    Retry { delay: Duration, remaining: u32 },
    /// No retries left; the consumer stops
    Exhausted,
}

/// Countdown of tolerated failures
#[derive(Debug, Clone)]
pub struct RetryBudget {
    policy: RetryPolicy,
    remaining: u32,
    last_failure: Option<Instant>,
}

impl RetryBudget {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            remaining: policy.retry_count,
            policy,
            last_failure: None,
        }
    }

    /// Retries left before the next failure becomes fatal
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Record a failed cycle and decide whether to retry
    pub fn try_consume(&mut self) -> RetryDecision {
        let now = Instant::now();

        if let RetryResetPolicy::Window { quiet_period_ms } = self.policy.reset {
            let quiet = Duration::from_millis(quiet_period_ms);
            if matches!(self.last_failure, Some(last) if now.duration_since(last) >= quiet) {
                self.remaining = self.policy.retry_count;
            }
        }
        self.last_failure = Some(now);

        if self.remaining == 0 {
            return RetryDecision::Exhausted;
        }

        self.remaining -= 1;
        RetryDecision::Retry {
            delay: self.policy.delay,
            remaining: self.remaining,
        }
    }

    /// Record a successful cycle
    pub fn record_success(&mut self) {
        if self.policy.reset == RetryResetPolicy::AfterSuccess {
            self.remaining = self.policy.retry_count;
        }
    }
}
