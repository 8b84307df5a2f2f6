//! Upstream retry policy.
//!
//! # Responsibilities
//! - Decide which upstream answers trigger a failover attempt
//! - Bound the number of attempts per inbound request
//!
//! # Design Decisions
//! - Only `503 Service Unavailable` is retried; transport errors are not
//! - Retries are immediate and go to the next egress client, no backoff
//! - Attempt cap counts the first attempt (4 = 1 try + 3 retries)

use axum::http::StatusCode;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy {
    /// A zero cap is raised to one attempt.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether an upstream status should be retried on another client.
    pub fn is_retryable(&self, status: StatusCode) -> bool {
        status == StatusCode::SERVICE_UNAVAILABLE
    }

    /// Whether attempt number `attempt` (1-based) may be made.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }
}
