//! Retry with exponential backoff for provider requests.
//!
//! Retries happen only before the first byte of a response is consumed.
//! Once a stream is open, failures surface to the caller unchanged.

use rand::Rng;
use toolflow_types::ApiError;

/// Configuration for retry behavior on transient API errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    /// Initial delay in milliseconds before the first retry.
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds between retries.
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// A config that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay in milliseconds before retry number `attempt` (zero-based).
    ///
    /// A server-supplied `Retry-After` wins (clamped to `max_delay_ms`).
    /// Otherwise `initial_delay_ms * backoff_factor^attempt` with ±25% jitter.
    pub fn delay_for(&self, attempt: u32, retry_after_ms: Option<u64>) -> u64 {
        if let Some(server_delay) = retry_after_ms {
            return server_delay.min(self.max_delay_ms);
        }

        let base = self.initial_delay_ms as f64 * self.backoff_factor.powi(attempt as i32);
        let clamped = base.min(self.max_delay_ms as f64);
        let jitter = rand::rng().random_range(0.75..=1.25);

        ((clamped * jitter) as u64).min(self.max_delay_ms)
    }
}

/// Returns `true` if the error is transient and the request may be resent.
pub fn is_retryable(error: &ApiError) -> bool {
    matches!(
        error,
        ApiError::RateLimited { .. }
            | ApiError::Overloaded
            | ApiError::Server { .. }
            | ApiError::Network(_)
            | ApiError::Timeout
    )
}
