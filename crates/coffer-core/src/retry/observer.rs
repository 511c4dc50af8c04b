//! Retry observation and logging

use std::error::Error;
use std::time::Duration;

/// Callbacks fired during retry execution
pub trait RetryObserver: Send + Sync {
    /// An attempt (1-indexed) is about to start
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32);

    /// An attempt failed and will be retried after `delay`
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Error, delay: Duration);

    fn on_success(&self, attempt: u32, total_duration: Duration);

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Error);

    /// The predicate declined to retry
    fn on_cancelled(&self, attempt: u32, error: &dyn Error) {
        let _ = (attempt, error);
    }
}

/// Observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {}

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Error, _delay: Duration) {}

    fn on_success(&self, _attempt: u32, _total_duration: Duration) {}

    fn on_exhausted(&self, _attempts: u32, _final_error: &dyn Error) {}
}

/// Logs retry events through `tracing`
///
/// Failed attempts and cancellations log at WARN, exhaustion at ERROR,
/// a success after retries at INFO and everything else at DEBUG.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        tracing::debug!(
            operation = %self.operation,
            attempt = attempt,
            max_attempts = max_attempts,
            "starting attempt"
        );
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Error, delay: Duration) {
        tracing::warn!(
            operation = %self.operation,
            attempt = attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, attempt: u32, total_duration: Duration) {
        if attempt > 1 {
            tracing::info!(
                operation = %self.operation,
                attempt = attempt,
                total_duration_ms = total_duration.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                duration_ms = total_duration.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_exhausted(&self, attempts: u32, final_error: &dyn Error) {
        tracing::error!(
            operation = %self.operation,
            attempts = attempts,
            error = %final_error,
            "all retry attempts exhausted"
        );
    }

    fn on_cancelled(&self, attempt: u32, error: &dyn Error) {
        tracing::debug!(
            operation = %self.operation,
            attempt = attempt,
            error = %error,
            "not retrying non-retryable error"
        );
    }
}
