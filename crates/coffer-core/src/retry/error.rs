//! Error types for the retry execution engine

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during retry execution
///
/// Generic over `E`, the error type of the operation being retried.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// All attempts have been used and the last one still failed
    #[error(
        "retry exhausted after {attempts} attempts over {secs:.2}s: {source}",
        secs = .total_duration.as_secs_f64()
    )]
    Exhausted {
        /// Number of attempts made before giving up
        attempts: u32,
        /// The error from the final attempt
        source: E,
        /// Total duration spent across all attempts
        total_duration: Duration,
    },

    /// The predicate declined to retry this error
    #[error("non-retryable error: {0}")]
    NonRetryable(#[source] E),
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    pub fn exhausted(attempts: u32, source: E, total_duration: Duration) -> Self {
        RetryError::Exhausted {
            attempts,
            source,
            total_duration,
        }
    }

    pub fn non_retryable(source: E) -> Self {
        RetryError::NonRetryable(source)
    }

    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } => *attempts,
            RetryError::NonRetryable(_) => 1,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn is_non_retryable(&self) -> bool {
        matches!(self, RetryError::NonRetryable(_))
    }

    /// The error of the last attempt
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } => source,
            RetryError::NonRetryable(source) => source,
        }
    }

    pub fn inner(&self) -> &E {
        match self {
            RetryError::Exhausted { source, .. } => source,
            RetryError::NonRetryable(source) => source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ProviderError};

    #[test]
    fn test_exhausted_error() {
        let err = RetryError::exhausted(
            3,
            ProviderError::unavailable("rest", "connection reset"),
            Duration::from_secs(5),
        );

        assert!(err.is_exhausted());
        assert!(!err.is_non_retryable());
        assert_eq!(err.attempts(), 3);

        let display = err.to_string();
        assert!(display.contains("3 attempts"));
        assert!(display.contains("connection reset"));
        assert_eq!(err.into_inner().kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_non_retryable_error() {
        let err = RetryError::non_retryable(ProviderError::not_found("rest", "no such secret"));
        assert!(err.is_non_retryable());
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.inner().kind(), ErrorKind::NotFound);
    }
}
