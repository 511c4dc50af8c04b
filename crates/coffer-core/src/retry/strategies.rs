//! Retry delay strategies and predicates

use crate::error::{ErrorKind, ProviderError};
use crate::types::{RetryPolicy, RetryStrategy};
use rand::Rng;
use std::time::Duration;

/// Calculate the delay before the next retry attempt
///
/// `attempt` is 1-indexed. With `jitter`, up to 25% random variation is
/// added on top of the capped delay.
///
/// ```rust
/// use coffer_core::retry::calculate_delay;
/// use coffer_core::types::{RetryPolicy, RetryStrategy};
///
/// let policy = RetryPolicy {
///     max_attempts: 3,
///     strategy: RetryStrategy::ExponentialBackoff,
///     backoff_multiplier: 2.0,
///     initial_delay_ms: 100,
///     max_delay_ms: 1000,
/// };
///
/// assert_eq!(calculate_delay(&policy, 1, false).as_millis(), 100);
/// assert_eq!(calculate_delay(&policy, 2, false).as_millis(), 200);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, jitter: bool) -> Duration {
    let attempt_index = attempt.saturating_sub(1);

    let base_delay_ms = match policy.strategy {
        RetryStrategy::None => 0,
        RetryStrategy::FixedDelay => policy.initial_delay_ms,
        RetryStrategy::ExponentialBackoff => {
            let multiplier = policy.backoff_multiplier.powf(attempt_index as f64);
            (policy.initial_delay_ms as f64 * multiplier) as u64
        }
        RetryStrategy::LinearBackoff => policy
            .initial_delay_ms
            .saturating_mul(attempt_index as u64 + 1),
    };

    let capped_delay_ms = base_delay_ms.min(policy.max_delay_ms);

    let final_delay_ms = if jitter && capped_delay_ms > 0 {
        let jitter_range = capped_delay_ms / 4;
        capped_delay_ms + rand::thread_rng().gen_range(0..=jitter_range)
    } else {
        capped_delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

/// Decides whether an error should be retried
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    fn should_retry(&self, error: &E) -> bool;
}

/// Every error is retryable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// Retries provider errors whose kind is in a fixed set
#[derive(Debug, Clone)]
pub struct ErrorKindPredicate {
    retryable: Vec<ErrorKind>,
}

impl ErrorKindPredicate {
    /// Throttling and unavailability are transient
    pub fn transient() -> Self {
        Self {
            retryable: vec![ErrorKind::Throttled, ErrorKind::Unavailable],
        }
    }
}

impl Default for ErrorKindPredicate {
    fn default() -> Self {
        Self::transient()
    }
}

impl RetryPredicate<ProviderError> for ErrorKindPredicate {
    fn should_retry(&self, error: &ProviderError) -> bool {
        self.retryable.contains(&error.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(strategy: RetryStrategy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            strategy,
            backoff_multiplier: 2.0,
            initial_delay_ms: 100,
            max_delay_ms: 500,
        }
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let policy = policy(RetryStrategy::ExponentialBackoff);
        assert_eq!(calculate_delay(&policy, 1, false), Duration::from_millis(100));
        assert_eq!(calculate_delay(&policy, 3, false), Duration::from_millis(400));
        assert_eq!(calculate_delay(&policy, 4, false), Duration::from_millis(500));
    }

    #[test]
    fn test_linear_and_fixed_delay() {
        let linear = policy(RetryStrategy::LinearBackoff);
        assert_eq!(calculate_delay(&linear, 2, false), Duration::from_millis(200));
        let fixed = policy(RetryStrategy::FixedDelay);
        assert_eq!(calculate_delay(&fixed, 4, false), Duration::from_millis(100));
        let none = policy(RetryStrategy::None);
        assert_eq!(calculate_delay(&none, 2, true), Duration::ZERO);
    }

    #[test]
    fn test_jitter_stays_within_a_quarter() {
        let policy = policy(RetryStrategy::FixedDelay);
        for _ in 0..50 {
            let delay = calculate_delay(&policy, 1, true).as_millis();
            assert!((100..=125).contains(&delay));
        }
    }

    #[test]
    fn test_error_kind_predicate() {
        let predicate = ErrorKindPredicate::transient();
        assert!(predicate.should_retry(&ProviderError::unavailable("rest", "503")));
        assert!(predicate.should_retry(&ProviderError::throttled("rest", "get", "t", 2, 1)));
        assert!(!predicate.should_retry(&ProviderError::not_found("rest", "404")));
        assert!(!predicate.should_retry(&ProviderError::internal("rest", "500")));
    }

    #[test]
    fn test_always_retry() {
        assert!(AlwaysRetry.should_retry(&ProviderError::not_found("x", "gone")));
    }
}
