//! Retry execution engine

use std::error::Error;
use std::future::Future;
use std::time::Instant;

use crate::types::RetryPolicy;

use super::error::RetryError;
use super::observer::{NoOpObserver, RetryObserver};
use super::strategies::{calculate_delay, AlwaysRetry, RetryPredicate};

/// Builder for a [`RetryExecutor`]
///
/// ```rust
/// use coffer_core::retry::{ErrorKindPredicate, RetryExecutorBuilder, TracingObserver};
/// use coffer_core::types::RetryPolicy;
///
/// let executor = RetryExecutorBuilder::new()
///     .with_policy(RetryPolicy::default())
///     .with_predicate(ErrorKindPredicate::transient())
///     .with_observer(TracingObserver::new("get_secret"))
///     .build();
/// ```
pub struct RetryExecutorBuilder<P = AlwaysRetry, O = NoOpObserver> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    jitter: bool,
}

impl Default for RetryExecutorBuilder<AlwaysRetry, NoOpObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryExecutorBuilder<AlwaysRetry, NoOpObserver> {
    pub fn new() -> Self {
        Self {
            policy: RetryPolicy::default(),
            predicate: AlwaysRetry,
            observer: NoOpObserver,
            jitter: true,
        }
    }
}

impl<P, O> RetryExecutorBuilder<P, O> {
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_predicate<P2>(self, predicate: P2) -> RetryExecutorBuilder<P2, O> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate,
            observer: self.observer,
            jitter: self.jitter,
        }
    }

    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutorBuilder<P, O2> {
        RetryExecutorBuilder {
            policy: self.policy,
            predicate: self.predicate,
            observer,
            jitter: self.jitter,
        }
    }

    /// Jitter is enabled by default
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn build(self) -> RetryExecutor<P, O> {
        RetryExecutor {
            policy: self.policy,
            predicate: self.predicate,
            observer: self.observer,
            jitter: self.jitter,
        }
    }
}

/// Runs an operation under a retry policy
pub struct RetryExecutor<P, O> {
    policy: RetryPolicy,
    predicate: P,
    observer: O,
    jitter: bool,
}

impl<P, O> RetryExecutor<P, O>
where
    O: RetryObserver,
{
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `op` until it succeeds, the predicate refuses, or attempts run out
    pub async fn execute<F, Fut, T, E>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Error + Send + 'static,
        P: RetryPredicate<E>,
    {
        let start = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            self.observer.on_attempt_start(attempt, max_attempts);

            let err = match op().await {
                Ok(result) => {
                    self.observer.on_success(attempt, start.elapsed());
                    return Ok(result);
                }
                Err(err) => err,
            };

            if !self.predicate.should_retry(&err) {
                self.observer.on_cancelled(attempt, &err);
                return Err(RetryError::non_retryable(err));
            }

            if attempt >= max_attempts {
                self.observer.on_exhausted(attempt, &err);
                return Err(RetryError::exhausted(attempt, err, start.elapsed()));
            }

            let delay = calculate_delay(&self.policy, attempt, self.jitter);
            self.observer.on_attempt_failed(attempt, &err, delay);

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ProviderError};
    use crate::retry::observer::TracingObserver;
    use crate::retry::strategies::ErrorKindPredicate;
    use crate::types::RetryStrategy;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            strategy: RetryStrategy::FixedDelay,
            backoff_multiplier: 2.0,
            initial_delay_ms: 10,
            max_delay_ms: 100,
        }
    }

    fn executor() -> RetryExecutor<ErrorKindPredicate, TracingObserver> {
        RetryExecutorBuilder::new()
            .with_policy(test_policy())
            .with_predicate(ErrorKindPredicate::transient())
            .with_observer(TracingObserver::new("test"))
            .with_jitter(false)
            .build()
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let calls = AtomicU32::new(0);
        let result = executor()
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, ProviderError>("ok") }
            })
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let calls = AtomicU32::new(0);
        let result = executor()
            .execute(|| {
                let previous = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if previous < 2 {
                        Err(ProviderError::unavailable("test", "503"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = executor()
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::throttled("test", "get", "t", 2, 1)) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.into_inner().kind(), ErrorKind::Throttled);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = executor()
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ProviderError::not_found("test", "missing")) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_non_retryable());
        assert_eq!(err.attempts(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
