//! Policy-based retry execution
//!
//! Backends use this for idempotent network calls: a [`RetryPolicy`] picks
//! the backoff strategy, a [`RetryPredicate`] decides which errors are worth
//! another attempt, and a [`RetryObserver`] reports each attempt.
//!
//! [`RetryPolicy`]: crate::types::RetryPolicy

mod error;
mod executor;
mod observer;
mod strategies;

pub use error::RetryError;
pub use executor::{RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use strategies::{calculate_delay, AlwaysRetry, ErrorKindPredicate, RetryPredicate};
