//! Shared data types

pub mod blob;
pub mod config;
pub mod kms;
pub mod pagination;
pub mod retry;
pub mod secret_value;
pub mod secrets;

pub use blob::*;
pub use config::*;
pub use kms::*;
pub use pagination::*;
pub use retry::{RetryPolicy, RetryStrategy};
pub use secret_value::SecretValue;
pub use secrets::*;
