//! # coffer-core
//!
//! Shared contract for Coffer providers:
//! - Provider and engine traits (KMS, secret store, blob storage)
//! - Capability negotiation, lifecycle and the provider registry
//! - Error taxonomy, per-call context and audit records
//! - Configuration, pagination and the KMS envelope wire format
//! - Rate limiting and policy-based retry execution

pub mod audit;
pub mod context;
pub mod envelope;
pub mod error;
pub mod provider;
pub mod rate_limit;
pub mod retry;
pub mod types;

pub use audit::AuditEvent;
pub use context::{Clock, ManualClock, MetricsSink, NoopMetrics, ProviderContext, SystemClock};
pub use error::{ErrorKind, ProviderError, Result};
pub use provider::{
    BlobStorage, Capabilities, Capability, KmsEngine, Provider, ProviderFactory, ProviderInfo,
    ProviderRegistry, SecretStore,
};
pub use rate_limit::RateLimiter;
