//! Provider contract: traits, capabilities, lifecycle and registry

pub mod capabilities;
pub mod lifecycle;
pub mod registry;
pub mod traits;

pub use capabilities::{BlobCapabilities, Capabilities, Capability, KmsCapabilities, SecretCapabilities};
pub use lifecycle::{Lifecycle, LifecycleState};
pub use registry::{ProviderFactory, ProviderRegistry};
pub use traits::{BlobStorage, HealthState, HealthStatus, KmsEngine, Provider, ProviderInfo, SecretStore};
