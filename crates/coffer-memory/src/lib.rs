//! # coffer-memory
//!
//! Reference Coffer provider backed by process memory. It implements all
//! three engine families (KMS, versioned secrets, blob storage) and adds
//! simulation hooks for testing callers:
//! - Eventual consistency with a configurable visibility window
//! - Chaos injection (latency and random `Internal` failures)
//! - Per-operation, per-tenant rate limiting
//!
//! ```no_run
//! use coffer_core::{Provider, ProviderContext};
//! use coffer_memory::MemoryProvider;
//!
//! # async fn demo() -> coffer_core::Result<()> {
//! let provider = MemoryProvider::new(Default::default())?;
//! let ctx = ProviderContext::new("tenant-a");
//! provider.init(&ctx).await?;
//! # Ok(())
//! # }
//! ```

mod blob;
mod chaos;
mod kms;
mod provider;
mod runtime;
mod secrets;

pub use blob::{MemoryBlobStorage, MAX_SIGNED_URL_EXPIRY};
pub use kms::{MemoryKms, MAX_DELETION_WINDOW_DAYS, MIN_DELETION_WINDOW_DAYS};
pub use provider::{register, MemoryProvider, MemoryProviderFactory};
pub use secrets::MemorySecretStore;
