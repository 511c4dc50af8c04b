//! # coffer-rest
//!
//! Coffer secret store adapter for REST secret-management services.
//!
//! The backend speaks JSON over HTTP with a bearer token. Reads and deletes
//! are retried on throttling and transient outages; writes are sent once.
//! Labels are carried as `key:value` tags.

mod client;
mod config;
mod labels;
mod provider;
mod store;
mod wire;

pub use config::RestConfig;
pub use labels::{labels_to_tags, tags_to_labels, TAG_SEPARATOR};
pub use provider::{register, RestProvider, RestProviderFactory};
pub use store::RestSecretStore;
