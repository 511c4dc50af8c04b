//! Error taxonomy shared by every engine and adapter
//!
//! Every failure surfaced by a provider maps to exactly one [`ErrorKind`].
//! Callers branch on the kind; the message exists for logs and audit only.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Result type alias using coffer-core's error type
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Boxed source error carried by a [`ProviderError`]
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Canonical error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// The addressed key, secret, version, object or upload does not exist
    NotFound,
    /// A record with the same identity already exists
    AlreadyExists,
    /// The caller may not perform the operation on the resource in its current state
    PermissionDenied,
    /// Input or configuration failed validation
    InvalidConfig,
    /// Stored or supplied data failed an integrity check
    DataIntegrity,
    /// A rate limit ceiling was exceeded
    Throttled,
    /// Unexpected internal failure, including use of an uninitialized provider
    Internal,
    /// The backend could not be reached or the call deadline expired
    Unavailable,
    /// Credentials were rejected by the backend
    Unauthenticated,
    /// The backend will never support this operation
    Unsupported,
}

impl ErrorKind {
    /// Stable lowercase name for logs and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::AlreadyExists => "already-exists",
            ErrorKind::PermissionDenied => "permission-denied",
            ErrorKind::InvalidConfig => "invalid-config",
            ErrorKind::DataIntegrity => "data-integrity",
            ErrorKind::Throttled => "throttled",
            ErrorKind::Internal => "internal",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details attached to a [`ErrorKind::Throttled`] error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThrottleInfo {
    /// Number of calls attempted in the current window, including the rejected one
    pub attempted: u32,
    /// Configured ceiling for the window
    pub limit: u32,
}

/// Context key marking a conditional read that matched nothing new
const NOT_MODIFIED: &str = "not_modified";

/// Error raised by every provider operation
#[derive(Error, Debug)]
#[error("[{kind}] {component}: {message}")]
pub struct ProviderError {
    kind: ErrorKind,
    message: String,
    component: String,
    context: BTreeMap<String, String>,
    throttle: Option<ThrottleInfo>,
    #[source]
    source: Option<BoxError>,
}

impl ProviderError {
    /// Create a new error of the given kind
    pub fn new(kind: ErrorKind, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            component: component.into(),
            context: BTreeMap::new(),
            throttle: None,
            source: None,
        }
    }

    /// Create a not found error
    pub fn not_found(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, component, message)
    }

    /// Create an already exists error
    pub fn already_exists(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, component, message)
    }

    /// Create a permission denied error
    pub fn permission_denied(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, component, message)
    }

    /// Create an invalid config error
    pub fn invalid_config(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidConfig, component, message)
    }

    /// Create a data integrity error
    pub fn data_integrity(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataIntegrity, component, message)
    }

    /// Create an internal error
    pub fn internal(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, component, message)
    }

    /// Create an unavailable error
    pub fn unavailable(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, component, message)
    }

    /// Create an unauthenticated error
    pub fn unauthenticated(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, component, message)
    }

    /// Create an unsupported operation error
    pub fn unsupported(component: impl Into<String>, operation: &str) -> Self {
        Self::new(
            ErrorKind::Unsupported,
            component,
            format!("operation '{}' is not supported by this backend", operation),
        )
        .with_context("operation", operation)
    }

    /// Create a throttled error carrying the attempted count and configured limit
    pub fn throttled(
        component: impl Into<String>,
        operation: &str,
        tenant: &str,
        attempted: u32,
        limit: u32,
    ) -> Self {
        let mut err = Self::new(
            ErrorKind::Throttled,
            component,
            format!(
                "rate limit exceeded for '{}': {} calls against a limit of {}",
                operation, attempted, limit
            ),
        )
        .with_context("operation", operation)
        .with_context("tenant", tenant);
        err.throttle = Some(ThrottleInfo { attempted, limit });
        err
    }

    /// Create the NotFound-class error returned by a conditional read that matched
    pub fn not_modified(component: impl Into<String>, key: &str) -> Self {
        Self::not_found(component, format!("object '{}' not modified", key))
            .with_context("key", key)
            .with_context(NOT_MODIFIED, "true")
    }

    /// Attach a structured context entry
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attach the underlying cause
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Human readable message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Name of the component that raised the error
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Structured context (ids involved in the failed call)
    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    /// Throttle details, present only for [`ErrorKind::Throttled`]
    pub fn throttle(&self) -> Option<ThrottleInfo> {
        self.throttle
    }

    /// Check whether this error reports a conditional read that matched
    pub fn is_not_modified(&self) -> bool {
        self.kind == ErrorKind::NotFound
            && self.context.get(NOT_MODIFIED).map(String::as_str) == Some("true")
    }

    /// Check the error kind
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}
