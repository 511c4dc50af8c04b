//! Audit records for mutating provider operations
//!
//! Records never carry secret values, key material or object bodies; only
//! identifiers and outcomes.

use crate::context::ProviderContext;
use crate::error::ProviderError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Audit entry for a provider operation
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    pub provider: String,
    pub tenant_id: String,
    pub request_id: String,
    pub success: bool,
    pub error_kind: Option<String>,
    pub error: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        ctx: &ProviderContext,
        provider: impl Into<String>,
        action: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            action: action.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            provider: provider.into(),
            tenant_id: ctx.tenant_id().to_string(),
            request_id: ctx.request_id().to_string(),
            success: true,
            error_kind: None,
            error: None,
            metadata: BTreeMap::new(),
            timestamp: ctx.now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: &ProviderError) -> Self {
        self.success = false;
        self.error_kind = Some(error.kind().to_string());
        self.error = Some(error.message().to_string());
        self
    }

    /// Record the outcome of an operation result
    pub fn with_outcome<T>(self, result: &Result<T, ProviderError>) -> Self {
        match result {
            Ok(_) => self,
            Err(e) => self.with_error(e),
        }
    }

    /// Log the audit entry (never logs secret values)
    pub fn log(&self) {
        if self.success {
            tracing::info!(
                target: "coffer::audit",
                action = %self.action,
                resource_type = %self.resource_type,
                resource_id = %self.resource_id,
                provider = %self.provider,
                tenant_id = %self.tenant_id,
                request_id = %self.request_id,
                metadata = ?self.metadata,
                timestamp = %self.timestamp,
                "Provider operation successful"
            );
        } else {
            tracing::warn!(
                target: "coffer::audit",
                action = %self.action,
                resource_type = %self.resource_type,
                resource_id = %self.resource_id,
                provider = %self.provider,
                tenant_id = %self.tenant_id,
                request_id = %self.request_id,
                error_kind = ?self.error_kind,
                error = ?self.error,
                timestamp = %self.timestamp,
                "Provider operation failed"
            );
        }
    }
}
