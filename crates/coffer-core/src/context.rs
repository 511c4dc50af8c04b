//! Per-call context threaded through every engine operation
//!
//! A [`ProviderContext`] carries the caller identity (tenant, request id),
//! the time source, an optional deadline and a metrics sink. Engines open a
//! tracing span per call through [`ProviderContext::span`].

use crate::error::{ProviderError, Result};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Tenant used when the caller does not provide one
pub const DEFAULT_TENANT: &str = "default";

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = now.checked_add_signed(delta).unwrap_or(*now);
    }

    /// Jump to an absolute time
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Receiver of operation metrics
pub trait MetricsSink: Send + Sync + fmt::Debug {
    /// One finished operation
    fn record_operation(&self, operation: &str, tenant: &str, duration: Duration, success: bool);

    /// A rejected call
    fn record_throttled(&self, operation: &str, tenant: &str) {
        let _ = (operation, tenant);
    }
}

/// Discards all metrics
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record_operation(&self, _operation: &str, _tenant: &str, _duration: Duration, _success: bool) {}
}

/// Per-call context
#[derive(Debug, Clone)]
pub struct ProviderContext {
    tenant_id: String,
    request_id: String,
    clock: Arc<dyn Clock>,
    deadline: Option<DateTime<Utc>>,
    metrics: Arc<dyn MetricsSink>,
}

impl Default for ProviderContext {
    fn default() -> Self {
        Self::new(DEFAULT_TENANT)
    }
}

impl ProviderContext {
    /// Context for a tenant with a fresh request id and the system clock
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
            clock: Arc::new(SystemClock),
            deadline: None,
            metrics: Arc::new(NoopMetrics),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Absolute deadline
    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline relative to the context clock
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let now = self.clock.now();
        let deadline = chrono::Duration::from_std(timeout)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.with_deadline(deadline)
    }

    /// A context for a different request of the same caller
    pub fn child(&self) -> Self {
        let mut child = self.clone();
        child.request_id = uuid::Uuid::new_v4().to_string();
        child
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn metrics(&self) -> &dyn MetricsSink {
        self.metrics.as_ref()
    }

    /// Time left before the deadline, `None` when unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| (deadline - self.now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Fail with `Unavailable` once the deadline has passed
    pub fn check_deadline(&self, component: &str, operation: &str) -> Result<()> {
        match self.deadline {
            Some(deadline) if self.now() >= deadline => Err(ProviderError::unavailable(
                component.to_string(),
                format!("deadline exceeded before {}", operation),
            )
            .with_context("operation", operation)
            .with_context("deadline", deadline.to_rfc3339())
            .with_context("request_id", self.request_id.clone())),
            _ => Ok(()),
        }
    }

    /// Span for one engine call
    pub fn span(&self, component: &'static str, operation: &'static str) -> tracing::Span {
        tracing::info_span!(
            "provider_call",
            component = component,
            operation = operation,
            tenant_id = %self.tenant_id,
            request_id = %self.request_id,
        )
    }
}
