//! State shared by the engines of one provider instance

use crate::chaos::Chaos;
use chrono::{DateTime, Utc};
use coffer_core::provider::Lifecycle;
use coffer_core::types::ProviderConfig;
use coffer_core::{AuditEvent, Clock, ProviderContext, RateLimiter, Result, SystemClock};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::Instrument;

pub(crate) const PROVIDER_NAME: &str = "memory";

/// Lifecycle, rate limiting, chaos and time source for one provider
#[derive(Debug)]
pub(crate) struct Runtime {
    pub(crate) config: ProviderConfig,
    pub(crate) lifecycle: Lifecycle,
    limiter: RateLimiter,
    chaos: Chaos,
    clock: RwLock<Arc<dyn Clock>>,
}

impl Runtime {
    pub(crate) fn new(config: ProviderConfig) -> Self {
        Self {
            limiter: RateLimiter::new(config.rate_limits.clone()),
            chaos: Chaos::new(config.chaos.clone()),
            config,
            lifecycle: Lifecycle::new(),
            clock: RwLock::new(Arc::new(SystemClock)),
        }
    }

    /// Adopt the clock of the initializing context
    pub(crate) fn set_clock(&self, clock: Arc<dyn Clock>) {
        let mut guard = self.clock.write().unwrap_or_else(|e| e.into_inner());
        *guard = clock;
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.read().unwrap_or_else(|e| e.into_inner()).now()
    }

    /// Run one engine call: lifecycle, deadline, rate limit and chaos checks,
    /// then the operation inside a span, with the outcome sent to metrics
    pub(crate) async fn call<T, F>(
        &self,
        ctx: &ProviderContext,
        component: &'static str,
        operation: &'static str,
        op: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let span = ctx.span(component, operation);
        let started = Instant::now();

        let result = async {
            self.lifecycle.ensure_ready(component, operation)?;
            ctx.check_deadline(component, operation)?;
            if let Err(e) = self.limiter.check(operation, ctx.tenant_id(), self.now()) {
                ctx.metrics().record_throttled(operation, ctx.tenant_id());
                return Err(e);
            }
            self.chaos.inject(component, operation).await?;
            op.await
        }
        .instrument(span.clone())
        .await;

        ctx.metrics().record_operation(
            operation,
            ctx.tenant_id(),
            started.elapsed(),
            result.is_ok(),
        );
        if let Err(e) = &result {
            span.in_scope(|| {
                tracing::debug!(error_kind = %e.kind(), error = %e, "Operation failed");
            });
        }
        result
    }

    /// Audit record for a mutating operation of this provider
    pub(crate) fn audit(
        &self,
        ctx: &ProviderContext,
        action: &str,
        resource_type: &str,
        resource_id: &str,
    ) -> AuditEvent {
        AuditEvent::new(ctx, PROVIDER_NAME, action, resource_type, resource_id)
    }
}
