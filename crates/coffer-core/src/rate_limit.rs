//! Fixed-window rate limiter keyed by (operation, tenant)

use crate::error::{ProviderError, Result};
use crate::types::RateLimitConfig;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

const COMPONENT: &str = "rate-limiter";

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Per-provider rate limiter
///
/// Each (operation, tenant) pair owns a counter that resets once the
/// configured window has elapsed since its first call. Operations with no
/// entry in the QPS table (and no `default` entry) are unlimited.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<(String, String), Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count one call and reject it with `Throttled` above the ceiling
    pub fn check(&self, operation: &str, tenant: &str, now: DateTime<Utc>) -> Result<()> {
        let Some(limit) = self.config.limit_for(operation) else {
            return Ok(());
        };
        let window_len = chrono::Duration::from_std(self.config.window())
            .unwrap_or(chrono::Duration::MAX);

        let mut windows = self
            .windows
            .lock()
            .map_err(|_| ProviderError::internal(COMPONENT, "rate limiter lock poisoned"))?;
        let window = windows
            .entry((operation.to_string(), tenant.to_string()))
            .or_insert(Window {
                started_at: now,
                count: 0,
            });

        if now - window.started_at >= window_len {
            window.started_at = now;
            window.count = 0;
        }

        window.count = window.count.saturating_add(1);
        if window.count > limit {
            tracing::debug!(
                operation,
                tenant,
                attempted = window.count,
                limit,
                "Rate limit exceeded"
            );
            return Err(ProviderError::throttled(
                COMPONENT,
                operation,
                tenant,
                window.count,
                limit,
            ));
        }
        Ok(())
    }
}
