//! Common test helpers for coffer-memory integration tests
//!
//! - Tracing setup honouring `RUST_LOG`
//! - Provider fixtures initialized against a manual clock
//! - Error-kind assertions

#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use coffer_core::types::ProviderConfig;
use coffer_core::{ErrorKind, ManualClock, Provider, ProviderContext, Result};
use coffer_memory::MemoryProvider;
use std::io;
use std::sync::{Arc, Mutex, Once};
use tracing::subscriber::DefaultGuard;

static TRACING: Once = Once::new();

/// Install a test subscriber once per binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Log output collected by a thread-local subscriber
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Route INFO and above on this thread into the buffer until the guard drops
    pub fn install(&self) -> DefaultGuard {
        let logs = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer(move || logs.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf).lines().map(str::to_string).collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A provider under test plus the clock and context it was initialized with
pub struct Fixture {
    pub provider: MemoryProvider,
    pub clock: Arc<ManualClock>,
    pub ctx: ProviderContext,
}

impl Fixture {
    /// Initialized provider with default configuration
    pub async fn new() -> Self {
        Self::with_config(ProviderConfig::default()).await
    }

    /// Initialized provider with the given configuration
    pub async fn with_config(config: ProviderConfig) -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ));
        let ctx = ProviderContext::new("tenant-a").with_clock(clock.clone());
        let provider = MemoryProvider::new(config).expect("valid test configuration");
        provider.init(&ctx).await.expect("provider init");
        Self {
            provider,
            clock,
            ctx,
        }
    }

    /// Context for another tenant sharing the same clock
    pub fn tenant(&self, tenant: &str) -> ProviderContext {
        ProviderContext::new(tenant).with_clock(self.clock.clone())
    }
}

/// Assert that a result failed with the given kind
pub fn assert_kind<T: std::fmt::Debug>(result: Result<T>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("expected {} error, got Ok({:?})", kind, value),
        Err(err) => assert_eq!(err.kind(), kind, "unexpected error: {}", err),
    }
}
