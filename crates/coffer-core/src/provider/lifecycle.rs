//! Provider lifecycle shared by a provider's engines

use crate::error::{ProviderError, Result};
use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Ready,
    ShutDown,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => LifecycleState::Ready,
            2 => LifecycleState::ShutDown,
            _ => LifecycleState::Created,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            LifecycleState::Created => 0,
            LifecycleState::Ready => 1,
            LifecycleState::ShutDown => 2,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Created => write!(f, "created"),
            LifecycleState::Ready => write!(f, "ready"),
            LifecycleState::ShutDown => write!(f, "shut-down"),
        }
    }
}

/// Created -> Ready -> ShutDown
#[derive(Debug)]
pub struct Lifecycle {
    state: AtomicU8,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(LifecycleState::Created.as_u8()),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Transition to Ready; returns false when already Ready
    pub fn mark_ready(&self, component: &str) -> Result<bool> {
        match self.state.compare_exchange(
            LifecycleState::Created.as_u8(),
            LifecycleState::Ready.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(true),
            Err(current) => match LifecycleState::from_u8(current) {
                LifecycleState::Ready => Ok(false),
                _ => Err(ProviderError::internal(
                    component.to_string(),
                    "provider cannot be initialized after shutdown",
                )),
            },
        }
    }

    /// Transition to ShutDown; returns the previous state
    pub fn mark_shut_down(&self) -> LifecycleState {
        LifecycleState::from_u8(
            self.state
                .swap(LifecycleState::ShutDown.as_u8(), Ordering::AcqRel),
        )
    }

    /// Fail with `Internal` unless Ready
    pub fn ensure_ready(&self, component: &str, operation: &str) -> Result<()> {
        match self.state() {
            LifecycleState::Ready => Ok(()),
            LifecycleState::Created => Err(ProviderError::internal(
                component.to_string(),
                format!("provider not initialized; call init before {}", operation),
            )
            .with_context("operation", operation)),
            LifecycleState::ShutDown => Err(ProviderError::internal(
                component.to_string(),
                format!("provider has been shut down; {} refused", operation),
            )
            .with_context("operation", operation)),
        }
    }
}
