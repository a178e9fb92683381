//! Software device with a controllable liveness flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::error;

use super::command::SimCommandBuffer;
use super::fence::SimFence;
use super::validation::ValidationLog;
use crate::device::{Device, RemovalReason};
use crate::error::{RhiError, RhiResult};

struct DeviceState {
    live: AtomicBool,
    reason: Mutex<Option<RemovalReason>>,
    validation: ValidationLog,
}

/// Simulated logical device.
///
/// Clones share state, so the queue worker and the render thread observe the
/// same liveness.
#[derive(Clone)]
pub struct SimDevice {
    state: Arc<DeviceState>,
}

impl SimDevice {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(DeviceState {
                live: AtomicBool::new(true),
                reason: Mutex::new(None),
                validation: ValidationLog::new(),
            }),
        }
    }

    /// Simulates device removal.
    ///
    /// The GPU stops retiring work, so pending fence values are never
    /// reached, and further submissions fail with
    /// [`RhiError::DeviceLost`]. Only the first reason is kept.
    pub fn remove(&self, reason: RemovalReason) {
        let mut current = self.state.reason.lock();
        if current.is_none() {
            error!("Sim device removed: {}", reason);
            *current = Some(reason);
            self.state.live.store(false, Ordering::Release);
        }
    }

    /// Findings of the GPU-side validation.
    pub fn validation(&self) -> &ValidationLog {
        &self.state.validation
    }

    pub(crate) fn check_live(&self) -> RhiResult<()> {
        match self.removal_reason() {
            None => Ok(()),
            Some(reason) => Err(RhiError::DeviceLost(reason)),
        }
    }
}

impl Device for SimDevice {
    type CommandBuffer = SimCommandBuffer;
    type Fence = SimFence;

    fn create_command_buffer(&self, name: &str) -> RhiResult<SimCommandBuffer> {
        self.check_live()?;
        Ok(SimCommandBuffer::new(name))
    }

    fn create_fence(&self, name: &str) -> RhiResult<SimFence> {
        self.check_live()?;
        Ok(SimFence::new(name))
    }

    fn is_live(&self) -> bool {
        self.state.live.load(Ordering::Acquire)
    }

    fn removal_reason(&self) -> Option<RemovalReason> {
        *self.state.reason.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_keeps_first_reason() {
        let device = SimDevice::new();
        assert!(device.is_live());
        assert_eq!(device.removal_reason(), None);

        device.remove(RemovalReason::Hung);
        device.remove(RemovalReason::Removed);

        assert!(!device.is_live());
        assert_eq!(device.removal_reason(), Some(RemovalReason::Hung));
    }

    #[test]
    fn test_creation_fails_after_removal() {
        let device = SimDevice::new();
        device.create_fence("fence").expect("live device");

        device.remove(RemovalReason::Reset);
        assert!(matches!(
            device.create_command_buffer("cmd"),
            Err(RhiError::DeviceLost(RemovalReason::Reset))
        ));
    }
}
