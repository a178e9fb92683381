//! Frame pipeline error types.

use std::time::Duration;

use framepace_rhi::{RemovalReason, RhiError};
use thiserror::Error;

/// Errors that end the frame loop.
///
/// None of these are retryable in place: a stall or a lost device leaves
/// slots owned by work that will never retire.
#[derive(Error, Debug)]
pub enum FrameError {
    /// A completion wait ran past its timeout while the device still reports live
    #[error(
        "Fatal pipeline stall at frame {frame}: fence value {waited_for} not reached within {timeout:?} (completed: {completed})"
    )]
    FatalStall {
        frame: u64,
        waited_for: u64,
        completed: u64,
        timeout: Duration,
    },

    /// The device is gone; every pipeline object must be recreated
    #[error("Device lost: {0}")]
    DeviceLost(RemovalReason),

    /// Pipeline parameters out of range
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The render loop was already shut down
    #[error("Render loop has been shut down")]
    ShutDown,

    /// Backend failure
    #[error(transparent)]
    Rhi(#[from] RhiError),
}

impl FrameError {
    /// Returns true if the device was lost.
    pub fn is_device_lost(&self) -> bool {
        match self {
            FrameError::DeviceLost(_) => true,
            FrameError::Rhi(e) => e.is_device_lost(),
            _ => false,
        }
    }

    /// Returns true if the pipeline must be torn down and rebuilt before
    /// rendering again.
    pub fn requires_rebuild(&self) -> bool {
        self.is_device_lost() || matches!(self, FrameError::FatalStall { .. })
    }
}

/// Result type alias for frame pipeline operations.
pub type FrameResult<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lost_detection() {
        assert!(FrameError::DeviceLost(RemovalReason::Hung).is_device_lost());
        assert!(FrameError::Rhi(RhiError::DeviceLost(RemovalReason::Reset)).is_device_lost());
        assert!(!FrameError::InvalidConfig("x".into()).is_device_lost());
    }

    #[test]
    fn test_stall_requires_rebuild() {
        let stall = FrameError::FatalStall {
            frame: 4,
            waited_for: 3,
            completed: 2,
            timeout: Duration::from_millis(10),
        };
        assert!(stall.requires_rebuild());
        assert!(!stall.is_device_lost());
        assert!(!FrameError::ShutDown.requires_rebuild());
    }
}
