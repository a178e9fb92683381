//! RHI-specific error types.

use std::time::Duration;

use thiserror::Error;

use crate::device::RemovalReason;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    /// A completion wait ran past its timeout
    #[error(
        "Timed out after {timeout:?} waiting for fence value {value} (completed value: {completed})"
    )]
    WaitTimeout {
        value: u64,
        completed: u64,
        timeout: Duration,
    },

    /// The device was removed or reset and every object created from it is invalid
    #[error("Device lost: {0}")]
    DeviceLost(RemovalReason),

    /// A recording object was used out of order (e.g. reset while the GPU still owns it)
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Backend object could not be created
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}

impl RhiError {
    /// Returns true if this error means the device is gone.
    pub fn is_device_lost(&self) -> bool {
        matches!(
            self,
            RhiError::DeviceLost(_) | RhiError::VulkanError(ash::vk::Result::ERROR_DEVICE_LOST)
        )
    }
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
