//! Device liveness and object creation.
//!
//! Creating the native device (adapter selection, feature negotiation) is left
//! to the caller. The [`Device`] trait covers what the frame pipeline needs
//! from an existing device: named factories for the per-slot recording objects
//! and the completion fence, and a liveness check consulted after any fatal
//! wait or submission failure.

use std::fmt;

use crate::command::CommandRecorder;
use crate::error::RhiResult;
use crate::sync::CompletionFence;

/// Why a device stopped being usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalReason {
    /// The GPU took too long to execute submitted work.
    Hung,
    /// The adapter was physically removed or disabled.
    Removed,
    /// The device was reset, typically after a hang elsewhere.
    Reset,
    /// The driver hit an internal error.
    DriverInternalError,
    /// Submitted work contained an invalid call.
    InvalidCall,
    /// The backend reports loss without a reason.
    Unknown,
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RemovalReason::Hung => "device hung",
            RemovalReason::Removed => "device removed",
            RemovalReason::Reset => "device reset",
            RemovalReason::DriverInternalError => "driver internal error",
            RemovalReason::InvalidCall => "invalid call",
            RemovalReason::Unknown => "unknown reason",
        };
        f.write_str(text)
    }
}

/// A logical device the pipeline records and synchronizes against.
///
/// # Thread Safety
///
/// Devices are shared between the render thread and whatever owns the window,
/// so implementations must be `Send + Sync`.
pub trait Device: Send + Sync {
    /// Allocator + command list pair used for one ring slot.
    type CommandBuffer: CommandRecorder;
    /// Monotonic completion counter signaled by the queue.
    type Fence: CompletionFence;

    /// Creates one recording slot's command buffer.
    ///
    /// # Arguments
    ///
    /// * `name` - Debug name used in logs and native debug tooling
    ///
    /// # Errors
    ///
    /// Returns an error if the native allocation fails.
    fn create_command_buffer(&self, name: &str) -> RhiResult<Self::CommandBuffer>;

    /// Creates a completion fence whose counter starts at 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the native allocation fails.
    fn create_fence(&self, name: &str) -> RhiResult<Self::Fence>;

    /// Returns false once the device has been removed, reset or hung.
    fn is_live(&self) -> bool;

    /// Why the device was lost, or `None` while it is live.
    fn removal_reason(&self) -> Option<RemovalReason>;
}
