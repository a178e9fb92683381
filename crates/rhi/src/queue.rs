//! GPU command queue.
//!
//! The queue is the only path from the CPU timeline to the GPU timeline.
//! Work is executed in submission order, and a fence signal enqueued after a
//! submission is only applied once that submission (and everything before
//! it) has retired.

use crate::error::RhiResult;

/// A single in-order GPU queue.
pub trait CommandQueue {
    type CommandBuffer;
    type Fence;

    /// Submits a closed command list for execution.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::DeviceLost`](crate::RhiError::DeviceLost) if the
    /// device is gone, or a backend error if submission fails.
    fn submit(&mut self, commands: &Self::CommandBuffer) -> RhiResult<()>;

    /// Enqueues a signal that sets `fence` to `value` once all previously
    /// submitted work has completed.
    ///
    /// Values must be strictly increasing per fence.
    fn signal(&mut self, fence: &Self::Fence, value: u64) -> RhiResult<()>;
}
