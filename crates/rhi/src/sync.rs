//! CPU-GPU completion tracking.
//!
//! A [`CompletionFence`] is a single 64-bit counter that the GPU queue
//! advances as it retires work. The CPU never sets it directly: it asks the
//! queue to signal a value (see [`CommandQueue::signal`]) and later waits for
//! the counter to reach it.
//!
//! # Overview
//!
//! ```text
//! CPU:  submit(frame 0) signal(1)  submit(frame 1) signal(2)  wait(1) ...
//! GPU:        [ frame 0 ]──► counter = 1  [ frame 1 ]──► counter = 2
//! ```
//!
//! Signaled values are strictly increasing, so a wait on `V` is satisfied by
//! any observed value `>= V`. Waits always take a finite timeout: a value
//! whose signal was never enqueued (for instance after a failed submission)
//! must surface as [`RhiError::WaitTimeout`] instead of blocking forever.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use framepace_rhi::sync::CompletionFence;
//!
//! # fn example(fence: &impl CompletionFence) -> Result<(), framepace_rhi::RhiError> {
//! // Block until the GPU has finished everything up to value 5
//! fence.wait(5, Duration::from_millis(100))?;
//! assert!(fence.completed_value() >= 5);
//! # Ok(())
//! # }
//! ```
//!
//! [`CommandQueue::signal`]: crate::queue::CommandQueue::signal
//! [`RhiError::WaitTimeout`]: crate::RhiError::WaitTimeout

use std::time::Duration;

use crate::error::RhiResult;

/// Monotonic GPU completion counter.
///
/// # Thread Safety
///
/// The counter is written by the GPU timeline and read by the CPU, so
/// implementations must be `Send + Sync`.
pub trait CompletionFence: Send + Sync {
    /// Returns the highest value observed so far.
    ///
    /// Non-blocking. Never returns a smaller value than an earlier call.
    fn completed_value(&self) -> u64;

    /// Blocks until the counter reaches `value` or `timeout` elapses.
    ///
    /// Returns immediately if [`completed_value`](Self::completed_value) is
    /// already at least `value`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::WaitTimeout`](crate::RhiError::WaitTimeout) if the
    /// timeout elapses first, or a backend error if the wait itself fails.
    fn wait(&self, value: u64, timeout: Duration) -> RhiResult<()>;

    /// Returns true if the counter has reached `value`.
    #[inline]
    fn is_complete(&self, value: u64) -> bool {
        self.completed_value() >= value
    }
}
