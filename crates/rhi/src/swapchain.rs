//! Presentation engine interface.
//!
//! A swapchain owns a small, fixed set of back-buffers. At any time the
//! presentation engine designates one of them as next-to-render; the caller
//! renders into it and hands it back with [`Swapchain::present`], which
//! rotates to the next buffer.
//!
//! Creation, resizing and format selection belong to the windowing layer and
//! are not part of this trait.

use crate::error::RhiResult;

/// Outcome of a successful present call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresentStatus {
    /// The buffer was queued for display.
    Presented,
    /// Presented, but the swapchain no longer matches the surface exactly.
    Suboptimal,
    /// The surface changed and the swapchain must be recreated.
    OutOfDate,
    /// The window is hidden or minimized; nothing was shown.
    Occluded,
}

impl PresentStatus {
    /// Returns true for statuses other than [`PresentStatus::Presented`].
    ///
    /// Soft statuses are informational and never stop the frame loop.
    #[inline]
    pub fn is_soft(self) -> bool {
        !matches!(self, PresentStatus::Presented)
    }
}

/// Options passed through to the native present call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PresentFlags {
    /// Allow tearing when `sync_interval` is 0 (variable refresh displays).
    pub allow_tearing: bool,
}

/// A rotating set of presentable back-buffers.
pub trait Swapchain {
    /// Back-buffer handle.
    type Image;
    /// Queue the presentation is ordered behind.
    type Queue;

    /// Number of back-buffers.
    fn buffer_count(&self) -> u32;

    /// Returns the index of the buffer to render into next.
    ///
    /// Calling this repeatedly without presenting returns the same index.
    fn current_index(&mut self) -> RhiResult<u32>;

    /// Returns the back-buffer at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= buffer_count()`.
    fn buffer(&self, index: u32) -> &Self::Image;

    /// Presents the current buffer after all work already submitted to `queue`.
    ///
    /// # Arguments
    ///
    /// * `queue` - The queue the frame's commands were submitted to
    /// * `sync_interval` - Vertical blanks to wait for (0 disables vsync)
    /// * `flags` - Native present options
    ///
    /// # Errors
    ///
    /// Soft conditions are reported through [`PresentStatus`]; errors mean
    /// the device or the swapchain is unusable.
    fn present(
        &mut self,
        queue: &mut Self::Queue,
        sync_interval: u32,
        flags: PresentFlags,
    ) -> RhiResult<PresentStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_statuses() {
        assert!(!PresentStatus::Presented.is_soft());
        assert!(PresentStatus::Occluded.is_soft());
        assert!(PresentStatus::OutOfDate.is_soft());
        assert!(PresentStatus::Suboptimal.is_soft());
    }
}
