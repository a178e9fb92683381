//! Command recording and resource barriers.
//!
//! A [`CommandRecorder`] is one reusable recording slot: the native command
//! allocator (or pool) together with the command list recorded from it.
//! Resetting it recycles the allocator memory, which is only legal once the
//! GPU has retired every submission that used it; the frame scheduler is
//! responsible for that guarantee.
//!
//! # Overview
//!
//! The per-frame recording sequence looks like:
//!
//! ```text
//! reset() → begin()
//!   barrier(back_buffer, TextureBarrier::present_to_render_target())
//!   begin_rendering(back_buffer, Some(clear)) → draw(..) → end_rendering()
//!   barrier(back_buffer, TextureBarrier::render_target_to_present())
//! close()
//! ```
//!
//! Barriers are described in terms of synchronization scope, access and
//! layout before and after the transition; each backend translates a
//! [`TextureBarrier`] into its native form.

use crate::error::RhiResult;

/// Pipeline work a barrier waits for or blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierSync {
    /// No GPU work; the barrier does not wait for or block anything.
    None,
    /// Render-target output (clears, color writes).
    RenderTarget,
}

/// How the resource is accessed on one side of a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierAccess {
    NoAccess,
    RenderTarget,
}

/// Memory layout of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BarrierLayout {
    /// Contents are discarded; valid as a "before" layout from any state.
    Undefined,
    RenderTarget,
    Present,
}

/// A texture state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureBarrier {
    pub sync_before: BarrierSync,
    pub sync_after: BarrierSync,
    pub access_before: BarrierAccess,
    pub access_after: BarrierAccess,
    pub layout_before: BarrierLayout,
    pub layout_after: BarrierLayout,
}

impl TextureBarrier {
    /// Back-buffer transition performed before any clear or draw.
    ///
    /// Happens after no prior GPU access and before render-target access.
    /// The previous contents are discarded.
    pub const fn present_to_render_target() -> Self {
        Self {
            sync_before: BarrierSync::None,
            sync_after: BarrierSync::RenderTarget,
            access_before: BarrierAccess::NoAccess,
            access_after: BarrierAccess::RenderTarget,
            layout_before: BarrierLayout::Undefined,
            layout_after: BarrierLayout::RenderTarget,
        }
    }

    /// Back-buffer transition performed after the last draw and before present.
    ///
    /// Happens after render-target access and before no further access.
    pub const fn render_target_to_present() -> Self {
        Self {
            sync_before: BarrierSync::RenderTarget,
            sync_after: BarrierSync::None,
            access_before: BarrierAccess::RenderTarget,
            access_after: BarrierAccess::NoAccess,
            layout_before: BarrierLayout::RenderTarget,
            layout_after: BarrierLayout::Present,
        }
    }
}

/// One ring slot's allocator and command list.
///
/// Recording methods that cannot fail natively return `()`; lifecycle
/// methods that touch the allocator return [`RhiResult`].
pub trait CommandRecorder: Send {
    /// Render target handle this recorder can barrier and render into.
    type Image;

    /// Recycles the allocator and clears previously recorded commands.
    ///
    /// # Errors
    ///
    /// Returns an error if the native reset fails. Backends with validation
    /// return [`RhiError::InvalidUsage`](crate::RhiError::InvalidUsage) when
    /// the GPU still owns the commands.
    fn reset(&mut self) -> RhiResult<()>;

    /// Starts recording into the freshly reset command list.
    fn begin(&mut self) -> RhiResult<()>;

    /// Records a state transition of `image`.
    fn barrier(&mut self, image: &Self::Image, barrier: &TextureBarrier);

    /// Binds `target` as the render target, optionally clearing it.
    fn begin_rendering(&mut self, target: &Self::Image, clear: Option<[f32; 4]>);

    /// Records a non-indexed draw against the bound pipeline state.
    fn draw(&mut self, vertex_count: u32, instance_count: u32);

    /// Unbinds the render target bound by [`begin_rendering`](Self::begin_rendering).
    fn end_rendering(&mut self);

    /// Finishes recording; the command list becomes submittable.
    fn close(&mut self) -> RhiResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_inverse() {
        let to_rt = TextureBarrier::present_to_render_target();
        let to_present = TextureBarrier::render_target_to_present();

        assert_eq!(to_rt.sync_after, to_present.sync_before);
        assert_eq!(to_rt.access_after, to_present.access_before);
        assert_eq!(to_rt.layout_after, to_present.layout_before);
        assert_eq!(to_present.layout_after, BarrierLayout::Present);
    }

    #[test]
    fn test_render_target_transition_discards_contents() {
        let to_rt = TextureBarrier::present_to_render_target();
        assert_eq!(to_rt.layout_before, BarrierLayout::Undefined);
        assert_eq!(to_rt.sync_before, BarrierSync::None);
        assert_eq!(to_rt.access_before, BarrierAccess::NoAccess);
    }
}
