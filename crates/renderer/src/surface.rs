//! Presentable surface state tracking.
//!
//! Wraps a [`Swapchain`] and enforces the two-state discipline around each
//! back-buffer use: the buffer becomes a render target before anything draws
//! into it, and becomes presentable again before it is presented.
//!
//! ```text
//! acquire_current_index()
//!   → transition_to_render_target()   Presentable → RenderTarget
//!   → (clears and draws)
//!   → transition_to_presentable()     RenderTarget → Presentable
//! present()
//! ```
//!
//! Breaking the order is a programming error and trips a debug assertion.

use framepace_rhi::{
    CommandRecorder, PresentFlags, PresentStatus, RhiResult, Swapchain, TextureBarrier,
};
use tracing::{debug, trace};

/// Logical role of a back-buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferState {
    Presentable,
    RenderTarget,
}

/// Progress of the current buffer use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UseStage {
    Idle,
    Acquired,
    RenderTarget,
    Presentable,
}

/// A swapchain plus per-buffer state.
pub struct PresentableSurface<S: Swapchain> {
    swapchain: S,
    states: Vec<BufferState>,
    current: Option<u32>,
    stage: UseStage,
}

impl<S: Swapchain> PresentableSurface<S> {
    /// Wraps `swapchain`; every buffer starts presentable.
    pub fn new(swapchain: S) -> Self {
        let count = swapchain.buffer_count() as usize;
        debug!("Presentable surface created with {} buffers", count);
        Self {
            swapchain,
            states: vec![BufferState::Presentable; count],
            current: None,
            stage: UseStage::Idle,
        }
    }

    #[inline]
    pub fn swapchain(&self) -> &S {
        &self.swapchain
    }

    #[inline]
    pub fn swapchain_mut(&mut self) -> &mut S {
        &mut self.swapchain
    }

    #[inline]
    pub fn buffer_count(&self) -> u32 {
        self.states.len() as u32
    }

    /// Returns the back-buffer at `index`.
    #[inline]
    pub fn buffer(&self, index: u32) -> &S::Image {
        self.swapchain.buffer(index)
    }

    /// Logical state of buffer `index`.
    pub fn state(&self, index: u32) -> BufferState {
        self.states[index as usize]
    }

    /// Index acquired for the current use, if any.
    #[inline]
    pub fn current_index(&self) -> Option<u32> {
        self.current
    }

    /// Returns the buffer designated as next-to-render.
    ///
    /// Does not change any buffer state. Calling it again before presenting
    /// returns the same index.
    ///
    /// # Errors
    ///
    /// Returns the swapchain's error if acquisition fails.
    pub fn acquire_current_index(&mut self) -> RhiResult<u32> {
        debug_assert!(
            matches!(self.stage, UseStage::Idle | UseStage::Acquired),
            "acquire_current_index called in the middle of a buffer use ({:?})",
            self.stage
        );

        let index = self.swapchain.current_index()?;
        self.current = Some(index);
        self.stage = UseStage::Acquired;
        Ok(index)
    }

    /// Records the Presentable → RenderTarget barrier for buffer `index`.
    ///
    /// Must precede any clear or draw targeting the buffer.
    pub fn transition_to_render_target<C>(&mut self, commands: &mut C, index: u32)
    where
        C: CommandRecorder<Image = S::Image>,
    {
        debug_assert_eq!(
            self.current,
            Some(index),
            "buffer {index} is not the acquired buffer"
        );
        debug_assert_eq!(
            self.stage,
            UseStage::Acquired,
            "buffer {index} transitioned to render target twice or out of order"
        );
        debug_assert_eq!(self.states[index as usize], BufferState::Presentable);

        commands.barrier(
            self.swapchain.buffer(index),
            &TextureBarrier::present_to_render_target(),
        );
        self.states[index as usize] = BufferState::RenderTarget;
        self.stage = UseStage::RenderTarget;
        trace!("Buffer {} -> render target", index);
    }

    /// Records the RenderTarget → Presentable barrier for buffer `index`.
    ///
    /// Must follow the last clear or draw and precede [`present`](Self::present).
    pub fn transition_to_presentable<C>(&mut self, commands: &mut C, index: u32)
    where
        C: CommandRecorder<Image = S::Image>,
    {
        debug_assert_eq!(
            self.current,
            Some(index),
            "buffer {index} is not the acquired buffer"
        );
        debug_assert_eq!(
            self.stage,
            UseStage::RenderTarget,
            "buffer {index} transitioned to presentable without a render target transition"
        );
        debug_assert_eq!(self.states[index as usize], BufferState::RenderTarget);

        commands.barrier(
            self.swapchain.buffer(index),
            &TextureBarrier::render_target_to_present(),
        );
        self.states[index as usize] = BufferState::Presentable;
        self.stage = UseStage::Presentable;
        trace!("Buffer {} -> presentable", index);
    }

    /// Presents the current buffer behind the work already on `queue`.
    ///
    /// Only valid once the presentable transition for this use has been
    /// recorded and submitted.
    ///
    /// # Errors
    ///
    /// Returns the swapchain's error; soft conditions come back as a
    /// [`PresentStatus`].
    pub fn present(
        &mut self,
        queue: &mut S::Queue,
        sync_interval: u32,
        flags: PresentFlags,
    ) -> RhiResult<PresentStatus> {
        debug_assert_eq!(
            self.stage,
            UseStage::Presentable,
            "present called before the buffer was transitioned to presentable"
        );

        let status = self.swapchain.present(queue, sync_interval, flags)?;
        self.current = None;
        self.stage = UseStage::Idle;
        Ok(status)
    }

    /// Forgets a buffer use that failed before submission.
    ///
    /// Transitions recorded for it never reached the GPU, so the buffer is
    /// presentable again. The acquired index is kept.
    pub fn abandon_use(&mut self) {
        if let Some(index) = self.current
            && self.stage != UseStage::Idle
        {
            debug!("Abandoning use of buffer {}", index);
            self.states[index as usize] = BufferState::Presentable;
            self.stage = UseStage::Acquired;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use framepace_rhi::sim::{SimCommand, SimDevice, SimGpu, SimQueue, SimSwapchain};
    use framepace_rhi::{CommandQueue, Device};

    use super::*;

    struct Fixture {
        device: SimDevice,
        queue: SimQueue,
        surface: PresentableSurface<SimSwapchain>,
    }

    fn fixture() -> Fixture {
        let gpu = SimGpu::new(2, Duration::ZERO).expect("sim gpu");
        Fixture {
            device: gpu.device,
            queue: gpu.queue,
            surface: PresentableSurface::new(gpu.swapchain),
        }
    }

    #[test]
    fn test_acquire_does_not_change_state() {
        let Fixture { mut surface, .. } = fixture();
        let index = surface.acquire_current_index().expect("acquire");
        assert_eq!(surface.acquire_current_index().expect("acquire"), index);
        assert_eq!(surface.state(index), BufferState::Presentable);
    }

    #[test]
    fn test_full_use_records_paired_barriers() {
        let Fixture {
            device,
            mut queue,
            mut surface,
        } = fixture();
        let mut cmd = device.create_command_buffer("cmd").expect("cmd");

        let index = surface.acquire_current_index().expect("acquire");
        cmd.begin().expect("begin");
        surface.transition_to_render_target(&mut cmd, index);
        assert_eq!(surface.state(index), BufferState::RenderTarget);
        surface.transition_to_presentable(&mut cmd, index);
        assert_eq!(surface.state(index), BufferState::Presentable);
        cmd.close().expect("close");

        let barriers: Vec<_> = cmd
            .commands()
            .iter()
            .filter_map(|c| match c {
                SimCommand::Barrier { barrier, .. } => Some(*barrier),
                _ => None,
            })
            .collect();
        assert_eq!(
            barriers,
            vec![
                TextureBarrier::present_to_render_target(),
                TextureBarrier::render_target_to_present()
            ]
        );

        queue.submit(&cmd).expect("submit");
        let status = surface
            .present(&mut queue, 1, PresentFlags::default())
            .expect("present");
        assert_eq!(status, PresentStatus::Presented);
        assert_eq!(surface.current_index(), None);
    }

    #[test]
    fn test_abandoned_use_restores_presentable() {
        let Fixture {
            device,
            mut surface,
            ..
        } = fixture();
        let mut cmd = device.create_command_buffer("cmd").expect("cmd");

        let index = surface.acquire_current_index().expect("acquire");
        cmd.begin().expect("begin");
        surface.transition_to_render_target(&mut cmd, index);
        surface.abandon_use();

        assert_eq!(surface.state(index), BufferState::Presentable);
        assert_eq!(surface.acquire_current_index().expect("acquire"), index);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "present called before the buffer was transitioned")]
    fn test_present_without_transition_panics() {
        let Fixture {
            mut queue,
            mut surface,
            ..
        } = fixture();
        surface.acquire_current_index().expect("acquire");
        let _ = surface.present(&mut queue, 1, PresentFlags::default());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "without a render target transition")]
    fn test_presentable_transition_without_render_target_panics() {
        let Fixture {
            device,
            mut surface,
            ..
        } = fixture();
        let mut cmd = device.create_command_buffer("cmd").expect("cmd");
        let index = surface.acquire_current_index().expect("acquire");
        cmd.begin().expect("begin");
        surface.transition_to_presentable(&mut cmd, index);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "twice or out of order")]
    fn test_double_render_target_transition_panics() {
        let Fixture {
            device,
            mut surface,
            ..
        } = fixture();
        let mut cmd = device.create_command_buffer("cmd").expect("cmd");
        let index = surface.acquire_current_index().expect("acquire");
        cmd.begin().expect("begin");
        surface.transition_to_render_target(&mut cmd, index);
        surface.transition_to_render_target(&mut cmd, index);
    }
}
