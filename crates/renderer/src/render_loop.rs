//! Per-frame orchestration.
//!
//! This module provides the [`RenderLoop`], which drives one frame at a time
//! through the fixed sequence:
//!
//! ```text
//! begin_frame → acquire → to render target → record → to presentable
//!   → close → submit → signal(frame + 1) → end_frame → present
//! ```
//!
//! Fatal stalls and submission failures are followed by a device-liveness
//! check; if the device is gone the error becomes [`FrameError::DeviceLost`]
//! and the whole loop must be rebuilt.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use framepace_core::PipelineConfig;
//! use framepace_renderer::{FrameOutcome, RenderLoop};
//! use framepace_rhi::sim::{Sim, SimGpu};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gpu = SimGpu::new(2, Duration::from_millis(4))?;
//! let mut render_loop =
//!     RenderLoop::<Sim>::new(gpu.device, gpu.queue, gpu.swapchain, &PipelineConfig::default())?;
//!
//! for _ in 0..60 {
//!     let outcome = render_loop.render_frame(|frame| {
//!         frame.begin_rendering(Some(frame.clear_color()));
//!         frame.draw(3, 1);
//!         frame.end_rendering();
//!     })?;
//!     if let FrameOutcome::Presented { status, .. } = outcome {
//!         // soft statuses are informational
//!         let _ = status;
//!     }
//! }
//!
//! render_loop.shutdown();
//! # Ok(())
//! # }
//! ```

use framepace_core::PipelineConfig;
use framepace_rhi::{
    Backend, CommandQueue, CommandRecorder, Device, PresentFlags, PresentStatus, RemovalReason,
    RhiResult,
};
use tracing::{debug, error, info, trace, warn};

use crate::error::{FrameError, FrameResult};
use crate::frame_scheduler::FrameScheduler;
use crate::surface::PresentableSurface;

/// What happened to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted and presented.
    Presented {
        frame: u64,
        buffer: u32,
        status: PresentStatus,
    },
    /// The window is minimized; nothing was recorded and no counter moved.
    Skipped,
}

/// Recording context handed to the per-frame callback.
///
/// The target is already a render target when the callback runs, and is
/// transitioned back to presentable after it returns.
pub struct FrameContext<'a, C: CommandRecorder> {
    commands: &'a mut C,
    target: &'a C::Image,
    frame: u64,
    buffer: u32,
    clear_color: [f32; 4],
}

impl<'a, C: CommandRecorder> FrameContext<'a, C> {
    /// Index of the frame being recorded.
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame
    }

    /// Swapchain index of the target.
    #[inline]
    pub fn buffer_index(&self) -> u32 {
        self.buffer
    }

    /// Clear color from the pipeline configuration.
    #[inline]
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// The back-buffer this frame renders into.
    #[inline]
    pub fn target(&self) -> &'a C::Image {
        self.target
    }

    /// Raw access to the slot's recorder.
    #[inline]
    pub fn commands(&mut self) -> &mut C {
        &mut *self.commands
    }

    /// Binds the frame's target, optionally clearing it.
    pub fn begin_rendering(&mut self, clear: Option<[f32; 4]>) {
        self.commands.begin_rendering(self.target, clear);
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.commands.draw(vertex_count, instance_count);
    }

    pub fn end_rendering(&mut self) {
        self.commands.end_rendering();
    }
}

/// A complete frame pipeline over one backend.
///
/// Owns the device handle, the queue, the surface, and the scheduler with
/// its recording slots and fence. Dropping the loop runs [`shutdown`](Self::shutdown).
pub struct RenderLoop<B: Backend> {
    scheduler: Option<FrameScheduler<B::CommandBuffer, B::Fence>>,
    surface: PresentableSurface<B::Swapchain>,
    queue: B::Queue,
    device: B::Device,
    sync_interval: u32,
    present_flags: PresentFlags,
    clear_color: [f32; 4],
    minimized: bool,
}

impl<B: Backend> RenderLoop<B> {
    /// Builds the pipeline: one fence and `ring_depth` recording slots.
    ///
    /// # Arguments
    ///
    /// * `device` - Device the slots and fence are created on
    /// * `queue` - Queue frames are submitted and presented on
    /// * `swapchain` - Presentation target
    /// * `config` - Ring depth, wait timeout, sync interval and clear color
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidConfig`] for a zero ring depth or timeout,
    /// or the backend error if object creation fails.
    pub fn new(
        device: B::Device,
        queue: B::Queue,
        swapchain: B::Swapchain,
        config: &PipelineConfig,
    ) -> FrameResult<Self> {
        if config.ring_depth == 0 {
            return Err(FrameError::InvalidConfig(
                "ring_depth must be at least 1".into(),
            ));
        }

        let fence = device.create_fence("Frame Fence")?;
        let slots = (0..config.ring_depth)
            .map(|index| device.create_command_buffer(&format!("Command Allocator {index}")))
            .collect::<RhiResult<Vec<_>>>()?;
        let scheduler = FrameScheduler::new(slots, fence, config.wait_timeout())?;
        let surface = PresentableSurface::new(swapchain);

        info!(
            "Render loop created: {} frames in flight, {} buffers, sync interval {}",
            config.ring_depth,
            surface.buffer_count(),
            config.sync_interval
        );

        Ok(Self {
            scheduler: Some(scheduler),
            surface,
            queue,
            device,
            sync_interval: config.sync_interval,
            present_flags: PresentFlags::default(),
            clear_color: config.clear_color,
            minimized: false,
        })
    }

    #[inline]
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &B::Queue {
        &self.queue
    }

    #[inline]
    pub fn queue_mut(&mut self) -> &mut B::Queue {
        &mut self.queue
    }

    #[inline]
    pub fn surface(&self) -> &PresentableSurface<B::Swapchain> {
        &self.surface
    }

    #[inline]
    pub fn swapchain(&self) -> &B::Swapchain {
        self.surface.swapchain()
    }

    /// Frames submitted so far.
    pub fn frame_index(&self) -> u64 {
        self.scheduler.as_ref().map_or(0, |s| s.frame_index())
    }

    /// Frames the GPU is known to have retired.
    pub fn completed_frame_index(&self) -> u64 {
        self.scheduler
            .as_ref()
            .map_or(0, |s| s.completed_frame_index())
    }

    pub fn frames_in_flight(&self) -> u64 {
        self.scheduler.as_ref().map_or(0, |s| s.frames_in_flight())
    }

    pub fn ring_depth(&self) -> usize {
        self.scheduler.as_ref().map_or(0, |s| s.ring_depth())
    }

    /// While minimized, [`render_frame`](Self::render_frame) skips frames.
    pub fn set_minimized(&mut self, minimized: bool) {
        if self.minimized != minimized {
            debug!("Render loop minimized: {}", minimized);
            self.minimized = minimized;
        }
    }

    #[inline]
    pub fn is_minimized(&self) -> bool {
        self.minimized
    }

    pub fn set_present_flags(&mut self, flags: PresentFlags) {
        self.present_flags = flags;
    }

    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.scheduler.is_none()
    }

    /// Records, submits and presents one frame.
    ///
    /// `record` runs with the target bound as a render target and adds the
    /// frame's clears and draws.
    ///
    /// # Errors
    ///
    /// - [`FrameError::FatalStall`] if the GPU stopped retiring frames
    /// - [`FrameError::DeviceLost`] if the device is gone
    /// - [`FrameError::ShutDown`] after [`shutdown`](Self::shutdown)
    ///
    /// Every error ends the loop; soft present statuses are returned in
    /// [`FrameOutcome::Presented`] and only logged.
    pub fn render_frame<R>(&mut self, record: R) -> FrameResult<FrameOutcome>
    where
        R: FnOnce(&mut FrameContext<'_, B::CommandBuffer>),
    {
        if self.minimized {
            trace!("Minimized, skipping frame");
            return Ok(FrameOutcome::Skipped);
        }

        self.try_render_frame(record).map_err(|e| self.diagnose(e))
    }

    fn try_render_frame<R>(&mut self, record: R) -> FrameResult<FrameOutcome>
    where
        R: FnOnce(&mut FrameContext<'_, B::CommandBuffer>),
    {
        let scheduler = self.scheduler.as_mut().ok_or(FrameError::ShutDown)?;
        let frame = scheduler.frame_index();
        let slot = scheduler.begin_frame()?;

        let recorded = Self::record_and_submit(
            slot.commands_mut(),
            &mut self.surface,
            &mut self.queue,
            frame,
            self.clear_color,
            record,
        );
        let buffer = match recorded {
            Ok(buffer) => buffer,
            Err(e) => {
                self.surface.abandon_use();
                scheduler.cancel_frame();
                return Err(e);
            }
        };

        if let Err(e) = self.queue.signal(scheduler.fence(), scheduler.signal_value()) {
            scheduler.cancel_frame();
            return Err(e.into());
        }
        scheduler.end_frame();

        let status = self
            .surface
            .present(&mut self.queue, self.sync_interval, self.present_flags)?;
        match status {
            PresentStatus::Presented => {}
            PresentStatus::Occluded => debug!("Frame {} occluded", frame),
            other => warn!("Frame {} presented with status {:?}", frame, other),
        }

        Ok(FrameOutcome::Presented {
            frame,
            buffer,
            status,
        })
    }

    fn record_and_submit<R>(
        commands: &mut B::CommandBuffer,
        surface: &mut PresentableSurface<B::Swapchain>,
        queue: &mut B::Queue,
        frame: u64,
        clear_color: [f32; 4],
        record: R,
    ) -> FrameResult<u32>
    where
        R: FnOnce(&mut FrameContext<'_, B::CommandBuffer>),
    {
        let buffer = surface.acquire_current_index()?;

        commands.begin()?;
        surface.transition_to_render_target(commands, buffer);
        {
            let mut context = FrameContext {
                commands: &mut *commands,
                target: surface.buffer(buffer),
                frame,
                buffer,
                clear_color,
            };
            record(&mut context);
        }
        surface.transition_to_presentable(commands, buffer);
        commands.close()?;

        queue.submit(commands)?;
        Ok(buffer)
    }

    /// Consults the device after a failure and reports loss as such.
    fn diagnose(&self, error: FrameError) -> FrameError {
        if matches!(error, FrameError::ShutDown | FrameError::InvalidConfig(_)) {
            return error;
        }

        if error.is_device_lost() || !self.device.is_live() {
            let reason = self
                .device
                .removal_reason()
                .unwrap_or(RemovalReason::Unknown);
            error!("Device lost during frame {}: {}", self.frame_index(), reason);
            return FrameError::DeviceLost(reason);
        }

        error!("Frame {} failed: {}", self.frame_index(), error);
        error
    }

    /// Blocks until every submitted frame has retired.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::FatalStall`] or [`FrameError::DeviceLost`] if
    /// the GPU does not finish within the configured timeout.
    pub fn wait_idle(&mut self) -> FrameResult<()> {
        let Some(scheduler) = self.scheduler.as_mut() else {
            return Ok(());
        };
        scheduler.wait_idle().map_err(|e| self.diagnose(e))
    }

    /// Waits for outstanding frames if the device is live, then releases
    /// every slot and the fence.
    ///
    /// Safe to call any number of times, including before the first frame.
    pub fn shutdown(&mut self) {
        let Some(mut scheduler) = self.scheduler.take() else {
            return;
        };

        if self.device.is_live() {
            if let Err(e) = scheduler.wait_idle() {
                warn!("Outstanding frames did not retire before shutdown: {}", e);
            }
        } else {
            debug!("Device lost, releasing pipeline without waiting");
        }

        let frames = scheduler.frame_index();
        drop(scheduler);
        info!("Render loop shut down after {} frames", frames);
    }
}

impl<B: Backend> Drop for RenderLoop<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use framepace_rhi::sim::{Sim, SimGpu};

    use super::*;

    fn config(ring_depth: usize) -> PipelineConfig {
        PipelineConfig {
            ring_depth,
            wait_timeout_ms: 2000,
            ..PipelineConfig::default()
        }
    }

    fn render_loop(ring_depth: usize) -> RenderLoop<Sim> {
        let gpu = SimGpu::new(2, Duration::ZERO).expect("sim gpu");
        RenderLoop::new(gpu.device, gpu.queue, gpu.swapchain, &config(ring_depth))
            .expect("render loop")
    }

    #[test]
    fn test_zero_ring_depth_rejected() {
        let gpu = SimGpu::new(2, Duration::ZERO).expect("sim gpu");
        let result = RenderLoop::<Sim>::new(gpu.device, gpu.queue, gpu.swapchain, &config(0));
        assert!(matches!(result, Err(FrameError::InvalidConfig(_))));
    }

    #[test]
    fn test_frames_advance_counters() {
        let mut render_loop = render_loop(2);
        for expected in 0..5 {
            let outcome = render_loop.render_frame(|_| {}).expect("frame");
            match outcome {
                FrameOutcome::Presented { frame, buffer, .. } => {
                    assert_eq!(frame, expected);
                    assert_eq!(buffer as u64, expected % 2);
                }
                FrameOutcome::Skipped => panic!("frame skipped"),
            }
        }
        assert_eq!(render_loop.frame_index(), 5);
    }

    #[test]
    fn test_minimized_skips_without_moving_counters() {
        let mut render_loop = render_loop(2);
        render_loop.render_frame(|_| {}).expect("frame");

        render_loop.set_minimized(true);
        assert_eq!(
            render_loop.render_frame(|_| panic!("recorded while minimized")).expect("skip"),
            FrameOutcome::Skipped
        );
        assert_eq!(render_loop.frame_index(), 1);

        render_loop.set_minimized(false);
        render_loop.render_frame(|_| {}).expect("frame");
        assert_eq!(render_loop.frame_index(), 2);
    }

    #[test]
    fn test_context_exposes_frame_details() {
        let mut render_loop = render_loop(3);
        render_loop.render_frame(|_| {}).expect("frame");
        render_loop
            .render_frame(|frame| {
                assert_eq!(frame.frame_index(), 1);
                assert_eq!(frame.buffer_index(), 1);
                assert_eq!(frame.target().index, 1);
                assert_eq!(frame.clear_color(), PipelineConfig::default().clear_color);
            })
            .expect("frame");
    }

    #[test]
    fn test_render_after_shutdown_fails() {
        let mut render_loop = render_loop(2);
        render_loop.shutdown();
        assert!(render_loop.is_shut_down());
        assert!(matches!(
            render_loop.render_frame(|_| {}),
            Err(FrameError::ShutDown)
        ));
        render_loop.wait_idle().expect("nothing to wait for");
    }
}
