//! Simulated GPU backend.
//!
//! A software stand-in for a native device, queue and swapchain. The GPU
//! timeline runs on a worker thread, so completion really is asynchronous
//! to the render thread, and the worker validates barrier layouts the way a
//! native debug layer would.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use framepace_rhi::sim::SimGpu;
//!
//! # fn example() -> Result<(), framepace_rhi::RhiError> {
//! let gpu = SimGpu::new(2, Duration::from_millis(4))?;
//! // ... drive gpu.device / gpu.queue / gpu.swapchain ...
//! assert!(gpu.device.validation().is_clean());
//! # Ok(())
//! # }
//! ```

mod command;
mod device;
mod fence;
mod queue;
mod swapchain;
mod validation;

use std::time::Duration;

pub use command::{SimCommand, SimCommandBuffer, SimImage};
pub use device::SimDevice;
pub use fence::SimFence;
pub use queue::SimQueue;
pub use swapchain::SimSwapchain;
pub use validation::ValidationLog;

use crate::Backend;
use crate::error::{RhiError, RhiResult};

/// Marker type selecting the simulated backend.
pub enum Sim {}

impl Backend for Sim {
    type Image = SimImage;
    type CommandBuffer = SimCommandBuffer;
    type Fence = SimFence;
    type Queue = SimQueue;
    type Swapchain = SimSwapchain;
    type Device = SimDevice;
}

/// A complete simulated GPU: device, queue and swapchain sharing one timeline.
pub struct SimGpu {
    pub device: SimDevice,
    pub queue: SimQueue,
    pub swapchain: SimSwapchain,
}

impl SimGpu {
    /// Creates a simulated GPU.
    ///
    /// # Arguments
    ///
    /// * `buffer_count` - Number of swapchain back-buffers
    /// * `gpu_frame_time` - Time the GPU spends on each submitted command list
    ///
    /// # Errors
    ///
    /// Returns an error if `buffer_count` is 0 or the worker thread cannot be spawned.
    pub fn new(buffer_count: u32, gpu_frame_time: Duration) -> RhiResult<Self> {
        if buffer_count == 0 {
            return Err(RhiError::SwapchainError(
                "a swapchain needs at least one buffer".into(),
            ));
        }

        let device = SimDevice::new();
        let queue = SimQueue::new(device.clone(), gpu_frame_time)?;
        let swapchain = SimSwapchain::new(buffer_count);

        Ok(Self {
            device,
            queue,
            swapchain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandRecorder, TextureBarrier};
    use crate::device::{Device, RemovalReason};
    use crate::queue::CommandQueue;
    use crate::swapchain::{PresentFlags, PresentStatus, Swapchain};
    use crate::sync::CompletionFence;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn record_frame(cmd: &mut SimCommandBuffer, image: &SimImage) {
        cmd.reset().expect("reset");
        cmd.begin().expect("begin");
        cmd.barrier(image, &TextureBarrier::present_to_render_target());
        cmd.begin_rendering(image, Some([0.0, 0.0, 0.0, 1.0]));
        cmd.draw(3, 1);
        cmd.end_rendering();
        cmd.barrier(image, &TextureBarrier::render_target_to_present());
        cmd.close().expect("close");
    }

    #[test]
    fn test_signal_applies_after_submitted_work() {
        let mut gpu = SimGpu::new(2, Duration::from_millis(5)).expect("sim gpu");
        let fence = gpu.device.create_fence("fence").expect("fence");
        let mut cmd = gpu.device.create_command_buffer("cmd").expect("cmd");

        let index = gpu.swapchain.current_index().expect("index");
        let image = *gpu.swapchain.buffer(index);
        record_frame(&mut cmd, &image);

        gpu.queue.submit(&cmd).expect("submit");
        gpu.queue.signal(&fence, 1).expect("signal");
        let status = gpu
            .swapchain
            .present(&mut gpu.queue, 1, PresentFlags::default())
            .expect("present");
        assert_eq!(status, PresentStatus::Presented);

        fence.wait(1, TIMEOUT).expect("frame completes");
        assert_eq!(cmd.in_flight(), 0);
        assert_eq!(gpu.queue.executed(), 1);
        assert!(gpu.device.validation().is_clean());
    }

    #[test]
    fn test_paused_queue_never_signals() {
        let mut gpu = SimGpu::new(2, Duration::ZERO).expect("sim gpu");
        let fence = gpu.device.create_fence("fence").expect("fence");

        gpu.queue.pause();
        gpu.queue.signal(&fence, 1).expect("signal");
        assert!(matches!(
            fence.wait(1, Duration::from_millis(20)),
            Err(RhiError::WaitTimeout { value: 1, .. })
        ));

        gpu.queue.resume();
        fence.wait(1, TIMEOUT).expect("signaled after resume");
    }

    #[test]
    fn test_lost_device_rejects_submission() {
        let mut gpu = SimGpu::new(2, Duration::ZERO).expect("sim gpu");
        let fence = gpu.device.create_fence("fence").expect("fence");

        gpu.device.remove(RemovalReason::Hung);
        assert!(matches!(
            gpu.queue.signal(&fence, 1),
            Err(RhiError::DeviceLost(RemovalReason::Hung))
        ));
        assert!(
            gpu.swapchain
                .present(&mut gpu.queue, 1, PresentFlags::default())
                .is_err()
        );
    }

    #[test]
    fn test_unclosed_command_buffer_rejected() {
        let mut gpu = SimGpu::new(2, Duration::ZERO).expect("sim gpu");
        let mut cmd = gpu.device.create_command_buffer("cmd").expect("cmd");
        cmd.begin().expect("begin");

        assert!(matches!(
            gpu.queue.submit(&cmd),
            Err(RhiError::InvalidUsage(_))
        ));
    }

    #[test]
    fn test_swapchain_rotates_and_reports_occlusion() {
        let mut gpu = SimGpu::new(3, Duration::ZERO).expect("sim gpu");
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(gpu.swapchain.current_index().expect("index"));
            gpu.swapchain
                .present(&mut gpu.queue, 0, PresentFlags::default())
                .expect("present");
        }
        assert_eq!(seen, vec![0, 1, 2, 0]);

        gpu.swapchain.set_occluded(true);
        let status = gpu
            .swapchain
            .present(&mut gpu.queue, 0, PresentFlags::default())
            .expect("present");
        assert_eq!(status, PresentStatus::Occluded);
    }

    #[test]
    fn test_zero_buffers_rejected() {
        assert!(SimGpu::new(0, Duration::ZERO).is_err());
    }
}
