//! Graphics queue submission.

use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;
use tracing::trace;

use super::command::VulkanCommandBuffer;
use super::device::VulkanDevice;
use super::sync::VulkanFence;
use crate::error::RhiResult;
use crate::queue::CommandQueue;

/// Binary semaphores the next submission must wait on.
///
/// The swapchain pushes its acquire semaphore here; the queue drains the list
/// into the wait set of the next command submission.
pub(crate) type PendingWaits = Arc<Mutex<Vec<vk::Semaphore>>>;

/// The queue frames are submitted and presented on.
pub struct VulkanQueue {
    device: VulkanDevice,
    queue: vk::Queue,
    pending_waits: PendingWaits,
}

impl VulkanQueue {
    /// Wraps a queue retrieved from `device`.
    ///
    /// The queue must belong to the family passed to [`VulkanDevice::new`]
    /// and support both graphics and presentation.
    pub fn new(device: VulkanDevice, queue: vk::Queue) -> Self {
        Self {
            device,
            queue,
            pending_waits: PendingWaits::default(),
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.queue
    }

    pub(crate) fn pending_waits(&self) -> PendingWaits {
        self.pending_waits.clone()
    }

    /// Signals a binary semaphore after everything submitted so far.
    pub(crate) fn signal_binary(&mut self, semaphore: vk::Semaphore) -> RhiResult<()> {
        let signal_semaphores = [semaphore];
        let submit_info = vk::SubmitInfo::default().signal_semaphores(&signal_semaphores);
        self.submit_raw(&submit_info)
    }

    /// Blocks until the queue is idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is lost.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.device
            .check(unsafe { self.device.handle().queue_wait_idle(self.queue) })
    }

    fn submit_raw(&self, submit_info: &vk::SubmitInfo<'_>) -> RhiResult<()> {
        self.device.check(unsafe {
            self.device.handle().queue_submit(
                self.queue,
                std::slice::from_ref(submit_info),
                vk::Fence::null(),
            )
        })
    }
}

impl CommandQueue for VulkanQueue {
    type CommandBuffer = VulkanCommandBuffer;
    type Fence = VulkanFence;

    fn submit(&mut self, commands: &VulkanCommandBuffer) -> RhiResult<()> {
        let wait_semaphores: Vec<vk::Semaphore> = self.pending_waits.lock().drain(..).collect();
        let wait_stages =
            vec![vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT; wait_semaphores.len()];
        let command_buffers = [commands.handle()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers);

        trace!(
            "Submitting command buffer ({} acquire waits)",
            wait_semaphores.len()
        );
        self.submit_raw(&submit_info)
    }

    fn signal(&mut self, fence: &VulkanFence, value: u64) -> RhiResult<()> {
        let signal_semaphores = [fence.handle()];
        let signal_values = [value];
        let mut timeline_info =
            vk::TimelineSemaphoreSubmitInfo::default().signal_semaphore_values(&signal_values);
        let submit_info = vk::SubmitInfo::default()
            .signal_semaphores(&signal_semaphores)
            .push_next(&mut timeline_info);

        trace!("Signaling timeline semaphore to {}", value);
        self.submit_raw(&submit_info)
    }
}
