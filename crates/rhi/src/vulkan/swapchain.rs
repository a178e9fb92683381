//! Presentation through `VK_KHR_swapchain`.

use ash::vk;
use tracing::{debug, trace, warn};

use super::command::VulkanImage;
use super::device::VulkanDevice;
use super::queue::{PendingWaits, VulkanQueue};
use crate::error::{RhiError, RhiResult};
use crate::swapchain::{PresentFlags, PresentStatus, Swapchain};

/// Adapter over an externally created swapchain.
///
/// Vulkan hands out images through `vkAcquireNextImageKHR` instead of a
/// fixed rotation, so [`current_index`](Swapchain::current_index) acquires
/// lazily and keeps the index until the next present. The acquire semaphore
/// is queued as a wait for the next command submission; a per-image
/// semaphore signaled after the frame's work gates the present.
///
/// The swapchain, its images and views stay owned by the caller; only the
/// semaphores created here are destroyed on drop, which requires the queue
/// to be idle.
pub struct VulkanSwapchain {
    device: VulkanDevice,
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<VulkanImage>,
    acquire_semaphores: Vec<vk::Semaphore>,
    next_acquire: usize,
    render_finished: Vec<vk::Semaphore>,
    current: Option<u32>,
    pending_waits: PendingWaits,
}

impl VulkanSwapchain {
    /// Wraps `swapchain` and creates the semaphores presentation needs.
    ///
    /// # Arguments
    ///
    /// * `device` - The device the swapchain was created on
    /// * `loader` - Swapchain extension loader
    /// * `swapchain` - The swapchain handle
    /// * `images` - Its images with views, in swapchain order
    /// * `queue` - The queue frames are submitted and presented on
    /// * `frames_in_flight` - Ring depth of the frame scheduler
    ///
    /// # Errors
    ///
    /// Returns an error if `images` is empty or semaphore creation fails.
    pub fn new(
        device: VulkanDevice,
        loader: ash::khr::swapchain::Device,
        swapchain: vk::SwapchainKHR,
        images: Vec<VulkanImage>,
        queue: &VulkanQueue,
        frames_in_flight: usize,
    ) -> RhiResult<Self> {
        if images.is_empty() {
            return Err(RhiError::SwapchainError("swapchain has no images".into()));
        }

        // An acquire semaphore is reused only after the frame that waited on
        // it has been retired by the scheduler.
        let acquire_count = images.len().max(frames_in_flight);
        let mut this = Self {
            device,
            loader,
            swapchain,
            images,
            acquire_semaphores: Vec::with_capacity(acquire_count),
            next_acquire: 0,
            render_finished: Vec::new(),
            current: None,
            pending_waits: queue.pending_waits(),
        };

        for index in 0..acquire_count {
            let semaphore = this.create_semaphore(&format!("Acquire Semaphore {index}"))?;
            this.acquire_semaphores.push(semaphore);
        }
        for index in 0..this.images.len() {
            let semaphore = this.create_semaphore(&format!("Render Finished {index}"))?;
            this.render_finished.push(semaphore);
        }

        debug!(
            "Swapchain adapter created ({} images, {} acquire semaphores)",
            this.images.len(),
            acquire_count
        );

        Ok(this)
    }

    fn create_semaphore(&self, name: &str) -> RhiResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::default();
        let semaphore = self
            .device
            .check(unsafe { self.device.handle().create_semaphore(&create_info, None) })?;
        self.device.set_name(semaphore, name);
        Ok(semaphore)
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }
}

impl Swapchain for VulkanSwapchain {
    type Image = VulkanImage;
    type Queue = VulkanQueue;

    fn buffer_count(&self) -> u32 {
        self.images.len() as u32
    }

    fn current_index(&mut self) -> RhiResult<u32> {
        if let Some(index) = self.current {
            return Ok(index);
        }

        let semaphore = self.acquire_semaphores[self.next_acquire];
        let acquired = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, u64::MAX, semaphore, vk::Fence::null())
        };
        let (index, suboptimal) = match acquired {
            Ok(result) => result,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                return Err(RhiError::SwapchainError(
                    "swapchain out of date at acquire".into(),
                ));
            }
            Err(e) => return self.device.check(Err(e)),
        };
        if suboptimal {
            debug!("Acquired image {} from a suboptimal swapchain", index);
        }

        self.pending_waits.lock().push(semaphore);
        self.next_acquire = (self.next_acquire + 1) % self.acquire_semaphores.len();
        self.current = Some(index);
        Ok(index)
    }

    fn buffer(&self, index: u32) -> &VulkanImage {
        &self.images[index as usize]
    }

    fn present(
        &mut self,
        queue: &mut VulkanQueue,
        sync_interval: u32,
        flags: PresentFlags,
    ) -> RhiResult<PresentStatus> {
        let index = self.current.take().ok_or_else(|| {
            RhiError::InvalidUsage("present called without an acquired image".into())
        })?;

        let render_finished = self.render_finished[index as usize];
        queue.signal_binary(render_finished)?;

        // Vsync and tearing are fixed by the present mode chosen at creation.
        trace!(
            "Presenting image {} (sync interval {}, {:?})",
            index, sync_interval, flags
        );

        let swapchains = [self.swapchain];
        let image_indices = [index];
        let wait_semaphores = [render_finished];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { self.loader.queue_present(queue.handle(), &present_info) } {
            Ok(false) => Ok(PresentStatus::Presented),
            Ok(true) => Ok(PresentStatus::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentStatus::OutOfDate),
            Err(vk::Result::ERROR_SURFACE_LOST_KHR) => {
                warn!("Surface lost during present");
                Err(RhiError::SwapchainError("surface lost".into()))
            }
            Err(e) => self.device.check(Err(e)),
        }
    }
}

impl Drop for VulkanSwapchain {
    fn drop(&mut self) {
        unsafe {
            for &semaphore in self
                .acquire_semaphores
                .iter()
                .chain(self.render_finished.iter())
            {
                self.device.handle().destroy_semaphore(semaphore, None);
            }
        }
        debug!("Swapchain adapter destroyed");
    }
}
