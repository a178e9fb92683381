//! Vulkan backend.
//!
//! Adapts objects created by the application (device, queue, swapchain) to
//! the RHI traits. The completion fence is a timeline semaphore, each ring
//! slot owns its own command pool, and rendering uses dynamic rendering, so
//! the device needs Vulkan 1.3 or the equivalent extensions.
//!
//! # Example
//!
//! ```no_run
//! use ash::vk;
//! use framepace_rhi::vulkan::{VulkanDevice, VulkanQueue, VulkanSwapchain, VulkanImage};
//!
//! # fn example(
//! #     device: ash::Device,
//! #     family: u32,
//! #     loader: ash::khr::swapchain::Device,
//! #     swapchain: vk::SwapchainKHR,
//! #     images: Vec<VulkanImage>,
//! # ) -> Result<(), framepace_rhi::RhiError> {
//! let raw_queue = unsafe { device.get_device_queue(family, 0) };
//! let device = VulkanDevice::new(device, family, None);
//! let queue = VulkanQueue::new(device.clone(), raw_queue);
//! let swapchain = VulkanSwapchain::new(device.clone(), loader, swapchain, images, &queue, 2)?;
//! # Ok(())
//! # }
//! ```

mod command;
mod device;
mod queue;
mod swapchain;
mod sync;

pub use command::{VulkanCommandBuffer, VulkanImage};
pub use device::VulkanDevice;
pub use queue::VulkanQueue;
pub use swapchain::VulkanSwapchain;
pub use sync::VulkanFence;

use crate::Backend;

/// Marker type selecting the Vulkan backend.
pub enum Vulkan {}

impl Backend for Vulkan {
    type Image = VulkanImage;
    type CommandBuffer = VulkanCommandBuffer;
    type Fence = VulkanFence;
    type Queue = VulkanQueue;
    type Swapchain = VulkanSwapchain;
    type Device = VulkanDevice;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_objects_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<VulkanDevice>();
        assert_send_sync::<VulkanFence>();
    }

    #[test]
    fn test_per_thread_objects_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<VulkanQueue>();
        assert_send::<VulkanSwapchain>();
    }
}
