//! Adapter over an externally created Vulkan logical device.

use std::ffi::CString;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ash::vk;
use tracing::{debug, error, warn};

use super::command::VulkanCommandBuffer;
use super::sync::VulkanFence;
use crate::device::{Device, RemovalReason};
use crate::error::{RhiError, RhiResult};

struct DeviceShared {
    device: ash::Device,
    queue_family_index: u32,
    debug_utils: Option<ash::ext::debug_utils::Device>,
    lost: AtomicBool,
}

/// Vulkan logical device handle shared by every object the pipeline creates.
///
/// The wrapped `ash::Device` is owned by the caller and is never destroyed
/// here; it must outlive every object created through this wrapper. The
/// device must have the `timelineSemaphore` and `dynamicRendering` features
/// enabled.
///
/// Vulkan reports loss only as `VK_ERROR_DEVICE_LOST`, without a cause, so
/// [`removal_reason`](Device::removal_reason) is always
/// [`RemovalReason::Unknown`] once lost.
#[derive(Clone)]
pub struct VulkanDevice {
    shared: Arc<DeviceShared>,
}

impl VulkanDevice {
    /// Wraps an existing logical device.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device
    /// * `queue_family_index` - Family of the queue frames are submitted to
    /// * `debug_utils` - Loader used to name objects for debug tooling, if the
    ///   instance enabled `VK_EXT_debug_utils`
    pub fn new(
        device: ash::Device,
        queue_family_index: u32,
        debug_utils: Option<ash::ext::debug_utils::Device>,
    ) -> Self {
        debug!(
            "Wrapping Vulkan device (queue family {})",
            queue_family_index
        );
        Self {
            shared: Arc::new(DeviceShared {
                device,
                queue_family_index,
                debug_utils,
                lost: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the `ash` device.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.shared.device
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.shared.queue_family_index
    }

    /// Waits until every queue of the device is idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is lost.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.check(unsafe { self.shared.device.device_wait_idle() })
    }

    /// Converts a Vulkan result, latching device loss.
    pub(crate) fn check<T>(&self, result: Result<T, vk::Result>) -> RhiResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(vk::Result::ERROR_DEVICE_LOST) => {
                if !self.shared.lost.swap(true, Ordering::AcqRel) {
                    error!("Vulkan device lost");
                }
                Err(RhiError::DeviceLost(RemovalReason::Unknown))
            }
            Err(e) => Err(RhiError::VulkanError(e)),
        }
    }

    /// Attaches a debug name to `object`.
    pub(crate) fn set_name<H: vk::Handle>(&self, object: H, name: &str) {
        let Some(debug_utils) = &self.shared.debug_utils else {
            return;
        };
        let Ok(name) = CString::new(name) else {
            warn!("Debug name {:?} contains a NUL byte", name);
            return;
        };
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_handle(object)
            .object_name(&name);
        if let Err(e) = unsafe { debug_utils.set_debug_utils_object_name(&info) } {
            warn!("Failed to name Vulkan object: {:?}", e);
        }
    }
}

impl Device for VulkanDevice {
    type CommandBuffer = VulkanCommandBuffer;
    type Fence = VulkanFence;

    fn create_command_buffer(&self, name: &str) -> RhiResult<VulkanCommandBuffer> {
        VulkanCommandBuffer::new(self.clone(), name)
    }

    fn create_fence(&self, name: &str) -> RhiResult<VulkanFence> {
        VulkanFence::new(self.clone(), name)
    }

    fn is_live(&self) -> bool {
        !self.shared.lost.load(Ordering::Acquire)
    }

    fn removal_reason(&self) -> Option<RemovalReason> {
        (!self.is_live()).then_some(RemovalReason::Unknown)
    }
}
