//! Timeline-semaphore completion fence.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use ash::vk;
use tracing::{debug, warn};

use super::device::VulkanDevice;
use crate::error::{RhiError, RhiResult};
use crate::sync::CompletionFence;

/// A `VK_SEMAPHORE_TYPE_TIMELINE` semaphore used as the frame fence.
///
/// The queue signals it through a timeline submit; the host polls and waits
/// on its counter directly.
pub struct VulkanFence {
    device: VulkanDevice,
    semaphore: vk::Semaphore,
    /// Last value read back, returned if a later read fails.
    last_seen: AtomicU64,
}

impl VulkanFence {
    /// Creates a timeline semaphore with initial value 0.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: VulkanDevice, name: &str) -> RhiResult<Self> {
        let mut type_info = vk::SemaphoreTypeCreateInfo::default()
            .semaphore_type(vk::SemaphoreType::TIMELINE)
            .initial_value(0);
        let create_info = vk::SemaphoreCreateInfo::default().push_next(&mut type_info);

        let semaphore =
            device.check(unsafe { device.handle().create_semaphore(&create_info, None) })?;
        device.set_name(semaphore, name);

        debug!("Created timeline semaphore '{}'", name);

        Ok(Self {
            device,
            semaphore,
            last_seen: AtomicU64::new(0),
        })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl CompletionFence for VulkanFence {
    fn completed_value(&self) -> u64 {
        let read = unsafe {
            self.device
                .handle()
                .get_semaphore_counter_value(self.semaphore)
        };
        match self.device.check(read) {
            Ok(value) => self.last_seen.fetch_max(value, Ordering::AcqRel).max(value),
            Err(e) => {
                warn!("Failed to read timeline semaphore: {}", e);
                self.last_seen.load(Ordering::Acquire)
            }
        }
    }

    fn wait(&self, value: u64, timeout: Duration) -> RhiResult<()> {
        if self.completed_value() >= value {
            return Ok(());
        }

        let semaphores = [self.semaphore];
        let values = [value];
        let wait_info = vk::SemaphoreWaitInfo::default()
            .semaphores(&semaphores)
            .values(&values);
        let timeout_ns = u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX);

        match unsafe { self.device.handle().wait_semaphores(&wait_info, timeout_ns) } {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(RhiError::WaitTimeout {
                value,
                completed: self.completed_value(),
                timeout,
            }),
            Err(e) => self.device.check(Err(e)),
        }
    }
}

impl Drop for VulkanFence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
        debug!("Destroyed timeline semaphore");
    }
}
