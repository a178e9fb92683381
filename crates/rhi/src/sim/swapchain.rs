//! Software flip-model swapchain.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, trace};

use super::command::SimImage;
use super::queue::SimQueue;
use crate::error::RhiResult;
use crate::swapchain::{PresentFlags, PresentStatus, Swapchain};

/// Rotates through `buffer_count` images; each present advances by one.
pub struct SimSwapchain {
    images: Vec<SimImage>,
    current: u32,
    occluded: Arc<AtomicBool>,
    present_count: u64,
}

impl SimSwapchain {
    pub(crate) fn new(buffer_count: u32) -> Self {
        debug!("Sim swapchain created with {} buffers", buffer_count);
        Self {
            images: (0..buffer_count).map(|index| SimImage { index }).collect(),
            current: 0,
            occluded: Arc::new(AtomicBool::new(false)),
            present_count: 0,
        }
    }

    /// Makes subsequent presents report [`PresentStatus::Occluded`].
    pub fn set_occluded(&self, occluded: bool) {
        self.occluded.store(occluded, Ordering::Release);
    }

    /// Present calls accepted so far.
    pub fn present_count(&self) -> u64 {
        self.present_count
    }
}

impl Swapchain for SimSwapchain {
    type Image = SimImage;
    type Queue = SimQueue;

    fn buffer_count(&self) -> u32 {
        self.images.len() as u32
    }

    fn current_index(&mut self) -> RhiResult<u32> {
        Ok(self.current)
    }

    fn buffer(&self, index: u32) -> &SimImage {
        &self.images[index as usize]
    }

    fn present(
        &mut self,
        queue: &mut SimQueue,
        sync_interval: u32,
        flags: PresentFlags,
    ) -> RhiResult<PresentStatus> {
        queue.enqueue_present(self.current)?;
        trace!(
            "Presented image {} (sync interval {}, {:?})",
            self.current, sync_interval, flags
        );

        self.current = (self.current + 1) % self.buffer_count();
        self.present_count += 1;

        if self.occluded.load(Ordering::Acquire) {
            Ok(PresentStatus::Occluded)
        } else {
            Ok(PresentStatus::Presented)
        }
    }
}
