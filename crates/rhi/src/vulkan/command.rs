//! Per-slot command pool and command buffer.

use ash::vk;
use tracing::debug;

use super::device::VulkanDevice;
use crate::command::{BarrierAccess, BarrierLayout, BarrierSync, CommandRecorder, TextureBarrier};
use crate::error::RhiResult;

/// A swapchain image together with the view rendered through.
///
/// Both handles belong to the swapchain owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulkanImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
}

/// One ring slot: a dedicated command pool and the primary buffer allocated from it.
///
/// [`reset`](CommandRecorder::reset) resets the whole pool, which recycles
/// its memory and returns the buffer to the initial state.
pub struct VulkanCommandBuffer {
    device: VulkanDevice,
    pool: vk::CommandPool,
    buffer: vk::CommandBuffer,
}

impl VulkanCommandBuffer {
    /// Creates the pool and allocates one primary command buffer from it.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation or allocation fails.
    pub fn new(device: VulkanDevice, name: &str) -> RhiResult<Self> {
        let create_info =
            vk::CommandPoolCreateInfo::default().queue_family_index(device.queue_family_index());
        let pool =
            device.check(unsafe { device.handle().create_command_pool(&create_info, None) })?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let allocated =
            device.check(unsafe { device.handle().allocate_command_buffers(&alloc_info) });
        let buffers = match allocated {
            Ok(buffers) => buffers,
            Err(e) => {
                unsafe { device.handle().destroy_command_pool(pool, None) };
                return Err(e);
            }
        };
        let buffer = buffers[0];

        device.set_name(pool, name);
        device.set_name(buffer, name);
        debug!("Created command pool '{}'", name);

        Ok(Self {
            device,
            pool,
            buffer,
        })
    }

    /// Returns the raw command buffer, for recording commands this wrapper
    /// does not cover (pipeline binds, push constants).
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }
}

fn stage_before(sync: BarrierSync) -> vk::PipelineStageFlags {
    match sync {
        // Chains with the acquire semaphore wait at COLOR_ATTACHMENT_OUTPUT.
        BarrierSync::None => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
        BarrierSync::RenderTarget => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    }
}

fn stage_after(sync: BarrierSync) -> vk::PipelineStageFlags {
    match sync {
        BarrierSync::None => vk::PipelineStageFlags::BOTTOM_OF_PIPE,
        BarrierSync::RenderTarget => vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
    }
}

fn access(access: BarrierAccess) -> vk::AccessFlags {
    match access {
        BarrierAccess::NoAccess => vk::AccessFlags::empty(),
        BarrierAccess::RenderTarget => vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
    }
}

fn layout(layout: BarrierLayout) -> vk::ImageLayout {
    match layout {
        BarrierLayout::Undefined => vk::ImageLayout::UNDEFINED,
        BarrierLayout::RenderTarget => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        BarrierLayout::Present => vk::ImageLayout::PRESENT_SRC_KHR,
    }
}

impl CommandRecorder for VulkanCommandBuffer {
    type Image = VulkanImage;

    fn reset(&mut self) -> RhiResult<()> {
        self.device.check(unsafe {
            self.device
                .handle()
                .reset_command_pool(self.pool, vk::CommandPoolResetFlags::empty())
        })
    }

    fn begin(&mut self) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        self.device.check(unsafe {
            self.device
                .handle()
                .begin_command_buffer(self.buffer, &begin_info)
        })
    }

    fn barrier(&mut self, image: &VulkanImage, barrier: &TextureBarrier) {
        let image_barrier = vk::ImageMemoryBarrier::default()
            .old_layout(layout(barrier.layout_before))
            .new_layout(layout(barrier.layout_after))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image.image)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            )
            .src_access_mask(access(barrier.access_before))
            .dst_access_mask(access(barrier.access_after));

        unsafe {
            self.device.handle().cmd_pipeline_barrier(
                self.buffer,
                stage_before(barrier.sync_before),
                stage_after(barrier.sync_after),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[image_barrier],
            );
        }
    }

    fn begin_rendering(&mut self, target: &VulkanImage, clear: Option<[f32; 4]>) {
        let mut color_attachment = vk::RenderingAttachmentInfo::default()
            .image_view(target.view)
            .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .load_op(vk::AttachmentLoadOp::LOAD)
            .store_op(vk::AttachmentStoreOp::STORE);
        if let Some(color) = clear {
            color_attachment = color_attachment
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue { float32: color },
                });
        }

        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: target.extent,
        };
        let rendering_info = vk::RenderingInfo::default()
            .render_area(render_area)
            .layer_count(1)
            .color_attachments(std::slice::from_ref(&color_attachment));

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: target.extent.width as f32,
            height: target.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };

        unsafe {
            let device = self.device.handle();
            device.cmd_begin_rendering(self.buffer, &rendering_info);
            device.cmd_set_viewport(self.buffer, 0, &[viewport]);
            device.cmd_set_scissor(self.buffer, 0, &[render_area]);
        }
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        unsafe {
            self.device
                .handle()
                .cmd_draw(self.buffer, vertex_count, instance_count, 0, 0);
        }
    }

    fn end_rendering(&mut self) {
        unsafe {
            self.device.handle().cmd_end_rendering(self.buffer);
        }
    }

    fn close(&mut self) -> RhiResult<()> {
        self.device
            .check(unsafe { self.device.handle().end_command_buffer(self.buffer) })
    }
}

impl Drop for VulkanCommandBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
        debug!("Destroyed command pool");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_target_transition_mapping() {
        let barrier = TextureBarrier::present_to_render_target();
        assert_eq!(layout(barrier.layout_before), vk::ImageLayout::UNDEFINED);
        assert_eq!(
            layout(barrier.layout_after),
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
        );
        assert_eq!(access(barrier.access_before), vk::AccessFlags::empty());
        assert_eq!(
            access(barrier.access_after),
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE
        );
        assert_eq!(
            stage_after(barrier.sync_after),
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        );
    }

    #[test]
    fn test_present_transition_mapping() {
        let barrier = TextureBarrier::render_target_to_present();
        assert_eq!(
            layout(barrier.layout_after),
            vk::ImageLayout::PRESENT_SRC_KHR
        );
        assert_eq!(
            stage_after(barrier.sync_after),
            vk::PipelineStageFlags::BOTTOM_OF_PIPE
        );
        assert_eq!(access(barrier.access_after), vk::AccessFlags::empty());
    }

    #[test]
    fn test_command_buffer_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<VulkanCommandBuffer>();
    }
}
