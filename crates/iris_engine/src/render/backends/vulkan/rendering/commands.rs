//! Command buffer management
//!
//! Command pool plus a recorder whose render-pass scope ends when the
//! [`ActiveRenderPass`] guard drops.

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Command pool wrapper with RAII cleanup
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually
    pub fn new(device: Device, queue_family_index: u32) -> VulkanResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe { device.create_command_pool(&pool_create_info, None)? };

        Ok(Self { device, command_pool })
    }

    /// Allocate one primary command buffer
    pub fn allocate_command_buffer(&self) -> VulkanResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { self.device.allocate_command_buffers(&alloc_info)? };
        buffers.into_iter().next().ok_or_else(|| VulkanError::InvalidOperation {
            reason: "driver returned no command buffer".to_string(),
        })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        // Frees every buffer allocated from the pool.
        unsafe { self.device.destroy_command_pool(self.command_pool, None) };
    }
}

/// Records into one command buffer between `begin` and `end`
pub struct CommandRecorder {
    command_buffer: vk::CommandBuffer,
    device: Device,
}

impl CommandRecorder {
    /// Reset the buffer and begin a one-time-submit recording
    pub fn begin(device: Device, command_buffer: vk::CommandBuffer) -> VulkanResult<Self> {
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
            device.begin_command_buffer(command_buffer, &begin_info)?;
        }

        Ok(Self { command_buffer, device })
    }

    /// Begin a render pass; it ends when the returned guard drops
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> ActiveRenderPass<'_> {
        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device
                .cmd_begin_render_pass(self.command_buffer, &render_pass_begin, vk::SubpassContents::INLINE);
        }

        ActiveRenderPass { recorder: self }
    }

    /// Copy a region of an image into a buffer
    pub fn copy_image_to_buffer(
        &mut self,
        image: vk::Image,
        layout: vk::ImageLayout,
        buffer: vk::Buffer,
        region: vk::BufferImageCopy,
    ) {
        unsafe {
            self.device
                .cmd_copy_image_to_buffer(self.command_buffer, image, layout, buffer, &[region]);
        }
    }

    /// Memory barrier between two pipeline stages
    pub fn memory_barrier(
        &mut self,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barrier: vk::MemoryBarrier,
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[barrier],
                &[],
                &[],
            );
        }
    }

    /// Finish recording
    pub fn end(self) -> VulkanResult<vk::CommandBuffer> {
        unsafe { self.device.end_command_buffer(self.command_buffer)? };
        Ok(self.command_buffer)
    }
}

/// Render pass scope; ends the pass on drop
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
}

impl ActiveRenderPass<'_> {
    fn cmd(&self) -> vk::CommandBuffer {
        self.recorder.command_buffer
    }

    /// Set viewport
    pub fn set_viewport(&mut self, viewport: vk::Viewport) {
        unsafe { self.recorder.device.cmd_set_viewport(self.cmd(), 0, &[viewport]) };
    }

    /// Set scissor
    pub fn set_scissor(&mut self, scissor: vk::Rect2D) {
        unsafe { self.recorder.device.cmd_set_scissor(self.cmd(), 0, &[scissor]) };
    }

    /// Bind a graphics pipeline
    pub fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.recorder
                .device
                .cmd_bind_pipeline(self.cmd(), vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    /// Bind descriptor sets starting at set 0
    pub fn bind_descriptor_sets(&mut self, layout: vk::PipelineLayout, sets: &[vk::DescriptorSet]) {
        unsafe {
            self.recorder.device.cmd_bind_descriptor_sets(
                self.cmd(),
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                sets,
                &[],
            );
        }
    }

    /// Push constants to shaders
    pub fn push_constants(&mut self, layout: vk::PipelineLayout, stages: vk::ShaderStageFlags, offset: u32, data: &[u8]) {
        unsafe {
            self.recorder
                .device
                .cmd_push_constants(self.cmd(), layout, stages, offset, data);
        }
    }

    /// Bind one vertex buffer at binding 0 and a u32 index buffer
    pub fn bind_geometry(&mut self, vertex_buffer: vk::Buffer, index_buffer: vk::Buffer) {
        unsafe {
            self.recorder
                .device
                .cmd_bind_vertex_buffers(self.cmd(), 0, &[vertex_buffer], &[0]);
            self.recorder
                .device
                .cmd_bind_index_buffer(self.cmd(), index_buffer, 0, vk::IndexType::UINT32);
        }
    }

    /// Draw indexed
    pub fn draw_indexed(&mut self, index_count: u32) {
        unsafe {
            self.recorder
                .device
                .cmd_draw_indexed(self.cmd(), index_count, 1, 0, 0, 0);
        }
    }

    /// Draw without vertex buffers
    pub fn draw(&mut self, vertex_count: u32) {
        unsafe { self.recorder.device.cmd_draw(self.cmd(), vertex_count, 1, 0, 0) };
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe { self.recorder.device.cmd_end_render_pass(self.cmd()) };
    }
}
