//! Framebuffers and the attachments shared across swapchain images
//!
//! Depth and object-id images are created once at swapchain size. Every
//! swapchain image gets a framebuffer that pairs its view with those two.

use super::swapchain::{create_view, Swapchain};
use crate::render::backends::vulkan::rendering::render_pass::{DEPTH_FORMAT, OBJECT_ID_FORMAT};
use crate::render::backends::vulkan::resources::buffer::allocate_memory;
use crate::render::backends::vulkan::{VulkanContext, VulkanResult};
use ash::{vk, Device};

/// Device-local image used as a render target
pub struct AttachmentImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    format: vk::Format,
}

impl AttachmentImage {
    /// Create a single-sample 2D attachment
    pub fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<Self> {
        let device = context.raw_device();

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe { device.create_image(&image_info, None)? };
        let requirements = unsafe { device.get_image_memory_requirements(image) };

        let memory = match allocate_memory(
            &device,
            context.memory_properties(),
            requirements,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let view = unsafe { device.bind_image_memory(image, memory, 0) }
            .map_err(Into::into)
            .and_then(|()| create_view(&device, image, format, aspect));
        let view = match view {
            Ok(view) => view,
            Err(e) => {
                unsafe {
                    device.destroy_image(image, None);
                    device.free_memory(memory, None);
                }
                return Err(e);
            }
        };

        Ok(Self {
            device,
            image,
            memory,
            view,
            format,
        })
    }

    /// Image handle
    pub fn image(&self) -> vk::Image {
        self.image
    }

    /// Image view handle
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Image format
    pub fn format(&self) -> vk::Format {
        self.format
    }
}

impl Drop for AttachmentImage {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer over `attachments`
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe { device.create_framebuffer(&create_info, None)? };
        Ok(Self { device, framebuffer })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe { self.device.destroy_framebuffer(self.framebuffer, None) };
    }
}

/// Per-swapchain-image framebuffers plus the shared depth and object-id targets
pub struct FrameTargets {
    // Framebuffers reference the attachments and go first.
    framebuffers: Vec<Framebuffer>,
    object_id: AttachmentImage,
    // Only referenced through the framebuffers.
    _depth: AttachmentImage,
    extent: vk::Extent2D,
}

impl FrameTargets {
    /// Create the shared attachments and one framebuffer per swapchain image
    pub fn new(context: &VulkanContext, swapchain: &Swapchain, render_pass: vk::RenderPass) -> VulkanResult<Self> {
        let extent = swapchain.extent();

        let depth = AttachmentImage::new(
            context,
            extent,
            DEPTH_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH,
        )?;
        let object_id = AttachmentImage::new(
            context,
            extent,
            OBJECT_ID_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
            vk::ImageAspectFlags::COLOR,
        )?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&color| {
                Framebuffer::new(
                    context.raw_device(),
                    render_pass,
                    &[color, object_id.view(), depth.view()],
                    extent,
                )
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!(
            "Created {} framebuffers with shared depth and object-id targets",
            framebuffers.len()
        );

        Ok(Self {
            framebuffers,
            object_id,
            _depth: depth,
            extent,
        })
    }

    /// Framebuffer for swapchain image `image_index`
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).map(Framebuffer::handle)
    }

    /// Object-id render target
    pub fn object_id(&self) -> &AttachmentImage {
        &self.object_id
    }

    /// Size shared by every target
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}
