//! Vulkan swapchain management
//!
//! The swapchain is created once at startup with FIFO presentation and is never
//! recreated; a suboptimal or out-of-date swapchain is reported as an error.

use crate::render::backends::vulkan::{VulkanContext, VulkanError, VulkanResult};
use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

/// Clamp the window size into the extent range the surface supports
///
/// A `current_extent` other than `u32::MAX` is authoritative and wins.
pub fn clamp_extent(desired: vk::Extent2D, caps: &vk::SurfaceCapabilitiesKHR) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: desired
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: desired
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more image than the minimum, bounded by the maximum when there is one
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// Prefer sRGB BGRA8, otherwise take the first reported format
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
}

/// Map an acquire or present result, treating anything but a clean success as fatal
fn presentation_result(result: Result<bool, vk::Result>, operation: &'static str, timeout_ns: u64) -> VulkanResult<()> {
    match result {
        Ok(false) => Ok(()),
        Ok(true) => Err(VulkanError::PresentFailed(vk::Result::SUBOPTIMAL_KHR)),
        Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Err(VulkanError::Timeout {
            operation,
            waited_ms: timeout_ns / 1_000_000,
        }),
        Err(e @ vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(e @ vk::Result::ERROR_SURFACE_LOST_KHR) => {
            Err(VulkanError::PresentFailed(e))
        }
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// Swapchain wrapper with RAII cleanup
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create the swapchain for the context's surface at `window_extent`
    pub fn new(context: &VulkanContext, window_extent: vk::Extent2D) -> VulkanResult<Self> {
        let device = context.raw_device();
        let swapchain_loader = context.swapchain_loader().clone();
        let surface_loader = context.surface_loader();
        let physical_device = context.physical_device().device;
        let surface = context.surface();

        let surface_caps =
            unsafe { surface_loader.get_physical_device_surface_capabilities(physical_device, surface)? };
        let surface_formats = unsafe { surface_loader.get_physical_device_surface_formats(physical_device, surface)? };

        let format = choose_surface_format(&surface_formats).ok_or_else(|| {
            VulkanError::InitializationFailed("surface reports no formats".to_string())
        })?;
        let extent = clamp_extent(window_extent, &surface_caps);
        let image_count = choose_image_count(&surface_caps);

        // Rendered on the graphics queue, presented on the present queue.
        let families = context.queue_families();
        let shared = [families.graphics, families.present];
        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(surface_caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(vk::PresentModeKHR::FIFO)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());
        create_info = if families.graphics != families.present {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&shared)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let swapchain = unsafe { swapchain_loader.create_swapchain(&create_info, None)? };

        let images = match unsafe { swapchain_loader.get_swapchain_images(swapchain) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e.into());
            }
        };

        let mut swapchain = Self {
            device,
            swapchain_loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::with_capacity(images.len()),
            format,
            extent,
        };

        // Views pushed one at a time so Drop cleans up a partial set.
        for &image in &images {
            let view = create_color_view(&swapchain.device, image, format.format)?;
            swapchain.image_views.push(view);
        }
        swapchain.images = images;

        log::info!(
            "Created swapchain: {} images, {}x{}, {:?}, FIFO",
            swapchain.images.len(),
            extent.width,
            extent.height,
            format.format
        );

        Ok(swapchain)
    }

    /// Acquire the next image, signaling `signal` when it is ready
    pub fn acquire_next_image(&self, signal: vk::Semaphore, timeout_ns: u64) -> VulkanResult<u32> {
        let result = unsafe {
            self.swapchain_loader
                .acquire_next_image(self.swapchain, timeout_ns, signal, vk::Fence::null())
        };

        match result {
            Ok((index, false)) => Ok(index),
            other => {
                presentation_result(other.map(|(_, suboptimal)| suboptimal), "image acquisition", timeout_ns)?;
                Err(VulkanError::InvalidOperation {
                    reason: "image acquisition did not yield an image".to_string(),
                })
            }
        }
    }

    /// Present `image_index` once `wait` is signaled
    pub fn present(&self, queue: vk::Queue, image_index: u32, wait: vk::Semaphore) -> VulkanResult<()> {
        let wait_semaphores = [wait];
        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe { self.swapchain_loader.queue_present(queue, &present_info) };
        presentation_result(result, "present", 0)
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get image views
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &image_view in &self.image_views {
                self.device.destroy_image_view(image_view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// 2D color view over a single-mip, single-layer image
pub(crate) fn create_color_view(device: &Device, image: vk::Image, format: vk::Format) -> VulkanResult<vk::ImageView> {
    create_view(device, image, format, vk::ImageAspectFlags::COLOR)
}

/// 2D view over a single-mip, single-layer image
pub(crate) fn create_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> VulkanResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    Ok(unsafe { device.create_image_view(&create_info, None)? })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: (u32, u32), max: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: vk::Extent2D { width: current.0, height: current.1 },
            min_image_extent: vk::Extent2D { width: min.0, height: min.1 },
            max_image_extent: vk::Extent2D { width: max.0, height: max.1 },
            ..Default::default()
        }
    }

    #[test]
    fn test_current_extent_wins() {
        let caps = caps((1280, 720), (1, 1), (4096, 4096));
        let extent = clamp_extent(vk::Extent2D { width: 1600, height: 900 }, &caps);
        assert_eq!((extent.width, extent.height), (1280, 720));
    }

    #[test]
    fn test_desired_extent_is_clamped() {
        let caps = caps((u32::MAX, u32::MAX), (64, 64), (1024, 768));
        let extent = clamp_extent(vk::Extent2D { width: 1600, height: 10 }, &caps);
        assert_eq!((extent.width, extent.height), (1024, 64));

        let inside = clamp_extent(vk::Extent2D { width: 800, height: 600 }, &caps);
        assert_eq!((inside.width, inside.height), (800, 600));
    }

    #[test]
    fn test_image_count() {
        let mut c = caps((1, 1), (1, 1), (1, 1));
        assert_eq!(choose_image_count(&c), 3);
        c.max_image_count = 2;
        assert_eq!(choose_image_count(&c), 2);
        c.max_image_count = 0;
        assert_eq!(choose_image_count(&c), 3);
    }

    #[test]
    fn test_surface_format_preference() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        let format_of = |formats: &[vk::SurfaceFormatKHR]| choose_surface_format(formats).map(|sf| sf.format);
        assert_eq!(format_of(&[unorm, srgb]), Some(srgb.format));
        assert_eq!(format_of(&[unorm]), Some(unorm.format));
        assert_eq!(format_of(&[]), None);
    }

    #[test]
    fn test_presentation_results() {
        assert!(presentation_result(Ok(false), "present", 0).is_ok());
        assert!(matches!(
            presentation_result(Ok(true), "present", 0),
            Err(VulkanError::PresentFailed(vk::Result::SUBOPTIMAL_KHR))
        ));
        assert!(matches!(
            presentation_result(Err(vk::Result::ERROR_OUT_OF_DATE_KHR), "present", 0),
            Err(VulkanError::PresentFailed(vk::Result::ERROR_OUT_OF_DATE_KHR))
        ));
        assert!(matches!(
            presentation_result(Err(vk::Result::TIMEOUT), "image acquisition", 100_000_000),
            Err(VulkanError::Timeout { waited_ms: 100, .. })
        ));
    }
}
