//! Sampled textures decoded from image files
//!
//! Pixels are decoded with the `image` crate into the 8-bit layout the
//! texture's [`TextureEncoding`] asks for, copied into a staging buffer and
//! moved into a device-local image on the transfer queue:
//! UNDEFINED → TRANSFER_DST_OPTIMAL, buffer copy, → SHADER_READ_ONLY_OPTIMAL.
//!
//! Decode failures are returned as [`VulkanError::TextureLoad`]; nothing is
//! uploaded for a texture that did not decode.

use super::buffer::{allocate_memory, Buffer};
use crate::render::backends::vulkan::state::swapchain::create_color_view;
use crate::render::backends::vulkan::upload::UploadContext;
use crate::render::backends::vulkan::{VulkanContext, VulkanError, VulkanResult};
use crate::render::material::TextureEncoding;
use ash::{vk, Device};
use std::path::Path;

/// GPU format for a texture encoding
pub fn encoding_format(encoding: TextureEncoding) -> vk::Format {
    match encoding {
        TextureEncoding::Srgb => vk::Format::R8G8B8A8_SRGB,
        TextureEncoding::Linear => vk::Format::R8G8B8A8_UNORM,
        TextureEncoding::SingleChannel => vk::Format::R8_UNORM,
    }
}

/// Decoded pixels ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexturePixels {
    /// Width in texels
    pub width: u32,
    /// Height in texels
    pub height: u32,
    /// Tightly packed rows in the encoding's layout
    pub data: Vec<u8>,
}

impl TexturePixels {
    /// Convert a decoded image into the encoding's texel layout
    pub fn from_image(image: &image::DynamicImage, encoding: TextureEncoding) -> Self {
        let (width, height, data) = match encoding {
            TextureEncoding::Srgb | TextureEncoding::Linear => {
                let rgba = image.to_rgba8();
                (rgba.width(), rgba.height(), rgba.into_raw())
            }
            TextureEncoding::SingleChannel => {
                let luma = image.to_luma8();
                (luma.width(), luma.height(), luma.into_raw())
            }
        };
        Self { width, height, data }
    }

    /// Open and decode an image file
    pub fn load(path: &Path, encoding: TextureEncoding) -> VulkanResult<Self> {
        let image = image::open(path).map_err(|e| VulkanError::TextureLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let pixels = Self::from_image(&image, encoding);
        if pixels.width == 0 || pixels.height == 0 {
            return Err(VulkanError::TextureLoad {
                path: path.display().to_string(),
                reason: "image has no pixels".to_string(),
            });
        }
        Ok(pixels)
    }

    fn extent(&self) -> vk::Extent3D {
        vk::Extent3D {
            width: self.width,
            height: self.height,
            depth: 1,
        }
    }
}

const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

/// Device-local sampled image with its view and sampler
pub struct Texture {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    image_view: vk::ImageView,
    sampler: vk::Sampler,
    extent: vk::Extent2D,
    format: vk::Format,
}

impl Texture {
    /// Decode `path` and upload it through the transfer queue
    pub fn from_file(
        context: &VulkanContext,
        upload: &UploadContext,
        path: &Path,
        encoding: TextureEncoding,
    ) -> VulkanResult<Self> {
        let pixels = TexturePixels::load(path, encoding)?;
        let texture = Self::from_pixels(context, upload, &pixels, encoding_format(encoding))?;
        log::debug!(
            "Uploaded texture {} ({}x{}, {:?})",
            path.display(),
            pixels.width,
            pixels.height,
            texture.format
        );
        Ok(texture)
    }

    /// Upload already decoded pixels
    pub fn from_pixels(
        context: &VulkanContext,
        upload: &UploadContext,
        pixels: &TexturePixels,
        format: vk::Format,
    ) -> VulkanResult<Self> {
        let staging = Buffer::staging(context, &pixels.data)?;
        let texture = Self::create_image(context, pixels.extent(), format)?;

        let image = texture.image;
        let extent = pixels.extent();
        upload.submit_command(|device, cmd| unsafe {
            let to_transfer = vk::ImageMemoryBarrier::builder()
                .old_layout(vk::ImageLayout::UNDEFINED)
                .new_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(COLOR_RANGE)
                .src_access_mask(vk::AccessFlags::empty())
                .dst_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .build();
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::TRANSFER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_transfer],
            );

            let region = vk::BufferImageCopy::builder()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(extent)
                .build();
            device.cmd_copy_buffer_to_image(
                cmd,
                staging.handle(),
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            // The transfer queue has no fragment stage; the graphics queue only
            // samples after the upload fence has signaled.
            let to_shader = vk::ImageMemoryBarrier::builder()
                .old_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(COLOR_RANGE)
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::empty())
                .build();
            device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TRANSFER,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_shader],
            );
        })?;

        Ok(texture)
    }

    /// Image, memory, view and sampler; the image is left UNDEFINED
    fn create_image(context: &VulkanContext, extent: vk::Extent3D, format: vk::Format) -> VulkanResult<Self> {
        let device = context.raw_device();

        // Written on the transfer queue, sampled on the graphics queue.
        let families = context.queue_families();
        let shared = [families.graphics, families.transfer];
        let mut image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(extent)
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED)
            .samples(vk::SampleCountFlags::TYPE_1);
        image_info = if families.graphics != families.transfer {
            image_info
                .sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&shared)
        } else {
            image_info.sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let image = unsafe { device.create_image(&image_info, None)? };

        // From here on Drop releases whatever is non-null.
        let mut texture = Self {
            device,
            image,
            memory: vk::DeviceMemory::null(),
            image_view: vk::ImageView::null(),
            sampler: vk::Sampler::null(),
            extent: vk::Extent2D {
                width: extent.width,
                height: extent.height,
            },
            format,
        };

        let requirements = unsafe { texture.device.get_image_memory_requirements(image) };
        texture.memory = allocate_memory(
            &texture.device,
            context.memory_properties(),
            requirements,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        unsafe { texture.device.bind_image_memory(image, texture.memory, 0)? };

        texture.image_view = create_color_view(&texture.device, image, format)?;

        let anisotropy = context.physical_device().sampler_anisotropy;
        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(anisotropy)
            .max_anisotropy(if anisotropy { 16.0 } else { 1.0 })
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(0.0);
        texture.sampler = unsafe { texture.device.create_sampler(&sampler_info, None)? };

        Ok(texture)
    }

    /// Sampler, view and layout for a combined image sampler write
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler,
            image_view: self.image_view,
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Texture size
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Texel format
    pub fn format(&self) -> vk::Format {
        self.format
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            if self.sampler != vk::Sampler::null() {
                self.device.destroy_sampler(self.sampler, None);
            }
            if self.image_view != vk::ImageView::null() {
                self.device.destroy_image_view(self.image_view, None);
            }
            self.device.destroy_image(self.image, None);
            if self.memory != vk::DeviceMemory::null() {
                self.device.free_memory(self.memory, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_formats() {
        assert_eq!(encoding_format(TextureEncoding::Srgb), vk::Format::R8G8B8A8_SRGB);
        assert_eq!(encoding_format(TextureEncoding::Linear), vk::Format::R8G8B8A8_UNORM);
        assert_eq!(encoding_format(TextureEncoding::SingleChannel), vk::Format::R8_UNORM);
    }

    #[test]
    fn test_color_pixels_are_rgba8() {
        let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(2, 3, image::Rgb([10, 20, 30])));
        let pixels = TexturePixels::from_image(&image, TextureEncoding::Srgb);

        assert_eq!((pixels.width, pixels.height), (2, 3));
        assert_eq!(pixels.data.len(), 2 * 3 * 4);
        assert_eq!(&pixels.data[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn test_single_channel_pixels_are_r8() {
        let image = image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(4, 4, image::Luma([128])));
        let pixels = TexturePixels::from_image(&image, TextureEncoding::SingleChannel);

        assert_eq!(pixels.data.len(), 16);
        assert!(pixels.data.iter().all(|&v| v == 128));
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let result = TexturePixels::load(Path::new("does/not/exist.png"), TextureEncoding::Srgb);
        assert!(matches!(result, Err(VulkanError::TextureLoad { .. })));
    }

    #[test]
    fn test_png_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("iris_texture_test_{}.png", std::process::id()));
        image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]))
            .save(&path)
            .unwrap();

        let pixels = TexturePixels::load(&path, TextureEncoding::Linear).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!((pixels.width, pixels.height), (3, 2));
        assert_eq!(&pixels.data[..4], &[1, 2, 3, 4]);
    }
}
