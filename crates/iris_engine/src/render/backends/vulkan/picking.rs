//! Object-id read-back for click-to-select
//!
//! A pick request is recorded into the next frame as a 1×1 copy out of the
//! object-id attachment. The copied value is read once that frame's fence has
//! signaled, which is at the start of the frame after.

use super::rendering::commands::CommandRecorder;
use super::resources::buffer::{Buffer, MemoryAccess};
use super::{VulkanContext, VulkanResult};
use crate::render::decode_object_id;
use crate::scene::{EntityId, SceneQuery};
use ash::vk;

/// Outcome of one pick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickResult {
    /// Framebuffer pixel that was sampled
    pub pixel: (u32, u32),
    /// Raw object-id value, 0 for background
    pub object_id: u32,
    /// Entity drawn at the pixel, if it still exists
    pub entity: Option<EntityId>,
}

/// Copy region for one object-id texel, `None` outside the attachment
pub fn pick_region(pixel: (u32, u32), extent: vk::Extent2D) -> Option<vk::BufferImageCopy> {
    let (x, y) = pixel;
    if x >= extent.width || y >= extent.height {
        return None;
    }

    Some(vk::BufferImageCopy {
        buffer_offset: 0,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D {
            x: x as i32,
            y: y as i32,
            z: 0,
        },
        image_extent: vk::Extent3D {
            width: 1,
            height: 1,
            depth: 1,
        },
    })
}

/// Pick request state and the host-visible buffer the texel lands in
pub struct PickReadback {
    buffer: Buffer<u32>,
    requested: Option<(u32, u32)>,
    in_flight: Option<(u32, u32)>,
    result: Option<PickResult>,
}

impl PickReadback {
    /// Allocate the one-texel read-back buffer
    pub fn new(context: &VulkanContext) -> VulkanResult<Self> {
        let buffer = Buffer::new(context, vk::BufferUsageFlags::TRANSFER_DST, 1, MemoryAccess::HostVisible)?;
        Ok(Self {
            buffer,
            requested: None,
            in_flight: None,
            result: None,
        })
    }

    /// Sample `pixel` during the next frame; a newer request replaces an unrecorded one
    pub fn request(&mut self, pixel: (u32, u32)) {
        self.requested = Some(pixel);
    }

    /// Record the copy for a pending request after the render pass has ended
    ///
    /// `image` must be in TRANSFER_SRC_OPTIMAL, which the render pass leaves it in.
    pub fn record(&mut self, recorder: &mut CommandRecorder, image: vk::Image, extent: vk::Extent2D) {
        let Some(pixel) = self.requested.take() else {
            return;
        };
        let Some(region) = pick_region(pixel, extent) else {
            log::debug!("Pick at {pixel:?} is outside the {}x{} frame", extent.width, extent.height);
            return;
        };

        recorder.copy_image_to_buffer(image, vk::ImageLayout::TRANSFER_SRC_OPTIMAL, self.buffer.handle(), region);
        recorder.memory_barrier(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::HOST,
            vk::MemoryBarrier::builder()
                .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
                .dst_access_mask(vk::AccessFlags::HOST_READ)
                .build(),
        );
        self.in_flight = Some(pixel);
    }

    /// Read a completed copy; call only after the recording frame's fence has signaled
    pub fn resolve(&mut self, scene: &dyn SceneQuery) -> VulkanResult<()> {
        let Some(pixel) = self.in_flight.take() else {
            return Ok(());
        };

        let object_id = self.buffer.read()?.first().copied().unwrap_or(0);
        let entity = decode_object_id(scene, object_id);
        log::debug!("Picked {entity:?} (object id {object_id}) at {pixel:?}");

        self.result = Some(PickResult {
            pixel,
            object_id,
            entity,
        });
        Ok(())
    }

    /// Take the latest completed pick
    pub fn take_result(&mut self) -> Option<PickResult> {
        self.result.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_region_targets_one_texel() {
        let extent = vk::Extent2D { width: 1600, height: 900 };
        let region = pick_region((12, 34), extent).unwrap();

        assert_eq!((region.image_offset.x, region.image_offset.y), (12, 34));
        assert_eq!(
            (region.image_extent.width, region.image_extent.height, region.image_extent.depth),
            (1, 1, 1)
        );
        assert_eq!(region.buffer_offset, 0);
    }

    #[test]
    fn test_pick_region_rejects_out_of_bounds() {
        let extent = vk::Extent2D { width: 1600, height: 900 };
        assert!(pick_region((1600, 0), extent).is_none());
        assert!(pick_region((0, 900), extent).is_none());
        assert!(pick_region((1599, 899), extent).is_some());
    }
}
