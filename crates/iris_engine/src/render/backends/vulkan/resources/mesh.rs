//! GPU-resident mesh: a vertex buffer and an index buffer owned by one entity

use super::buffer::Buffer;
use crate::render::backends::vulkan::rendering::commands::ActiveRenderPass;
use crate::render::backends::vulkan::upload::UploadContext;
use crate::render::backends::vulkan::{VulkanContext, VulkanError, VulkanResult};
use crate::render::vertex::Vertex;
use crate::scene::{EntityId, MeshData};
use ash::vk;

/// Uploaded geometry of one entity
///
/// Only the owning entity id is kept; the model matrix is read from the scene
/// at draw time.
pub struct GpuMesh {
    entity: EntityId,
    vertices: Buffer<Vertex>,
    indices: Buffer<u32>,
}

impl GpuMesh {
    /// Upload `mesh` for `entity`
    ///
    /// Geometry that fails [`MeshData::validate`] is refused before any
    /// buffer is created.
    pub fn new(
        context: &VulkanContext,
        upload: &UploadContext,
        entity: EntityId,
        mesh: &MeshData,
    ) -> VulkanResult<Self> {
        mesh.validate().map_err(|e| VulkanError::InvalidOperation {
            reason: format!("{entity}: {e}"),
        })?;

        let vertices = Buffer::with_data(context, upload, vk::BufferUsageFlags::VERTEX_BUFFER, &mesh.vertices)?;
        let indices = Buffer::with_data(context, upload, vk::BufferUsageFlags::INDEX_BUFFER, &mesh.indices)?;

        log::debug!(
            "Uploaded mesh for {entity}: {} vertices, {} indices",
            vertices.len(),
            indices.len()
        );

        Ok(Self {
            entity,
            vertices,
            indices,
        })
    }

    /// Entity the mesh belongs to
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Number of indices drawn
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Bind both buffers and issue the indexed draw
    pub fn draw(&self, pass: &mut ActiveRenderPass<'_>) {
        pass.bind_geometry(self.vertices.handle(), self.indices.handle());
        pass.draw_indexed(self.index_count());
    }
}
