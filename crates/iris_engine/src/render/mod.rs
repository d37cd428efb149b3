//! # Rendering System
//!
//! GPU-facing data layouts shared with the shaders, the scene-to-renderer
//! upload queue, and the Vulkan backend that consumes them.
//!
//! ## Architecture
//!
//! - **Data layouts**: [`vertex`], [`camera`], [`lighting`] and [`push_constants`]
//!   mirror the GLSL declarations byte for byte
//! - **Material convention**: [`material`] expands a material path into texture
//!   files and descriptor bindings
//! - **Entity queue**: [`entity_queue`] collects new entities from the scene
//! - **Vulkan backend**: [`backends::vulkan`] owns every GPU object

pub mod backends;
pub mod camera;
pub mod entity_queue;
pub mod lighting;
pub mod material;
pub mod push_constants;
pub mod vertex;

pub use backends::vulkan::{VulkanError, VulkanRenderer, VulkanResult, Window, WindowError};
pub use camera::CameraData;
pub use entity_queue::EntityQueue;
pub use lighting::{GpuLight, LightBlock};
pub use vertex::Vertex;

use crate::scene::{EntityId, SceneQuery};

/// Resolve a value read from the object-ID attachment
///
/// 0 is background; anything else is `entity index + 1`. Values whose slot
/// has since been emptied resolve to `None`.
pub fn decode_object_id(scene: &dyn SceneQuery, value: u32) -> Option<EntityId> {
    value.checked_sub(1).and_then(|index| scene.entity_at_index(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{EntityDesc, MeshData, Scene};

    #[test]
    fn test_decode_object_id() {
        let mut scene = Scene::new();
        let first = scene.spawn(EntityDesc::new().with_mesh(MeshData::cube()));
        let second = scene.spawn(EntityDesc::new().with_mesh(MeshData::cube()));

        assert_eq!(decode_object_id(&scene, 0), None);
        assert_eq!(decode_object_id(&scene, first.object_id()), Some(first));
        assert_eq!(decode_object_id(&scene, second.object_id()), Some(second));
        assert_eq!(decode_object_id(&scene, 99), None);

        scene.despawn(first).unwrap();
        assert_eq!(decode_object_id(&scene, first.object_id()), None);
    }
}
