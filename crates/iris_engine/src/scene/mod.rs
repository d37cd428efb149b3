//! Scene collaborator interface
//!
//! The renderer never owns scene entities. It holds [`EntityId`]s and resolves
//! them through [`SceneQuery`] every frame, and it learns about new entities
//! through a [`SceneObserver`] registered once with the scene.
//!
//! ## Architecture
//!
//! ```text
//! Scene (owns components)
//!      ↓ on_entity_added
//! EntityQueue (mutex-guarded ids)
//!      ↓ drained after the frame fence
//! Renderer (GPU meshes, textures, descriptors)
//! ```

mod components;
mod world;

pub use components::{Camera, Light, LightKind, Material, MeshData, MeshError};
pub use world::{EntityDesc, Scene};

use crate::foundation::collections::{new_key_type, slot_index, slot_version};
use crate::foundation::math::Transform;
use bitflags::bitflags;
use std::fmt;

new_key_type! {
    /// Slot map key behind an [`EntityId`]
    pub struct EntityKey;
}

/// Handle to a scene entity
///
/// Version-checked: once an entity is despawned its id never resolves
/// again, even after the slot is reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub(crate) EntityKey);

impl EntityId {
    /// Slot index; stable for the entity's lifetime and used as the GPU array index
    pub fn index(self) -> u32 {
        slot_index(self.0)
    }

    /// Value written into the object-ID attachment (0 is background)
    pub fn object_id(self) -> u32 {
        self.index() + 1
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({}v{})", self.index(), slot_version(self.0))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity {}v{}", self.index(), slot_version(self.0))
    }
}

bitflags! {
    /// Which renderable components an entity carries
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ComponentMask: u32 {
        /// Has [`MeshData`]
        const MESH = 1 << 0;
        /// Has a [`Material`]
        const MATERIAL = 1 << 1;
        /// Has a [`Camera`]
        const CAMERA = 1 << 2;
        /// Has a [`Light`]
        const LIGHT = 1 << 3;
    }
}

/// Scene errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The id was despawned or never belonged to this scene
    #[error("{0} does not exist")]
    UnknownEntity(EntityId),
}

/// Read-only, per-frame access to scene components
pub trait SceneQuery {
    /// Whether the id still refers to a live entity
    fn contains(&self, id: EntityId) -> bool;

    /// Components the entity carries; empty for stale ids
    fn components(&self, id: EntityId) -> ComponentMask;

    /// Mesh geometry
    fn mesh(&self, id: EntityId) -> Option<&MeshData>;

    /// Material
    fn material(&self, id: EntityId) -> Option<&Material>;

    /// Camera parameters
    fn camera(&self, id: EntityId) -> Option<&Camera>;

    /// Light parameters
    fn light(&self, id: EntityId) -> Option<&Light>;

    /// World transform
    fn transform(&self, id: EntityId) -> Option<&Transform>;

    /// Every live entity carrying a light, in index order
    fn lights(&self) -> Vec<EntityId>;

    /// Live entity occupying a slot index, if any
    fn entity_at_index(&self, index: u32) -> Option<EntityId>;
}

/// Receives scene mutation notifications
///
/// Called synchronously from the thread that mutates the scene.
pub trait SceneObserver: Send + Sync {
    /// A new entity was spawned with all its components attached
    fn on_entity_added(&self, scene: &dyn SceneQuery, id: EntityId);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::SlotMap;

    #[test]
    fn test_object_id_reserves_zero() {
        let mut map: SlotMap<EntityKey, ()> = SlotMap::with_key();
        let first = EntityId(map.insert(()));
        let second = EntityId(map.insert(()));

        assert_ne!(first.object_id(), 0);
        assert_eq!(first.object_id(), first.index() + 1);
        assert_eq!(second.index(), first.index() + 1);
    }

    #[test]
    fn test_component_mask_renderable() {
        let mask = ComponentMask::MESH | ComponentMask::MATERIAL;
        assert!(mask.intersects(ComponentMask::MESH | ComponentMask::MATERIAL));
        assert!(!mask.contains(ComponentMask::CAMERA));
        assert!(ComponentMask::default().is_empty());
    }
}
