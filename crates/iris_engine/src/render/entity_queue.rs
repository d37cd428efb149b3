//! Pending-upload queue fed by scene notifications
//!
//! The scene thread pushes ids from `on_entity_added`; the render loop drains
//! them once per frame, after the frame fence has signaled. This mutex is the
//! only state shared between the two.

use crate::scene::{ComponentMask, EntityId, SceneObserver, SceneQuery};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct QueueState {
    pending: Vec<EntityId>,
    camera: Option<EntityId>,
}

/// Entities waiting for GPU upload, plus the most recently added camera
#[derive(Debug, Default)]
pub struct EntityQueue {
    state: Mutex<QueueState>,
}

impl EntityQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Queue state stays consistent even if a holder panicked mid-push.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take every pending id, leaving the queue empty
    pub fn drain(&self) -> Vec<EntityId> {
        std::mem::take(&mut self.lock().pending)
    }

    /// Number of pending ids
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.lock().pending.is_empty()
    }

    /// Camera the renderer reads view and projection from
    pub fn active_camera(&self) -> Option<EntityId> {
        self.lock().camera
    }
}

impl SceneObserver for EntityQueue {
    fn on_entity_added(&self, scene: &dyn SceneQuery, id: EntityId) {
        let components = scene.components(id);
        let mut state = self.lock();

        if components.contains(ComponentMask::CAMERA) {
            log::debug!("{id} is now the active camera");
            state.camera = Some(id);
        }
        if components.intersects(ComponentMask::MESH | ComponentMask::MATERIAL) {
            state.pending.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::{Camera, EntityDesc, Light, Material, MeshData, Scene};
    use std::sync::Arc;

    fn scene_with_queue() -> (Scene, Arc<EntityQueue>) {
        let queue = Arc::new(EntityQueue::new());
        let mut scene = Scene::new();
        scene.subscribe(queue.clone());
        (scene, queue)
    }

    #[test]
    fn test_only_renderable_entities_are_queued() {
        let (mut scene, queue) = scene_with_queue();

        let mesh = scene.spawn(EntityDesc::new().with_mesh(MeshData::cube()));
        let material = scene.spawn(EntityDesc::new().with_material(Material::new("a.png")));
        scene.spawn(EntityDesc::new().with_light(Light::point(Vec3::new(1.0, 1.0, 1.0), 1.0, 5.0)));
        let camera = scene.spawn(EntityDesc::new().with_camera(Camera::default()));

        assert_eq!(queue.active_camera(), Some(camera));
        assert_eq!(queue.drain(), vec![mesh, material]);
    }

    #[test]
    fn test_drain_empties_queue() {
        let (mut scene, queue) = scene_with_queue();
        scene.spawn(EntityDesc::new().with_mesh(MeshData::cube()));
        scene.spawn(EntityDesc::new().with_mesh(MeshData::cube()));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.drain().len(), 2);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_push_from_other_thread() {
        let queue = Arc::new(EntityQueue::new());
        let mut scene = Scene::new();
        scene.subscribe(queue.clone());

        let handle = std::thread::spawn(move || {
            scene.spawn(EntityDesc::new().with_mesh(MeshData::cube()));
            scene
        });
        let scene = handle.join().unwrap();

        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert!(scene.contains(drained[0]));
    }
}
