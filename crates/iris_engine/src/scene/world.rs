//! In-memory scene

use super::{
    Camera, ComponentMask, EntityId, EntityKey, Light, Material, MeshData, SceneError, SceneObserver, SceneQuery,
};
use crate::foundation::collections::SlotMap;
use crate::foundation::math::Transform;
use std::sync::Arc;

/// Components of a new entity
///
/// ```
/// use iris_engine::scene::{EntityDesc, Material, MeshData};
///
/// let desc = EntityDesc::new()
///     .with_mesh(MeshData::cube())
///     .with_material(Material::new("resources/textures/crate.png"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntityDesc {
    transform: Transform,
    mesh: Option<MeshData>,
    material: Option<Material>,
    camera: Option<Camera>,
    light: Option<Light>,
}

impl EntityDesc {
    /// Entity with an identity transform and no components
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transform
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// Attach mesh geometry
    pub fn with_mesh(mut self, mesh: MeshData) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// Attach a material
    pub fn with_material(mut self, material: Material) -> Self {
        self.material = Some(material);
        self
    }

    /// Attach a camera
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Attach a light
    pub fn with_light(mut self, light: Light) -> Self {
        self.light = Some(light);
        self
    }
}

#[derive(Debug)]
struct EntityRecord {
    transform: Transform,
    mesh: Option<MeshData>,
    material: Option<Material>,
    camera: Option<Camera>,
    light: Option<Light>,
}

impl EntityRecord {
    fn mask(&self) -> ComponentMask {
        let mut mask = ComponentMask::empty();
        mask.set(ComponentMask::MESH, self.mesh.is_some());
        mask.set(ComponentMask::MATERIAL, self.material.is_some());
        mask.set(ComponentMask::CAMERA, self.camera.is_some());
        mask.set(ComponentMask::LIGHT, self.light.is_some());
        mask
    }
}

/// Entity storage with spawn notifications
#[derive(Default)]
pub struct Scene {
    entities: SlotMap<EntityKey, EntityRecord>,
    // Slot index -> live key, for decoding object ids
    by_index: Vec<Option<EntityKey>>,
    observers: Vec<Arc<dyn SceneObserver>>,
}

impl Scene {
    /// Empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for entity additions
    pub fn subscribe(&mut self, observer: Arc<dyn SceneObserver>) {
        self.observers.push(observer);
    }

    /// Add an entity and notify observers
    pub fn spawn(&mut self, desc: EntityDesc) -> EntityId {
        let id = EntityId(self.entities.insert(EntityRecord {
            transform: desc.transform,
            mesh: desc.mesh,
            material: desc.material,
            camera: desc.camera,
            light: desc.light,
        }));

        let index = id.index() as usize;
        if self.by_index.len() <= index {
            self.by_index.resize(index + 1, None);
        }
        self.by_index[index] = Some(id.0);

        log::debug!("spawned {id} with {:?}", self.components(id));

        for observer in &self.observers {
            observer.on_entity_added(self, id);
        }
        id
    }

    /// Remove an entity; its id never resolves again
    pub fn despawn(&mut self, id: EntityId) -> Result<(), SceneError> {
        self.entities.remove(id.0).ok_or(SceneError::UnknownEntity(id))?;
        if let Some(slot) = self.by_index.get_mut(id.index() as usize) {
            *slot = None;
        }
        Ok(())
    }

    /// Mutable transform access
    pub fn transform_mut(&mut self, id: EntityId) -> Result<&mut Transform, SceneError> {
        self.entities
            .get_mut(id.0)
            .map(|record| &mut record.transform)
            .ok_or(SceneError::UnknownEntity(id))
    }

    /// Mutable camera access
    pub fn camera_mut(&mut self, id: EntityId) -> Option<&mut Camera> {
        self.entities.get_mut(id.0).and_then(|record| record.camera.as_mut())
    }

    /// Number of live entities
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the scene has no entities
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl SceneQuery for Scene {
    fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id.0)
    }

    fn components(&self, id: EntityId) -> ComponentMask {
        self.entities
            .get(id.0)
            .map_or(ComponentMask::empty(), EntityRecord::mask)
    }

    fn mesh(&self, id: EntityId) -> Option<&MeshData> {
        self.entities.get(id.0)?.mesh.as_ref()
    }

    fn material(&self, id: EntityId) -> Option<&Material> {
        self.entities.get(id.0)?.material.as_ref()
    }

    fn camera(&self, id: EntityId) -> Option<&Camera> {
        self.entities.get(id.0)?.camera.as_ref()
    }

    fn light(&self, id: EntityId) -> Option<&Light> {
        self.entities.get(id.0)?.light.as_ref()
    }

    fn transform(&self, id: EntityId) -> Option<&Transform> {
        self.entities.get(id.0).map(|record| &record.transform)
    }

    fn lights(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, record)| record.light.is_some())
            .map(|(id, _)| EntityId(id))
            .collect()
    }

    fn entity_at_index(&self, index: u32) -> Option<EntityId> {
        let key = (*self.by_index.get(index as usize)?)?;
        self.entities.contains_key(key).then_some(EntityId(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(EntityId, ComponentMask)>>,
    }

    impl SceneObserver for Recorder {
        fn on_entity_added(&self, scene: &dyn SceneQuery, id: EntityId) {
            self.seen.lock().unwrap().push((id, scene.components(id)));
        }
    }

    #[test]
    fn test_spawn_notifies_with_components_attached() {
        let recorder = Arc::new(Recorder::default());
        let mut scene = Scene::new();
        scene.subscribe(recorder.clone());

        let cube = scene.spawn(EntityDesc::new().with_mesh(MeshData::cube()).with_material(Material::new("a.png")));
        let camera = scene.spawn(EntityDesc::new().with_camera(Camera::default()));

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (cube, ComponentMask::MESH | ComponentMask::MATERIAL));
        assert_eq!(seen[1], (camera, ComponentMask::CAMERA));
    }

    #[test]
    fn test_despawned_id_is_stale_after_reuse() {
        let mut scene = Scene::new();
        let old = scene.spawn(EntityDesc::new().with_mesh(MeshData::cube()));
        scene.despawn(old).unwrap();
        assert_eq!(scene.entity_at_index(old.index()), None);
        let new = scene.spawn(EntityDesc::new().with_camera(Camera::default()));

        assert_eq!(old.index(), new.index());
        assert!(!scene.contains(old));
        assert!(scene.mesh(old).is_none());
        assert!(scene.components(old).is_empty());
        assert_eq!(scene.entity_at_index(new.index()), Some(new));
        assert_eq!(scene.despawn(old), Err(SceneError::UnknownEntity(old)));
    }

    #[test]
    fn test_lights_and_transforms() {
        let mut scene = Scene::new();
        scene.spawn(EntityDesc::new().with_mesh(MeshData::cube()));
        let light = scene.spawn(
            EntityDesc::new()
                .with_transform(Transform::from_position(Vec3::new(0.0, 3.0, 0.0)))
                .with_light(Light::point(Vec3::new(1.0, 1.0, 1.0), 2.0, 10.0)),
        );

        assert_eq!(scene.lights(), vec![light]);

        scene.transform_mut(light).unwrap().translate(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(scene.transform(light).unwrap().position, Vec3::new(1.0, 3.0, 0.0));
    }
}
