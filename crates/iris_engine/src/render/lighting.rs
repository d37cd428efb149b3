//! Light storage buffer (set 0, binding 1)

use crate::core::config::MAX_LIGHTS;
use crate::scene::SceneQuery;
use bytemuck::{Pod, Zeroable};

/// One light as the fragment shader reads it, std430
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct GpuLight {
    pub position: [f32; 4],  // xyz world position, w range
    pub direction: [f32; 4], // xyz forward axis, w unused
    pub color: [f32; 4],     // rgb color, a intensity
    pub flags: [u32; 4],     // kind, enabled, object id, unused
}

/// Light array with its live count
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightBlock {
    pub count: u32,
    pub _padding: [u32; 3],
    pub lights: [GpuLight; MAX_LIGHTS],
}

impl Default for LightBlock {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

impl LightBlock {
    /// Gather up to `max_lights` lights from the scene
    ///
    /// Returns the block and the number of lights that did not fit.
    pub fn collect(scene: &dyn SceneQuery, max_lights: usize) -> (Self, usize) {
        let limit = max_lights.min(MAX_LIGHTS);
        let mut block = Self::default();
        let mut skipped = 0;

        for id in scene.lights() {
            let (Some(light), Some(transform)) = (scene.light(id), scene.transform(id)) else {
                continue;
            };
            let slot = block.count as usize;
            if slot >= limit {
                skipped += 1;
                continue;
            }

            let p = transform.position;
            let d = transform.forward();
            block.lights[slot] = GpuLight {
                position: [p.x, p.y, p.z, light.range],
                direction: [d.x, d.y, d.z, 0.0],
                color: [light.color.x, light.color.y, light.color.z, light.intensity],
                flags: [light.kind.shader_tag(), u32::from(light.enabled), id.object_id(), 0],
            };
            block.count += 1;
        }

        (block, skipped)
    }

    /// Lights actually in use
    pub fn active(&self) -> &[GpuLight] {
        &self.lights[..self.count as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Transform, Vec3};
    use crate::scene::{EntityDesc, Light, MeshData, Scene};
    use std::mem;

    #[test]
    fn test_layout() {
        assert_eq!(mem::size_of::<GpuLight>(), 64);
        assert_eq!(mem::offset_of!(LightBlock, lights), 16);
        assert_eq!(mem::size_of::<LightBlock>(), 16 + 64 * MAX_LIGHTS);
    }

    #[test]
    fn test_collect_packs_lights() {
        let mut scene = Scene::new();
        scene.spawn(EntityDesc::new().with_mesh(MeshData::cube()));
        let light = scene.spawn(
            EntityDesc::new()
                .with_transform(Transform::from_position(Vec3::new(1.0, 2.0, 3.0)))
                .with_light(Light::point(Vec3::new(1.0, 0.5, 0.25), 4.0, 12.0)),
        );

        let (block, skipped) = LightBlock::collect(&scene, MAX_LIGHTS);
        assert_eq!(skipped, 0);
        assert_eq!(block.count, 1);

        let gpu = block.active()[0];
        assert_eq!(gpu.position, [1.0, 2.0, 3.0, 12.0]);
        assert_eq!(gpu.color, [1.0, 0.5, 0.25, 4.0]);
        assert_eq!(gpu.flags, [1, 1, light.object_id(), 0]);
    }

    #[test]
    fn test_collect_truncates_at_limit() {
        let mut scene = Scene::new();
        for _ in 0..5 {
            scene.spawn(EntityDesc::new().with_light(Light::directional(Vec3::new(1.0, 1.0, 1.0), 1.0)));
        }

        let (block, skipped) = LightBlock::collect(&scene, 3);
        assert_eq!(block.count, 3);
        assert_eq!(skipped, 2);
        assert_eq!(block.active().len(), 3);
    }
}
