//! Camera uniform data (set 0, binding 0)

use crate::foundation::math::{utils, Transform};
use crate::scene::Camera;
use bytemuck::{Pod, Zeroable};

/// Per-frame camera block, std140
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraData {
    pub position: [f32; 4],             // 16 bytes - world position, w = 1
    pub forward: [f32; 4],              // 16 bytes
    pub up: [f32; 4],                   // 16 bytes
    pub right: [f32; 4],                // 16 bytes
    pub view: [[f32; 4]; 4],            // 64 bytes
    pub projection: [[f32; 4]; 4],      // 64 bytes
    pub view_projection: [[f32; 4]; 4], // 64 bytes
}

impl CameraData {
    /// Camera block from a camera component and its entity transform
    pub fn new(camera: &Camera, transform: &Transform) -> Self {
        let view = transform.view_matrix();
        let projection = camera.projection();
        let p = transform.position;
        let f = transform.forward();
        let u = transform.up();
        let r = transform.right();

        Self {
            position: [p.x, p.y, p.z, 1.0],
            forward: [f.x, f.y, f.z, 0.0],
            up: [u.x, u.y, u.z, 0.0],
            right: [r.x, r.y, r.z, 0.0],
            view: utils::to_cols_array(&view),
            projection: utils::to_cols_array(&projection),
            view_projection: utils::to_cols_array(&(projection * view)),
        }
    }

    /// Block used before the scene has a camera
    pub fn fallback() -> Self {
        Self::new(&Camera::default(), &Transform::identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use approx::assert_relative_eq;
    use std::mem;

    #[test]
    fn test_camera_data_layout() {
        assert_eq!(mem::size_of::<CameraData>(), 256);
        assert_eq!(mem::offset_of!(CameraData, view), 64);
        assert_eq!(mem::offset_of!(CameraData, projection), 128);
        assert_eq!(mem::offset_of!(CameraData, view_projection), 192);
    }

    #[test]
    fn test_view_projection_is_product() {
        let camera = Camera::default();
        let transform = Transform::from_position(Vec3::new(0.0, 2.0, 5.0)).with_yaw_pitch(0.3, -0.1);
        let data = CameraData::new(&camera, &transform);

        let view = Mat4::from(data.view);
        let projection = Mat4::from(data.projection);
        let view_projection = Mat4::from(data.view_projection);
        assert_relative_eq!(projection * view, view_projection, epsilon = 1e-5);
        assert_eq!(data.position, [0.0, 2.0, 5.0, 1.0]);
    }
}
