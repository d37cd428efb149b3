//! Component data the renderer reads from the scene
//!
//! Components are plain data; the scene owns them and the renderer only ever
//! borrows them for the duration of a frame.

use crate::foundation::math::{utils, Mat4, Vec3};
use crate::render::vertex::Vertex;

/// Geometry the renderer cannot draw
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// No vertices or no indices
    #[error("mesh is empty")]
    Empty,

    /// An index points past the vertex list
    #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        /// Position in the index list
        position: usize,
        /// Offending index value
        index: u32,
        /// Length of the vertex list
        vertex_count: usize,
    },
}

/// Triangle mesh geometry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle list indices
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Mesh from raw vertex and index lists
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Whether there is anything to draw
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Check the mesh is non-empty and every index names a vertex
    pub fn validate(&self) -> Result<(), MeshError> {
        if self.is_empty() {
            return Err(MeshError::Empty);
        }
        let vertex_count = self.vertices.len();
        match self.indices.iter().position(|&index| index as usize >= vertex_count) {
            Some(position) => Err(MeshError::IndexOutOfRange {
                position,
                index: self.indices[position],
                vertex_count,
            }),
            None => Ok(()),
        }
    }

    /// Unit cube centered on the origin, one quad per face so each face gets its own UVs
    pub fn cube() -> Self {
        // (normal, u axis, v axis)
        let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, u_axis, v_axis) in faces {
            let base = vertices.len() as u32;
            for (su, sv) in [(-1.0f32, -1.0f32), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let position = [
                    0.5 * (normal[0] + su * u_axis[0] + sv * v_axis[0]),
                    0.5 * (normal[1] + su * u_axis[1] + sv * v_axis[1]),
                    0.5 * (normal[2] + su * u_axis[2] + sv * v_axis[2]),
                ];
                let uv = [(su + 1.0) * 0.5, 1.0 - (sv + 1.0) * 0.5];
                vertices.push(Vertex::new(position, normal, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
        }

        Self { vertices, indices }
    }
}

/// Surface material
///
/// `texture` follows the material path convention: a path ending in a separator
/// names a directory of per-channel maps, anything else a single texture file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Material {
    /// Texture path or directory
    pub texture: String,
}

impl Material {
    /// Material sampling the given texture path
    pub fn new(texture: impl Into<String>) -> Self {
        Self {
            texture: texture.into(),
        }
    }
}

/// Perspective camera parameters; placement comes from the entity's transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// Vertical field of view in degrees
    pub fov_y_degrees: f32,
    /// Width over height
    pub aspect: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            fov_y_degrees: 90.0,
            aspect: 1600.0 / 900.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Camera with the aspect ratio of a viewport
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
        }
        self
    }

    /// Projection matrix (0..1 depth, unflipped Y)
    pub fn projection(&self) -> Mat4 {
        crate::foundation::math::perspective(
            utils::deg_to_rad(self.fov_y_degrees),
            self.aspect,
            self.near,
            self.far,
        )
    }
}

/// Kind of light source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    /// Parallel rays along the transform's forward axis
    Directional,
    /// Radiates from the transform's position
    Point,
    /// Cone along the transform's forward axis
    Spot,
}

impl LightKind {
    /// Numeric tag written into the light buffer
    pub fn shader_tag(self) -> u32 {
        match self {
            Self::Directional => 0,
            Self::Point => 1,
            Self::Spot => 2,
        }
    }
}

/// Light source; position and direction come from the entity's transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    /// Light type
    pub kind: LightKind,
    /// Linear RGB color
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Falloff range for point and spot lights
    pub range: f32,
    /// Disabled lights are still uploaded but flagged off
    pub enabled: bool,
}

impl Light {
    /// Point light
    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            intensity,
            range,
            enabled: true,
        }
    }

    /// Directional light
    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            intensity,
            range: 0.0,
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_geometry() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert!(cube.indices.iter().all(|&i| (i as usize) < cube.vertices.len()));

        for vertex in &cube.vertices {
            for axis in 0..3 {
                assert_relative_eq!(vertex.position[axis].abs(), 0.5);
            }
        }
    }

    #[test]
    fn test_validate_rejects_undrawable_meshes() {
        assert_eq!(MeshData::cube().validate(), Ok(()));
        assert_eq!(MeshData::default().validate(), Err(MeshError::Empty));

        let cube = MeshData::cube();
        let no_indices = MeshData::new(cube.vertices.clone(), Vec::new());
        assert_eq!(no_indices.validate(), Err(MeshError::Empty));

        let mut stray = cube;
        stray.indices[4] = 24;
        assert_eq!(
            stray.validate(),
            Err(MeshError::IndexOutOfRange {
                position: 4,
                index: 24,
                vertex_count: 24,
            })
        );
    }

    #[test]
    fn test_camera_defaults() {
        let camera = Camera::default();
        assert_relative_eq!(camera.fov_y_degrees, 90.0);
        assert_relative_eq!(camera.aspect, 1600.0 / 900.0);
        assert_relative_eq!(camera.with_viewport(800, 400).aspect, 2.0);
        assert_relative_eq!(camera.with_viewport(800, 0).aspect, camera.aspect);
    }

    #[test]
    fn test_light_tags_are_distinct() {
        let tags = [LightKind::Directional, LightKind::Point, LightKind::Spot].map(LightKind::shader_tag);
        assert_eq!(tags, [0, 1, 2]);
    }
}
