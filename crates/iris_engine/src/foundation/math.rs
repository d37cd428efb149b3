//! Math utilities and types
//!
//! nalgebra aliases plus the few projection helpers the renderer needs.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector2, Vector3, Vector4};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Builder-style rotation from yaw (around +Y) and pitch (around +X), in radians
    pub fn with_yaw_pitch(mut self, yaw: f32, pitch: f32) -> Self {
        self.rotation = Quat::from_axis_angle(&Vec3::y_axis(), yaw)
            * Quat::from_axis_angle(&Vec3::x_axis(), pitch);
        self
    }

    /// Builder-style uniform scale
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Convert to a transformation matrix (translate * rotate * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Move in world space
    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
    }

    /// Local -Z axis in world space
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::z()
    }

    /// Local +Y axis in world space
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::y()
    }

    /// Local +X axis in world space
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::x()
    }

    /// View matrix for a camera placed at this transform (scale ignored)
    pub fn view_matrix(&self) -> Mat4 {
        let rotation = self.rotation.inverse().to_homogeneous();
        rotation * Mat4::new_translation(&-self.position)
    }
}

/// Right-handed perspective projection with a 0..1 depth range
///
/// Points at `-near` on the view axis map to depth 0 and points at `-far` map to 1.
/// Y is not flipped here; the renderer flips the viewport instead.
pub fn perspective(fov_y_radians: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let f = 1.0 / (fov_y_radians * 0.5).tan();
    let range = far / (near - far);

    #[rustfmt::skip]
    let projection = Mat4::new(
        f / aspect, 0.0, 0.0,   0.0,
        0.0,        f,   0.0,   0.0,
        0.0,        0.0, range, near * range,
        0.0,        0.0, -1.0,  0.0,
    );
    projection
}

/// Math utility functions
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Column-major array form of a matrix, as shaders expect it
    pub fn to_cols_array(m: &super::Mat4) -> [[f32; 4]; 4] {
        (*m).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn project_depth(projection: &Mat4, z: f32) -> f32 {
        let clip = projection * Vec4::new(0.0, 0.0, z, 1.0);
        clip.z / clip.w
    }

    #[test]
    fn test_perspective_depth_range() {
        let projection = perspective(utils::deg_to_rad(90.0), 16.0 / 9.0, 0.1, 1000.0);

        assert_relative_eq!(project_depth(&projection, -0.1), 0.0, epsilon = EPSILON);
        assert_relative_eq!(project_depth(&projection, -1000.0), 1.0, epsilon = EPSILON);

        let mid = project_depth(&projection, -10.0);
        assert!(mid > 0.0 && mid < 1.0);
    }

    #[test]
    fn test_perspective_aspect() {
        let projection = perspective(utils::deg_to_rad(90.0), 2.0, 0.1, 100.0);
        assert_relative_eq!(projection[(0, 0)], 0.5, epsilon = EPSILON);
        assert_relative_eq!(projection[(1, 1)], 1.0, epsilon = EPSILON);
    }

    #[test]
    fn test_view_matrix_inverts_model() {
        let transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0)).with_yaw_pitch(0.4, -0.2);
        let product = transform.view_matrix() * transform.to_matrix();
        assert_relative_eq!(product, Mat4::identity(), epsilon = EPSILON);
    }

    #[test]
    fn test_default_camera_looks_down_negative_z() {
        let transform = Transform::identity();
        assert_relative_eq!(transform.forward(), Vec3::new(0.0, 0.0, -1.0), epsilon = EPSILON);
        assert_relative_eq!(transform.right(), Vec3::new(1.0, 0.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_cols_array_is_column_major() {
        let m = Mat4::new_translation(&Vec3::new(4.0, 5.0, 6.0));
        let cols = utils::to_cols_array(&m);
        assert_eq!(cols[3], [4.0, 5.0, 6.0, 1.0]);
    }
}
