//! Per-draw push constants shared by the mesh and billboard pipelines

use crate::foundation::math::{utils, Mat4};
use bytemuck::{Pod, Zeroable};
use std::mem;

/// `texture_index` value for draws without material textures
pub const NO_TEXTURE: u32 = u32::MAX;

/// Bytes read by the vertex stage (the model matrix)
pub const VERTEX_RANGE_SIZE: u32 = mem::size_of::<[[f32; 4]; 4]>() as u32;

/// Bytes read by the fragment stage (object id and texture index)
pub const FRAGMENT_RANGE_SIZE: u32 = 2 * mem::size_of::<u32>() as u32;

/// Push constant block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawPushConstants {
    pub model: [[f32; 4]; 4], // 64 bytes - vertex stage
    pub object_id: u32,       // fragment stage, offset 64
    pub texture_index: u32,   // fragment stage, offset 68
}

impl DrawPushConstants {
    /// Block for one draw
    pub fn new(model: &Mat4, object_id: u32, texture_index: Option<u32>) -> Self {
        Self {
            model: utils::to_cols_array(model),
            object_id,
            texture_index: texture_index.unwrap_or(NO_TEXTURE),
        }
    }

    /// Bytes of the vertex-stage range
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.model)
    }

    /// Bytes of the fragment-stage range
    pub fn fragment_bytes(&self) -> &[u8] {
        &bytemuck::bytes_of(self)[VERTEX_RANGE_SIZE as usize..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_ranges() {
        assert_eq!(mem::size_of::<DrawPushConstants>() as u32, VERTEX_RANGE_SIZE + FRAGMENT_RANGE_SIZE);
        assert_eq!(mem::offset_of!(DrawPushConstants, object_id) as u32, VERTEX_RANGE_SIZE);
        assert_eq!(mem::offset_of!(DrawPushConstants, texture_index), 68);
    }

    #[test]
    fn test_stage_byte_slices() {
        let constants = DrawPushConstants::new(&Mat4::identity(), 7, None);
        assert_eq!(constants.vertex_bytes().len(), 64);

        let fragment = constants.fragment_bytes();
        assert_eq!(fragment.len(), 8);
        assert_eq!(u32::from_ne_bytes([fragment[0], fragment[1], fragment[2], fragment[3]]), 7);
        assert_eq!(u32::from_ne_bytes([fragment[4], fragment[5], fragment[6], fragment[7]]), NO_TEXTURE);
    }
}
