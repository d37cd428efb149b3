//! Vertex format shared by scene meshes and the mesh pipeline

use bytemuck::{Pod, Zeroable};
use std::mem;

/// Scalar type of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    /// 32-bit float components
    Float,
    /// 32-bit signed integer components
    Int,
    /// 32-bit unsigned integer components
    UInt,
}

/// One attribute of a vertex layout: scalar type, byte size and byte offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    /// Component type
    pub kind: AttributeType,
    /// Size in bytes (4, 8, 12 or 16)
    pub size: u32,
    /// Offset from the start of the vertex in bytes
    pub offset: u32,
}

/// Mesh vertex
///
/// Every vector is stored as a vec4 except the texture coordinate so the layout
/// matches the shader side without padding rules getting involved.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position, w = 1
    pub position: [f32; 4],
    /// Vertex color
    pub color: [f32; 4],
    /// Object-space normal, w = 0
    pub normal: [f32; 4],
    /// Texture coordinate
    pub uv: [f32; 2],
}

impl Vertex {
    /// Vertex with white color
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position: [position[0], position[1], position[2], 1.0],
            color: [1.0; 4],
            normal: [normal[0], normal[1], normal[2], 0.0],
            uv,
        }
    }

    /// Byte stride of one vertex
    pub const fn stride() -> u32 {
        mem::size_of::<Self>() as u32
    }

    /// Attribute description in shader location order
    pub fn description() -> [VertexAttribute; 4] {
        [
            VertexAttribute {
                kind: AttributeType::Float,
                size: 16,
                offset: mem::offset_of!(Vertex, position) as u32,
            },
            VertexAttribute {
                kind: AttributeType::Float,
                size: 16,
                offset: mem::offset_of!(Vertex, color) as u32,
            },
            VertexAttribute {
                kind: AttributeType::Float,
                size: 16,
                offset: mem::offset_of!(Vertex, normal) as u32,
            },
            VertexAttribute {
                kind: AttributeType::Float,
                size: 8,
                offset: mem::offset_of!(Vertex, uv) as u32,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_stride() {
        assert_eq!(Vertex::stride(), 56);
    }

    #[test]
    fn test_description_matches_layout() {
        let description = Vertex::description();
        let offsets: Vec<u32> = description.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 16, 32, 48]);

        let last = description[3];
        assert_eq!(last.offset + last.size, Vertex::stride());
        assert!(description.iter().all(|a| a.kind == AttributeType::Float));
    }

    #[test]
    fn test_new_sets_homogeneous_w() {
        let v = Vertex::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.5, 0.25]);
        assert_eq!(v.position[3], 1.0);
        assert_eq!(v.normal[3], 0.0);
        assert_eq!(v.color, [1.0; 4]);
    }
}
