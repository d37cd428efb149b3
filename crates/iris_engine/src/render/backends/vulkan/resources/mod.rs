//! Vulkan resource management
//!
//! Buffers, textures, per-entity meshes and descriptor plumbing.

/// Typed buffers and memory selection
pub mod buffer;

/// Texture loading and sampling
pub mod texture;

/// Vertex and index buffers of one entity
pub mod mesh;

/// Descriptor set layouts and pools
pub mod descriptor_set;

pub use buffer::{Buffer, MappedBuffer, MemoryAccess};
pub use descriptor_set::{DescriptorBinding, DescriptorPool, DescriptorSetLayout};
pub use mesh::GpuMesh;
pub use texture::{Texture, TexturePixels};
