//! Vulkan vertex input layout
//!
//! Translates the backend-neutral `(type, size, offset)` attribute description
//! into Vulkan vertex input bindings. Attribute `i` is bound at shader location `i`.

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::vertex::{AttributeType, VertexAttribute};
use ash::vk;

/// Vulkan format for one vertex attribute
///
/// Sizes are in bytes and map to one to four 32-bit components.
pub fn attribute_format(attribute: &VertexAttribute) -> VulkanResult<vk::Format> {
    use AttributeType::*;

    let format = match (attribute.kind, attribute.size) {
        (Float, 4) => vk::Format::R32_SFLOAT,
        (Float, 8) => vk::Format::R32G32_SFLOAT,
        (Float, 12) => vk::Format::R32G32B32_SFLOAT,
        (Float, 16) => vk::Format::R32G32B32A32_SFLOAT,
        (Int, 4) => vk::Format::R32_SINT,
        (Int, 8) => vk::Format::R32G32_SINT,
        (Int, 12) => vk::Format::R32G32B32_SINT,
        (Int, 16) => vk::Format::R32G32B32A32_SINT,
        (UInt, 4) => vk::Format::R32_UINT,
        (UInt, 8) => vk::Format::R32G32_UINT,
        (UInt, 12) => vk::Format::R32G32B32_UINT,
        (UInt, 16) => vk::Format::R32G32B32A32_UINT,
        _ => {
            return Err(VulkanError::UnsupportedVertexAttribute {
                size: attribute.size,
                offset: attribute.offset,
            })
        }
    };
    Ok(format)
}

/// Vertex input state of a pipeline: one per-vertex binding at slot 0
#[derive(Debug, Clone, Default)]
pub struct VulkanVertexLayout {
    binding: Option<vk::VertexInputBindingDescription>,
    attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VulkanVertexLayout {
    /// Layout with no vertex buffer; the shader generates its own vertices
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the layout for `stride`-byte vertices with the given attributes
    pub fn new(stride: u32, attributes: &[VertexAttribute]) -> VulkanResult<Self> {
        let attributes = attributes
            .iter()
            .enumerate()
            .map(|(location, attribute)| {
                Ok(vk::VertexInputAttributeDescription {
                    binding: 0,
                    location: location as u32,
                    format: attribute_format(attribute)?,
                    offset: attribute.offset,
                })
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        Ok(Self {
            binding: Some(vk::VertexInputBindingDescription {
                binding: 0,
                stride,
                input_rate: vk::VertexInputRate::VERTEX,
            }),
            attributes,
        })
    }

    /// Binding descriptions, empty for a vertex-buffer-less layout
    pub fn bindings(&self) -> &[vk::VertexInputBindingDescription] {
        self.binding.as_slice()
    }

    /// Attribute descriptions in location order
    pub fn attributes(&self) -> &[vk::VertexInputAttributeDescription] {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::vertex::Vertex;

    fn attribute(kind: AttributeType, size: u32) -> VertexAttribute {
        VertexAttribute { kind, size, offset: 0 }
    }

    #[test]
    fn test_format_mapping() {
        assert_eq!(attribute_format(&attribute(AttributeType::Float, 8)).unwrap(), vk::Format::R32G32_SFLOAT);
        assert_eq!(
            attribute_format(&attribute(AttributeType::Float, 16)).unwrap(),
            vk::Format::R32G32B32A32_SFLOAT
        );
        assert_eq!(attribute_format(&attribute(AttributeType::Int, 12)).unwrap(), vk::Format::R32G32B32_SINT);
        assert_eq!(attribute_format(&attribute(AttributeType::UInt, 4)).unwrap(), vk::Format::R32_UINT);
    }

    #[test]
    fn test_unsupported_sizes_are_rejected() {
        for size in [0, 2, 6, 20, 32] {
            let result = attribute_format(&VertexAttribute {
                kind: AttributeType::Float,
                size,
                offset: 48,
            });
            assert!(matches!(
                result,
                Err(VulkanError::UnsupportedVertexAttribute { offset: 48, .. })
            ));
        }
    }

    #[test]
    fn test_engine_vertex_layout() {
        let layout = VulkanVertexLayout::new(Vertex::stride(), &Vertex::description()).unwrap();

        assert_eq!(layout.bindings().len(), 1);
        assert_eq!(layout.bindings()[0].stride, 56);

        let locations: Vec<_> = layout.attributes().iter().map(|a| (a.location, a.offset)).collect();
        assert_eq!(locations, vec![(0, 0), (1, 16), (2, 32), (3, 48)]);
        assert_eq!(layout.attributes()[3].format, vk::Format::R32G32_SFLOAT);
    }

    #[test]
    fn test_empty_layout_has_no_binding() {
        let layout = VulkanVertexLayout::empty();
        assert!(layout.bindings().is_empty());
        assert!(layout.attributes().is_empty());
    }
}
