//! Descriptor set layouts and pools
//!
//! Array bindings are declared partially bound and update-after-bind, so a
//! 1024-entry texture array can be populated one entity at a time while the
//! set is in use. Pools carry the matching update-after-bind flag.

use crate::render::backends::vulkan::VulkanResult;
use ash::{vk, Device};

/// Descriptors of each type a pipeline's pool can hand out
pub const POOL_DESCRIPTORS_PER_TYPE: u32 = 65_536;

/// Descriptor sets a pipeline's pool can hand out
pub const POOL_MAX_SETS: u32 = 128;

/// One declared binding of a descriptor set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    /// Binding index within the set
    pub binding: u32,
    /// Descriptor type
    pub ty: vk::DescriptorType,
    /// Array length; 1 for a plain binding
    pub count: u32,
    /// Stages that read the binding
    pub stages: vk::ShaderStageFlags,
}

impl DescriptorBinding {
    /// Whether this binding is a descriptor array
    pub fn is_array(&self) -> bool {
        self.count > 1
    }

    /// Binding flags: arrays tolerate holes and late writes
    pub fn flags(&self) -> vk::DescriptorBindingFlags {
        if self.is_array() {
            vk::DescriptorBindingFlags::PARTIALLY_BOUND | vk::DescriptorBindingFlags::UPDATE_AFTER_BIND
        } else {
            vk::DescriptorBindingFlags::empty()
        }
    }

    fn to_vk(self) -> vk::DescriptorSetLayoutBinding {
        vk::DescriptorSetLayoutBinding::builder()
            .binding(self.binding)
            .descriptor_type(self.ty)
            .descriptor_count(self.count)
            .stage_flags(self.stages)
            .build()
    }
}

/// Layout create flags for a set with these bindings
pub fn layout_flags(bindings: &[DescriptorBinding]) -> vk::DescriptorSetLayoutCreateFlags {
    if bindings.iter().any(DescriptorBinding::is_array) {
        vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL
    } else {
        vk::DescriptorSetLayoutCreateFlags::empty()
    }
}

/// Pool sizes covering every descriptor type a pipeline declares
pub fn pool_sizes(types: impl IntoIterator<Item = vk::DescriptorType>) -> Vec<vk::DescriptorPoolSize> {
    let mut sizes: Vec<vk::DescriptorPoolSize> = Vec::new();
    for ty in types {
        if !sizes.iter().any(|size| size.ty == ty) {
            sizes.push(vk::DescriptorPoolSize {
                ty,
                descriptor_count: POOL_DESCRIPTORS_PER_TYPE,
            });
        }
    }
    sizes
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
    bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayout {
    /// Create a layout for `bindings`
    pub fn new(device: Device, bindings: Vec<DescriptorBinding>) -> VulkanResult<Self> {
        let vk_bindings: Vec<_> = bindings.iter().map(|b| b.to_vk()).collect();
        let flags: Vec<_> = bindings.iter().map(DescriptorBinding::flags).collect();

        let mut flags_info = vk::DescriptorSetLayoutBindingFlagsCreateInfo::builder().binding_flags(&flags);
        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder()
            .flags(layout_flags(&bindings))
            .bindings(&vk_bindings)
            .push_next(&mut flags_info);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None)? };

        Ok(Self {
            layout,
            device,
            bindings,
        })
    }

    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Get the bindings used in this layout
    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    /// Declared binding with index `binding`
    pub fn binding(&self, binding: u32) -> Option<&DescriptorBinding> {
        self.bindings.iter().find(|b| b.binding == binding)
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe { self.device.destroy_descriptor_set_layout(self.layout, None) };
    }
}

/// Descriptor pool for allocating descriptor sets
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create an update-after-bind pool sized for `types`
    pub fn new(device: Device, types: impl IntoIterator<Item = vk::DescriptorType>) -> VulkanResult<Self> {
        let sizes = pool_sizes(types);
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET | vk::DescriptorPoolCreateFlags::UPDATE_AFTER_BIND)
            .max_sets(POOL_MAX_SETS)
            .pool_sizes(&sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None)? };
        Ok(Self { pool, device })
    }

    /// Allocate one set per layout
    pub fn allocate(&self, layouts: &[vk::DescriptorSetLayout]) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        Ok(unsafe { self.device.allocate_descriptor_sets(&alloc_info)? })
    }

    /// Return sets to the pool
    pub fn free(&self, sets: &[vk::DescriptorSet]) -> VulkanResult<()> {
        if sets.is_empty() {
            return Ok(());
        }
        unsafe { self.device.free_descriptor_sets(self.pool, sets)? };
        Ok(())
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe { self.device.destroy_descriptor_pool(self.pool, None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(ty: vk::DescriptorType, count: u32) -> DescriptorBinding {
        DescriptorBinding {
            binding: 0,
            ty,
            count,
            stages: vk::ShaderStageFlags::FRAGMENT,
        }
    }

    #[test]
    fn test_array_bindings_are_partially_bound() {
        let textures = binding(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1024);
        assert!(textures.flags().contains(vk::DescriptorBindingFlags::PARTIALLY_BOUND));
        assert!(textures.flags().contains(vk::DescriptorBindingFlags::UPDATE_AFTER_BIND));

        let camera = binding(vk::DescriptorType::UNIFORM_BUFFER, 1);
        assert!(camera.flags().is_empty());
    }

    #[test]
    fn test_layout_flags_follow_arrays() {
        let camera = binding(vk::DescriptorType::UNIFORM_BUFFER, 1);
        let textures = binding(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1024);

        assert!(layout_flags(&[camera]).is_empty());
        assert_eq!(
            layout_flags(&[camera, textures]),
            vk::DescriptorSetLayoutCreateFlags::UPDATE_AFTER_BIND_POOL
        );
    }

    #[test]
    fn test_pool_sizes_one_entry_per_type() {
        let sizes = pool_sizes([
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::DescriptorType::STORAGE_BUFFER,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        ]);

        assert_eq!(sizes.len(), 3);
        assert!(sizes.iter().all(|s| s.descriptor_count == POOL_DESCRIPTORS_PER_TYPE));
        assert_eq!(POOL_DESCRIPTORS_PER_TYPE, 65_536);
    }
}
