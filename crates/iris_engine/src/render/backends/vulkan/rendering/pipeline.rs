//! Declarative graphics pipeline construction
//!
//! [`PipelineBuilder`] collects vertex layout, shaders, descriptor bindings and
//! push constant ranges, then [`PipelineBuilder::build`] turns them into a
//! [`Pipeline`] that owns its layouts, its descriptor pool and one allocated set
//! per declared set index.
//!
//! Fixed-function state: triangle lists, no culling, depth test LESS with
//! writes, dynamic viewport and scissor. Color attachment 0 alpha-blends; the
//! object-id attachment at index 1 is written unblended.

use super::shader::ShaderModule;
use super::vertex_layout::VulkanVertexLayout;
use crate::render::backends::vulkan::resources::descriptor_set::{
    DescriptorBinding, DescriptorPool, DescriptorSetLayout,
};
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::vertex::VertexAttribute;
use ash::{vk, Device};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Push constant ranges laid out back to back in declaration order
#[derive(Debug, Clone, Default)]
pub struct PushConstantLayout {
    ranges: Vec<vk::PushConstantRange>,
}

impl PushConstantLayout {
    /// Append a range for `stages`, returning its offset
    pub fn push(&mut self, stages: vk::ShaderStageFlags, size: u32) -> u32 {
        let offset = self.total_size();
        self.ranges.push(vk::PushConstantRange {
            stage_flags: stages,
            offset,
            size,
        });
        offset
    }

    /// Bytes covered by all ranges
    pub fn total_size(&self) -> u32 {
        self.ranges.last().map_or(0, |r| r.offset + r.size)
    }

    /// Ranges in declaration order
    pub fn ranges(&self) -> &[vk::PushConstantRange] {
        &self.ranges
    }
}

/// Accumulates pipeline state until [`build`](Self::build)
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    name: String,
    vertex_layout: Option<(u32, Vec<VertexAttribute>)>,
    vertex_shader: Option<PathBuf>,
    fragment_shader: Option<PathBuf>,
    sets: BTreeMap<u32, Vec<DescriptorBinding>>,
    push_constants: PushConstantLayout,
}

impl PipelineBuilder {
    /// Start a pipeline; `name` only shows up in logs
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Per-vertex input of `stride` bytes; without this the pipeline reads no vertex buffer
    pub fn set_vertex_layout(mut self, stride: u32, attributes: &[VertexAttribute]) -> Self {
        self.vertex_layout = Some((stride, attributes.to_vec()));
        self
    }

    /// SPIR-V vertex shader
    pub fn add_vertex_shader(mut self, path: impl Into<PathBuf>) -> Self {
        self.vertex_shader = Some(path.into());
        self
    }

    /// SPIR-V fragment shader
    pub fn add_fragment_shader(mut self, path: impl Into<PathBuf>) -> Self {
        self.fragment_shader = Some(path.into());
        self
    }

    /// Uniform buffer binding
    pub fn add_uniform(self, set: u32, binding: u32, stages: vk::ShaderStageFlags, count: u32) -> Self {
        self.add_binding(set, binding, vk::DescriptorType::UNIFORM_BUFFER, stages, count)
    }

    /// Storage buffer binding
    pub fn add_storage_buffer(self, set: u32, binding: u32, stages: vk::ShaderStageFlags, count: u32) -> Self {
        self.add_binding(set, binding, vk::DescriptorType::STORAGE_BUFFER, stages, count)
    }

    /// Combined image sampler binding; `count > 1` declares a sparse array
    pub fn add_image(self, set: u32, binding: u32, stages: vk::ShaderStageFlags, count: u32) -> Self {
        self.add_binding(set, binding, vk::DescriptorType::COMBINED_IMAGE_SAMPLER, stages, count)
    }

    /// Push constant range following the previously added ones
    pub fn add_push_constant(mut self, stages: vk::ShaderStageFlags, size: u32) -> Self {
        self.push_constants.push(stages, size);
        self
    }

    fn add_binding(
        mut self,
        set: u32,
        binding: u32,
        ty: vk::DescriptorType,
        stages: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        let bindings = self.sets.entry(set).or_default();
        // Redeclaring a binding replaces it.
        bindings.retain(|b| b.binding != binding);
        bindings.push(DescriptorBinding {
            binding,
            ty,
            count: count.max(1),
            stages,
        });
        self
    }

    /// Declared push constant ranges
    pub fn push_constants(&self) -> &PushConstantLayout {
        &self.push_constants
    }

    /// Bindings of every set index up to the highest declared one; gaps are empty sets
    pub fn set_layouts(&self) -> Vec<Vec<DescriptorBinding>> {
        let Some(&last) = self.sets.keys().next_back() else {
            return Vec::new();
        };
        (0..=last)
            .map(|set| self.sets.get(&set).cloned().unwrap_or_default())
            .collect()
    }

    /// Create the pipeline against subpass 0 of `render_pass`
    pub fn build(self, device: Device, render_pass: vk::RenderPass) -> VulkanResult<Pipeline> {
        let vertex_path = self.vertex_shader.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("pipeline '{}' has no vertex shader", self.name),
        })?;
        let fragment_path = self.fragment_shader.as_ref().ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("pipeline '{}' has no fragment shader", self.name),
        })?;

        let vertex_layout = match &self.vertex_layout {
            Some((stride, attributes)) => VulkanVertexLayout::new(*stride, attributes)?,
            None => VulkanVertexLayout::empty(),
        };

        let vertex_shader = ShaderModule::from_file(device.clone(), vertex_path)?;
        let fragment_shader = ShaderModule::from_file(device.clone(), fragment_path)?;

        // Descriptor layouts, pool and sets. Each step is owned by `descriptors`
        // so a later failure releases what was created.
        let set_layouts = self
            .set_layouts()
            .into_iter()
            .map(|bindings| DescriptorSetLayout::new(device.clone(), bindings))
            .collect::<VulkanResult<Vec<_>>>()?;
        let descriptors = Descriptors::allocate(&device, set_layouts)?;

        let layout_handles: Vec<_> = descriptors.layouts.iter().map(DescriptorSetLayout::handle).collect();
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&layout_handles)
            .push_constant_ranges(self.push_constants.ranges());
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None)? };

        let stages = [
            vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX),
            fragment_shader.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(vertex_layout.bindings())
            .vertex_attribute_descriptions(vertex_layout.attributes());

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Counts only; the rectangles are set per frame.
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let blend_attachments = color_blend_attachments();
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0)
            .build();

        let created = unsafe { device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None) };
        let pipeline = match created {
            Ok(pipelines) => pipelines.into_iter().next(),
            Err((_, err)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(err.into());
            }
        };
        let Some(pipeline) = pipeline else {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            return Err(VulkanError::InitializationFailed(format!(
                "pipeline '{}' was not created",
                self.name
            )));
        };

        log::info!(
            "Built pipeline '{}': {} descriptor sets, {} push constant bytes",
            self.name,
            descriptors.sets.len(),
            self.push_constants.total_size()
        );

        Ok(Pipeline {
            device,
            pipeline,
            layout,
            descriptors,
        })
    }
}

/// Blend state per color attachment: alpha blending for color, none for object ids
pub fn color_blend_attachments() -> [vk::PipelineColorBlendAttachmentState; 2] {
    let color = vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(true)
        .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
        .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
        .color_blend_op(vk::BlendOp::ADD)
        .src_alpha_blend_factor(vk::BlendFactor::ONE)
        .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
        .alpha_blend_op(vk::BlendOp::ADD)
        .build();

    // Integer attachments cannot blend.
    let object_id = vk::PipelineColorBlendAttachmentState::builder()
        .color_write_mask(vk::ColorComponentFlags::R)
        .blend_enable(false)
        .build();

    [color, object_id]
}

/// Set layouts, their pool and the sets allocated from it
struct Descriptors {
    sets: Vec<vk::DescriptorSet>,
    layouts: Vec<DescriptorSetLayout>,
    pool: Option<DescriptorPool>,
}

impl Descriptors {
    fn allocate(device: &Device, layouts: Vec<DescriptorSetLayout>) -> VulkanResult<Self> {
        if layouts.is_empty() {
            return Ok(Self {
                sets: Vec::new(),
                layouts,
                pool: None,
            });
        }

        let types = layouts
            .iter()
            .flat_map(|layout| layout.bindings().iter().map(|b| b.ty))
            .collect::<Vec<_>>();
        let pool = DescriptorPool::new(device.clone(), types)?;
        let handles: Vec<_> = layouts.iter().map(DescriptorSetLayout::handle).collect();
        let sets = pool.allocate(&handles)?;

        Ok(Self {
            sets,
            layouts,
            pool: Some(pool),
        })
    }
}

impl Drop for Descriptors {
    fn drop(&mut self) {
        // Sets go back to the pool before the layouts and the pool are destroyed.
        if let Some(pool) = &self.pool {
            if let Err(e) = pool.free(&self.sets) {
                log::warn!("Failed to free descriptor sets: {e}");
            }
        }
        self.sets.clear();
    }
}

/// Graphics pipeline with its layout and descriptor sets
pub struct Pipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    descriptors: Descriptors,
}

impl Pipeline {
    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Descriptor sets in set-index order, ready to bind at set 0
    pub fn descriptor_sets(&self) -> &[vk::DescriptorSet] {
        &self.descriptors.sets
    }

    fn declared(&self, set: u32, binding: u32) -> VulkanResult<(vk::DescriptorSet, DescriptorBinding)> {
        let not_declared = || VulkanError::DescriptorNotDeclared { set, binding };
        let layout = self.descriptors.layouts.get(set as usize).ok_or_else(not_declared)?;
        let declared = *layout.binding(binding).ok_or_else(not_declared)?;
        let handle = *self.descriptors.sets.get(set as usize).ok_or_else(not_declared)?;
        Ok((handle, declared))
    }

    fn check_index(declared: &DescriptorBinding, set: u32, array_index: u32) -> VulkanResult<()> {
        if array_index >= declared.count {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "array index {array_index} out of range for set {set} binding {} ({} entries)",
                    declared.binding, declared.count
                ),
            });
        }
        Ok(())
    }

    /// Write a buffer descriptor into `set`/`binding` at `array_index`
    pub fn update_buffer(
        &self,
        set: u32,
        binding: u32,
        info: vk::DescriptorBufferInfo,
        array_index: u32,
    ) -> VulkanResult<()> {
        let (handle, declared) = self.declared(set, binding)?;
        if declared.ty == vk::DescriptorType::COMBINED_IMAGE_SAMPLER {
            return Err(VulkanError::InvalidOperation {
                reason: format!("set {set} binding {binding} holds images, not buffers"),
            });
        }
        Self::check_index(&declared, set, array_index)?;

        let infos = [info];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(handle)
            .dst_binding(binding)
            .dst_array_element(array_index)
            .descriptor_type(declared.ty)
            .buffer_info(&infos)
            .build();

        unsafe { self.device.update_descriptor_sets(&[write], &[]) };
        Ok(())
    }

    /// Write an image descriptor into `set`/`binding` at `array_index`
    pub fn update_image(
        &self,
        set: u32,
        binding: u32,
        info: vk::DescriptorImageInfo,
        array_index: u32,
    ) -> VulkanResult<()> {
        let (handle, declared) = self.declared(set, binding)?;
        if declared.ty != vk::DescriptorType::COMBINED_IMAGE_SAMPLER {
            return Err(VulkanError::InvalidOperation {
                reason: format!("set {set} binding {binding} holds buffers, not images"),
            });
        }
        Self::check_index(&declared, set, array_index)?;

        let infos = [info];
        let write = vk::WriteDescriptorSet::builder()
            .dst_set(handle)
            .dst_binding(binding)
            .dst_array_element(array_index)
            .descriptor_type(declared.ty)
            .image_info(&infos)
            .build();

        unsafe { self.device.update_descriptor_sets(&[write], &[]) };
        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
        // `descriptors` drops next: sets, then layouts, then the pool.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::push_constants::{FRAGMENT_RANGE_SIZE, VERTEX_RANGE_SIZE};

    #[test]
    fn test_push_constant_offsets_accumulate() {
        let builder = PipelineBuilder::new("mesh")
            .add_push_constant(vk::ShaderStageFlags::VERTEX, VERTEX_RANGE_SIZE)
            .add_push_constant(vk::ShaderStageFlags::FRAGMENT, FRAGMENT_RANGE_SIZE);

        let ranges = builder.push_constants().ranges();
        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].offset, ranges[0].size), (0, 64));
        assert_eq!((ranges[1].offset, ranges[1].size), (64, 8));
        assert_eq!(ranges[1].stage_flags, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(builder.push_constants().total_size(), 72);
    }

    #[test]
    fn test_empty_push_constant_layout() {
        let mut layout = PushConstantLayout::default();
        assert_eq!(layout.total_size(), 0);
        assert_eq!(layout.push(vk::ShaderStageFlags::VERTEX, 16), 0);
        assert_eq!(layout.push(vk::ShaderStageFlags::VERTEX, 16), 16);
    }

    #[test]
    fn test_sets_are_dense_up_to_highest_index() {
        let builder = PipelineBuilder::new("mesh")
            .add_uniform(0, 0, vk::ShaderStageFlags::VERTEX, 1)
            .add_storage_buffer(0, 1, vk::ShaderStageFlags::FRAGMENT, 1)
            .add_image(2, 0, vk::ShaderStageFlags::FRAGMENT, 1024);

        let sets = builder.set_layouts();
        assert_eq!(sets.len(), 3);
        assert_eq!(sets[0].len(), 2);
        assert!(sets[1].is_empty());
        assert_eq!(sets[2][0].count, 1024);
        assert!(sets[2][0].is_array());
    }

    #[test]
    fn test_redeclared_binding_replaces_previous() {
        let builder = PipelineBuilder::new("mesh")
            .add_uniform(0, 0, vk::ShaderStageFlags::VERTEX, 1)
            .add_storage_buffer(0, 0, vk::ShaderStageFlags::FRAGMENT, 0);

        let sets = builder.set_layouts();
        assert_eq!(sets[0].len(), 1);
        assert_eq!(sets[0][0].ty, vk::DescriptorType::STORAGE_BUFFER);
        assert_eq!(sets[0][0].count, 1);
    }

    #[test]
    fn test_blend_only_on_color_attachment() {
        let [color, object_id] = color_blend_attachments();
        assert_eq!(color.blend_enable, vk::TRUE);
        assert_eq!(color.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(object_id.blend_enable, vk::FALSE);
        assert_eq!(object_id.color_write_mask, vk::ColorComponentFlags::R);
    }
}
