//! Frame loop of the Vulkan backend
//!
//! One frame in flight. Each [`VulkanRenderer::draw_frame`] call runs:
//! 1. wait for the previous frame's fence (bounded)
//! 2. read back a pick recorded last frame
//! 3. drain the entity queue and upload new meshes and textures
//! 4. acquire a swapchain image (bounded), then reset the fence
//! 5. write camera and light data, record the render pass
//! 6. submit on the graphics queue and present
//!
//! Everything the GPU may still be reading is touched only after step 1, so
//! uniform and descriptor writes never race an in-flight command buffer.

use super::picking::{PickReadback, PickResult};
use super::rendering::commands::{ActiveRenderPass, CommandPool, CommandRecorder};
use super::rendering::pipeline::{Pipeline, PipelineBuilder};
use super::rendering::render_pass::{clear_values, RenderPass};
use super::resources::buffer::{Buffer, MemoryAccess};
use super::resources::mesh::GpuMesh;
use super::resources::texture::Texture;
use super::state::frame_targets::FrameTargets;
use super::state::swapchain::Swapchain;
use super::state::sync::FrameSync;
use super::upload::UploadContext;
use super::{VulkanContext, VulkanError, VulkanResult, Window};
use crate::core::config::RendererConfig;
use crate::render::camera::CameraData;
use crate::render::entity_queue::EntityQueue;
use crate::render::lighting::{GpuLight, LightBlock};
use crate::render::material::{texture_slot, texture_sources, TextureChannel, MATERIAL_SET, TEXTURE_ARRAY_SIZE};
use crate::render::push_constants::{DrawPushConstants, FRAGMENT_RANGE_SIZE, VERTEX_RANGE_SIZE};
use crate::render::decode_object_id;
use crate::render::vertex::Vertex;
use crate::scene::{EntityId, SceneQuery};
use ash::vk;
use std::collections::HashSet;
use std::sync::Arc;

const CAMERA_SET: u32 = 0;
const CAMERA_BINDING: u32 = 0;
const LIGHT_BINDING: u32 = 1;

/// Vertices of one light billboard quad
const BILLBOARD_VERTICES: u32 = 6;

/// Viewport with Y pointing up: origin at the bottom edge, negative height
pub fn flipped_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: extent.height as f32,
        width: extent.width as f32,
        height: -(extent.height as f32),
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Vulkan renderer
///
/// Fields are declared in teardown order; `Drop` waits for the device to go
/// idle and the fields then drop top to bottom.
pub struct VulkanRenderer {
    meshes: Vec<GpuMesh>,
    textures: Vec<Texture>,

    mesh_pipeline: Pipeline,
    billboard_pipeline: Option<Pipeline>,

    camera_buffer: Buffer<CameraData>,
    light_buffer: Buffer<LightBlock>,
    picking: PickReadback,

    sync: FrameSync,
    upload: UploadContext,
    command_buffer: vk::CommandBuffer,
    command_pool: CommandPool,
    frame_targets: FrameTargets,
    render_pass: RenderPass,
    swapchain: Swapchain,
    context: VulkanContext,

    entity_queue: Arc<EntityQueue>,
    textured: HashSet<EntityId>,
    config: RendererConfig,
    lights_warned: bool,
    frame_count: u64,
}

impl VulkanRenderer {
    /// Create the device, swapchain, pipelines and per-frame resources for `window`
    pub fn new(window: &Window, config: &RendererConfig) -> VulkanResult<Self> {
        log::debug!("Creating VulkanRenderer...");

        let context = VulkanContext::new(window, config)?;

        let (width, height) = window.framebuffer_size();
        let swapchain = Swapchain::new(&context, vk::Extent2D { width, height })?;
        let render_pass = RenderPass::new_forward_pass(context.raw_device(), swapchain.format().format)?;
        let frame_targets = FrameTargets::new(&context, &swapchain, render_pass.handle())?;

        let command_pool = CommandPool::new(context.raw_device(), context.queue_families().graphics)?;
        let command_buffer = command_pool.allocate_command_buffer()?;
        let upload = UploadContext::new(&context, config.upload_timeout_ns())?;
        let sync = FrameSync::new(context.raw_device())?;

        let camera_buffer = Buffer::new(&context, vk::BufferUsageFlags::UNIFORM_BUFFER, 1, MemoryAccess::HostVisible)?;
        let light_buffer = Buffer::new(&context, vk::BufferUsageFlags::STORAGE_BUFFER, 1, MemoryAccess::HostVisible)?;
        let picking = PickReadback::new(&context)?;

        let mesh_pipeline = Self::build_mesh_pipeline(&context, &render_pass, config)?;
        Self::bind_frame_buffers(&mesh_pipeline, &camera_buffer, &light_buffer)?;

        let billboard_pipeline = if config.draw_light_billboards {
            let pipeline = Self::build_billboard_pipeline(&context, &render_pass, config)?;
            Self::bind_frame_buffers(&pipeline, &camera_buffer, &light_buffer)?;
            Some(pipeline)
        } else {
            None
        };

        log::info!(
            "VulkanRenderer ready: {}x{}, {} swapchain images, billboards {}",
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.image_count(),
            if billboard_pipeline.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            meshes: Vec::new(),
            textures: Vec::new(),
            mesh_pipeline,
            billboard_pipeline,
            camera_buffer,
            light_buffer,
            picking,
            sync,
            upload,
            command_buffer,
            command_pool,
            frame_targets,
            render_pass,
            swapchain,
            context,
            entity_queue: Arc::new(EntityQueue::new()),
            textured: HashSet::new(),
            config: config.clone(),
            lights_warned: false,
            frame_count: 0,
        })
    }

    fn build_mesh_pipeline(
        context: &VulkanContext,
        render_pass: &RenderPass,
        config: &RendererConfig,
    ) -> VulkanResult<Pipeline> {
        let mut builder = PipelineBuilder::new("mesh")
            .set_vertex_layout(Vertex::stride(), &Vertex::description())
            .add_vertex_shader(&config.shaders.mesh_vertex)
            .add_fragment_shader(&config.shaders.mesh_fragment)
            .add_uniform(
                CAMERA_SET,
                CAMERA_BINDING,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_storage_buffer(CAMERA_SET, LIGHT_BINDING, vk::ShaderStageFlags::FRAGMENT, 1);

        for channel in TextureChannel::ALL {
            builder = builder.add_image(
                MATERIAL_SET,
                channel.binding(),
                vk::ShaderStageFlags::FRAGMENT,
                TEXTURE_ARRAY_SIZE,
            );
        }

        builder
            .add_push_constant(vk::ShaderStageFlags::VERTEX, VERTEX_RANGE_SIZE)
            .add_push_constant(vk::ShaderStageFlags::FRAGMENT, FRAGMENT_RANGE_SIZE)
            .build(context.raw_device(), render_pass.handle())
    }

    fn build_billboard_pipeline(
        context: &VulkanContext,
        render_pass: &RenderPass,
        config: &RendererConfig,
    ) -> VulkanResult<Pipeline> {
        // No vertex layout: the quad comes from gl_VertexIndex.
        PipelineBuilder::new("light billboard")
            .add_vertex_shader(&config.shaders.billboard_vertex)
            .add_fragment_shader(&config.shaders.billboard_fragment)
            .add_uniform(
                CAMERA_SET,
                CAMERA_BINDING,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_storage_buffer(CAMERA_SET, LIGHT_BINDING, vk::ShaderStageFlags::FRAGMENT, 1)
            .add_push_constant(vk::ShaderStageFlags::VERTEX, VERTEX_RANGE_SIZE)
            .add_push_constant(vk::ShaderStageFlags::FRAGMENT, FRAGMENT_RANGE_SIZE)
            .build(context.raw_device(), render_pass.handle())
    }

    /// Point set 0 of `pipeline` at the camera and light buffers
    fn bind_frame_buffers(
        pipeline: &Pipeline,
        camera: &Buffer<CameraData>,
        lights: &Buffer<LightBlock>,
    ) -> VulkanResult<()> {
        pipeline.update_buffer(CAMERA_SET, CAMERA_BINDING, camera.descriptor_info(), 0)?;
        pipeline.update_buffer(CAMERA_SET, LIGHT_BINDING, lights.descriptor_info(), 0)
    }

    /// Queue to register with the scene as an observer
    pub fn entity_queue(&self) -> Arc<EntityQueue> {
        Arc::clone(&self.entity_queue)
    }

    /// Swapchain size in pixels
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Meshes resident on the GPU
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Textures resident on the GPU
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Sample the object id at framebuffer pixel `(x, y)` in the next frame
    pub fn request_pick(&mut self, x: u32, y: u32) {
        self.picking.request((x, y));
    }

    /// Latest completed pick, available one frame after the request was drawn
    pub fn take_pick_result(&mut self) -> Option<PickResult> {
        self.picking.take_result()
    }

    /// Render and present one frame of `scene`
    ///
    /// A bounded wait that expires returns [`VulkanError::Timeout`] with the
    /// frame fence still signaled, so the call can simply be repeated. A stalled
    /// upload returns [`VulkanError::UploadStalled`] and is fatal.
    pub fn draw_frame(&mut self, scene: &dyn SceneQuery) -> VulkanResult<()> {
        let timeout_ns = self.config.frame_timeout_ns();

        self.sync.in_flight.wait_bounded(timeout_ns, "frame fence")?;

        // The previous frame is complete: its pick copy and every resource it read are free.
        self.picking.resolve(scene)?;
        self.upload_new_entities(scene)?;

        let image_index = self
            .swapchain
            .acquire_next_image(self.sync.image_available.handle(), timeout_ns)?;
        self.sync.in_flight.reset()?;

        let lights = self.write_frame_uniforms(scene)?;
        let command_buffer = self.record_commands(scene, &lights, image_index)?;
        self.submit(command_buffer)?;

        self.swapchain
            .present(self.context.present_queue(), image_index, self.sync.render_finished.handle())?;

        self.frame_count += 1;
        if self.frame_count % 600 == 0 {
            log::trace!("Presented {} frames, {} meshes resident", self.frame_count, self.meshes.len());
        }
        Ok(())
    }

    /// Upload GPU resources for every entity added since the last frame
    fn upload_new_entities(&mut self, scene: &dyn SceneQuery) -> VulkanResult<()> {
        for id in self.entity_queue.drain() {
            if !scene.contains(id) {
                log::debug!("Skipping {id}: despawned before upload");
                continue;
            }

            if let Some(mesh) = scene.mesh(id) {
                match mesh.validate() {
                    Ok(()) => self.meshes.push(GpuMesh::new(&self.context, &self.upload, id, mesh)?),
                    Err(e) => log::warn!("Not drawing {id}: {e}"),
                }
            }

            if let Some(material) = scene.material(id) {
                self.upload_material(id, &material.texture)?;
            }
        }
        Ok(())
    }

    /// Load a material's textures and bind them at the entity's array slot
    fn upload_material(&mut self, id: EntityId, texture: &str) -> VulkanResult<()> {
        let sources = texture_sources(texture);
        if sources.is_empty() {
            return Ok(());
        }

        let Some(slot) = texture_slot(id.index()) else {
            log::warn!("{id} is past the {TEXTURE_ARRAY_SIZE}-entry texture arrays; drawing it untextured");
            return Ok(());
        };

        let mut bound_albedo = false;
        for source in sources {
            let texture = match Texture::from_file(&self.context, &self.upload, &source.path, source.channel.encoding()) {
                Ok(texture) => texture,
                Err(e @ VulkanError::TextureLoad { .. }) => {
                    log::warn!("{e}; {id} loses its {:?} map", source.channel);
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.mesh_pipeline
                .update_image(MATERIAL_SET, source.channel.binding(), texture.descriptor_info(), slot)?;
            bound_albedo |= source.channel == TextureChannel::Albedo;
            self.textures.push(texture);
        }

        if bound_albedo {
            self.textured.insert(id);
        } else {
            self.textured.remove(&id);
            log::warn!("{id} has no usable albedo texture; drawing it untextured");
        }
        Ok(())
    }

    /// Write this frame's camera and light data into the mapped buffers
    fn write_frame_uniforms(&mut self, scene: &dyn SceneQuery) -> VulkanResult<LightBlock> {
        let extent = self.swapchain.extent();
        let camera = self
            .entity_queue
            .active_camera()
            .and_then(|id| Some((scene.camera(id)?, scene.transform(id)?)))
            .map_or_else(CameraData::fallback, |(camera, transform)| {
                CameraData::new(&camera.with_viewport(extent.width, extent.height), transform)
            });
        self.camera_buffer.write(&[camera])?;

        let (lights, skipped) = LightBlock::collect(scene, self.config.max_lights);
        if skipped > 0 && !self.lights_warned {
            log::warn!(
                "Scene has {} more lights than the {} the renderer draws; extras are ignored",
                skipped,
                self.config.max_lights
            );
            self.lights_warned = true;
        }
        self.light_buffer.write(&[lights])?;
        Ok(lights)
    }

    fn record_commands(
        &mut self,
        scene: &dyn SceneQuery,
        lights: &LightBlock,
        image_index: u32,
    ) -> VulkanResult<vk::CommandBuffer> {
        let extent = self.swapchain.extent();
        let framebuffer = self
            .frame_targets
            .framebuffer(image_index)
            .ok_or_else(|| VulkanError::InvalidOperation {
                reason: format!("no framebuffer for swapchain image {image_index}"),
            })?;
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        let clears = clear_values(self.config.clear_color);

        let mut recorder = CommandRecorder::begin(self.context.raw_device(), self.command_buffer)?;
        {
            let mut pass = recorder.begin_render_pass(self.render_pass.handle(), framebuffer, render_area, &clears);
            pass.set_viewport(flipped_viewport(extent));
            pass.set_scissor(render_area);

            let mesh_pipeline = &self.mesh_pipeline;
            pass.bind_pipeline(mesh_pipeline.handle());
            pass.bind_descriptor_sets(mesh_pipeline.layout(), mesh_pipeline.descriptor_sets());

            for mesh in &self.meshes {
                let Some(constants) = mesh_draw_constants(scene, mesh.entity(), &self.textured) else {
                    continue;
                };
                push_draw_constants(&mut pass, mesh_pipeline, &constants);
                mesh.draw(&mut pass);
            }

            if let Some(billboard) = &self.billboard_pipeline {
                pass.bind_pipeline(billboard.handle());
                pass.bind_descriptor_sets(billboard.layout(), billboard.descriptor_sets());

                for (slot, light) in lights.active().iter().enumerate() {
                    let Some(constants) = billboard_draw_constants(scene, slot, light) else {
                        continue;
                    };
                    push_draw_constants(&mut pass, billboard, &constants);
                    pass.draw(BILLBOARD_VERTICES);
                }
            }
        }

        let object_id = self.frame_targets.object_id();
        self.picking.record(&mut recorder, object_id.image(), extent);

        recorder.end()
    }

    fn submit(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        let wait_semaphores = [self.sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [self.sync.render_finished.handle()];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.context.device().device.queue_submit(
                self.context.graphics_queue(),
                &[submit_info],
                self.sync.in_flight.handle(),
            )?;
        }
        Ok(())
    }

    /// Block until the GPU is idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }
}

/// Push constants for one mesh draw, or `None` when its owner is gone
///
/// The model matrix comes from the scene on every call. The texture index is
/// the entity's slot only when its albedo was bound and the slot fits the arrays.
pub fn mesh_draw_constants(
    scene: &dyn SceneQuery,
    entity: EntityId,
    textured: &HashSet<EntityId>,
) -> Option<DrawPushConstants> {
    let transform = scene.transform(entity)?;
    let texture = textured
        .contains(&entity)
        .then(|| texture_slot(entity.index()))
        .flatten();
    Some(DrawPushConstants::new(&transform.to_matrix(), entity.object_id(), texture))
}

/// Push constants for the billboard of the light at `slot` in the light block
///
/// The fragment stage reads the light's color through `texture_index`, so it
/// carries the slot rather than a texture.
pub fn billboard_draw_constants(scene: &dyn SceneQuery, slot: usize, light: &GpuLight) -> Option<DrawPushConstants> {
    let object_id = light.flags[2];
    let transform = decode_object_id(scene, object_id).and_then(|id| scene.transform(id))?;
    Some(DrawPushConstants::new(&transform.to_matrix(), object_id, Some(slot as u32)))
}

fn push_draw_constants(
    pass: &mut ActiveRenderPass<'_>,
    pipeline: &Pipeline,
    constants: &DrawPushConstants,
) {
    pass.push_constants(pipeline.layout(), vk::ShaderStageFlags::VERTEX, 0, constants.vertex_bytes());
    pass.push_constants(
        pipeline.layout(),
        vk::ShaderStageFlags::FRAGMENT,
        VERTEX_RANGE_SIZE,
        constants.fragment_bytes(),
    );
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        log::debug!("Tearing down VulkanRenderer after {} frames", self.frame_count);
        if let Err(e) = self.context.wait_idle() {
            log::error!("Device did not go idle before teardown: {e}");
        }
        // Fields drop in declaration order from here.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{utils, Transform, Vec3};
    use crate::render::push_constants::NO_TEXTURE;
    use crate::scene::{EntityDesc, Light, Material, MeshData, Scene};
    use approx::assert_relative_eq;

    fn cube_at(x: f32) -> EntityDesc {
        EntityDesc::new()
            .with_transform(Transform::from_position(Vec3::new(x, 0.0, 0.0)))
            .with_mesh(MeshData::cube())
    }

    #[test]
    fn test_mesh_constants_read_current_transform() {
        let mut scene = Scene::new();
        let cube = scene.spawn(cube_at(1.0));
        let textured = HashSet::new();

        let before = mesh_draw_constants(&scene, cube, &textured).unwrap();
        assert_relative_eq!(before.model[3][0], 1.0);

        scene.transform_mut(cube).unwrap().position = Vec3::new(-4.0, 2.0, 0.0);
        let after = mesh_draw_constants(&scene, cube, &textured).unwrap();

        assert_relative_eq!(after.model[3][0], -4.0);
        assert_relative_eq!(after.model[3][1], 2.0);
        assert_eq!(after.model, utils::to_cols_array(&scene.transform(cube).unwrap().to_matrix()));
        assert_eq!(after.object_id, cube.object_id());
    }

    #[test]
    fn test_texture_index_is_entity_slot() {
        let mut scene = Scene::new();
        let plain = scene.spawn(cube_at(0.0));
        let crate_box = scene.spawn(cube_at(1.0).with_material(Material::new("crate.png")));
        let textured = HashSet::from([crate_box]);

        let constants = mesh_draw_constants(&scene, crate_box, &textured).unwrap();
        assert_eq!(constants.texture_index, crate_box.index());
        assert_eq!(constants.object_id, crate_box.index() + 1);

        let constants = mesh_draw_constants(&scene, plain, &textured).unwrap();
        assert_eq!(constants.texture_index, NO_TEXTURE);
    }

    #[test]
    fn test_despawned_owner_is_not_drawn_after_slot_reuse() {
        let mut scene = Scene::new();
        let old = scene.spawn(cube_at(1.0));
        let textured = HashSet::from([old]);
        scene.despawn(old).unwrap();
        assert!(mesh_draw_constants(&scene, old, &textured).is_none());

        let new = scene.spawn(cube_at(5.0));
        assert_eq!(new.index(), old.index());
        assert!(mesh_draw_constants(&scene, old, &textured).is_none());

        let constants = mesh_draw_constants(&scene, new, &textured).unwrap();
        assert_eq!(constants.texture_index, NO_TEXTURE);
        assert_relative_eq!(constants.model[3][0], 5.0);
    }

    #[test]
    fn test_slot_past_texture_arrays_draws_untextured() {
        let mut scene = Scene::new();
        let mut last = scene.spawn(EntityDesc::new());
        while last.index() < TEXTURE_ARRAY_SIZE {
            last = scene.spawn(cube_at(0.0));
        }
        let edge = scene.entity_at_index(TEXTURE_ARRAY_SIZE - 1).unwrap();
        let textured = HashSet::from([last, edge]);

        let inside = mesh_draw_constants(&scene, edge, &textured).unwrap();
        assert_eq!(inside.texture_index, TEXTURE_ARRAY_SIZE - 1);

        let past = mesh_draw_constants(&scene, last, &textured).unwrap();
        assert_eq!(past.texture_index, NO_TEXTURE);
        assert_eq!(past.object_id, TEXTURE_ARRAY_SIZE + 1);
    }

    #[test]
    fn test_billboard_carries_light_id_and_slot() {
        let mut scene = Scene::new();
        scene.spawn(cube_at(0.0));
        let first = scene.spawn(
            EntityDesc::new()
                .with_transform(Transform::from_position(Vec3::new(0.0, 3.0, 0.0)))
                .with_light(Light::point(Vec3::new(1.0, 0.0, 0.0), 1.0, 5.0)),
        );
        let second = scene.spawn(
            EntityDesc::new()
                .with_transform(Transform::from_position(Vec3::new(2.0, 1.0, 0.0)))
                .with_light(Light::point(Vec3::new(0.0, 0.0, 1.0), 1.0, 5.0)),
        );

        let (block, _) = LightBlock::collect(&scene, 8);
        let lights = block.active();

        let constants = billboard_draw_constants(&scene, 1, &lights[1]).unwrap();
        assert_eq!(constants.object_id, second.object_id());
        assert_eq!(constants.texture_index, 1);
        assert_relative_eq!(constants.model[3][0], 2.0);

        scene.despawn(first).unwrap();
        assert!(billboard_draw_constants(&scene, 0, &lights[0]).is_none());
    }

    #[test]
    fn test_flipped_viewport() {
        let viewport = flipped_viewport(vk::Extent2D { width: 1600, height: 900 });
        assert_relative_eq!(viewport.y, 900.0);
        assert_relative_eq!(viewport.height, -900.0);
        assert_relative_eq!(viewport.width, 1600.0);
        assert_relative_eq!(viewport.max_depth, 1.0);
    }
}
