//! Iris viewer
//!
//! Opens a window, builds a small lit scene and runs the frame loop. Click an
//! object to log the entity under the cursor. Settings come from `iris.toml`
//! in the working directory when it exists.

use glfw::{Action, Key, MouseButton, WindowEvent};
use iris_engine::foundation::logging::{self, LoggingConfig};
use iris_engine::prelude::*;
use iris_engine::scene::SceneError;
use std::error::Error;
use std::time::Instant;

const CONFIG_PATH: &str = "iris.toml";
const CRATE_TEXTURE: &str = "resources/textures/checker.png";

/// Entities the viewer animates
struct DemoScene {
    scene: Scene,
    spinning_cube: EntityId,
}

impl DemoScene {
    /// Subscribe `renderer` to a new scene, then spawn the demo entities
    fn build(renderer: &VulkanRenderer) -> Self {
        let mut scene = Scene::new();
        scene.subscribe(renderer.entity_queue());

        let spinning_cube = scene.spawn(
            EntityDesc::new()
                .with_mesh(MeshData::cube())
                .with_material(Material::new(CRATE_TEXTURE)),
        );
        scene.spawn(
            EntityDesc::new()
                .with_transform(Transform::from_position(Vec3::new(-2.5, 0.0, -1.0)).with_scale(0.75))
                .with_mesh(MeshData::cube()),
        );
        scene.spawn(
            EntityDesc::new()
                .with_transform(Transform::from_position(Vec3::new(2.5, -0.25, -0.5)).with_scale(0.5))
                .with_mesh(MeshData::cube())
                .with_material(Material::new(CRATE_TEXTURE)),
        );

        scene.spawn(
            EntityDesc::new()
                .with_transform(Transform::from_position(Vec3::new(0.0, 1.5, 6.0)).with_yaw_pitch(0.0, -0.2))
                .with_camera(Camera::default()),
        );

        scene.spawn(
            EntityDesc::new()
                .with_transform(Transform::from_position(Vec3::new(2.0, 2.0, 2.0)))
                .with_light(Light::point(Vec3::new(1.0, 0.6, 0.3), 2.0, 10.0)),
        );
        scene.spawn(
            EntityDesc::new()
                .with_transform(Transform::from_position(Vec3::new(-2.0, 1.0, 1.5)))
                .with_light(Light::point(Vec3::new(0.3, 0.5, 1.0), 1.5, 8.0)),
        );
        scene.spawn(
            EntityDesc::new()
                .with_transform(Transform::identity().with_yaw_pitch(0.6, -0.9))
                .with_light(Light::directional(Vec3::new(1.0, 1.0, 1.0), 0.4)),
        );

        log::info!("Demo scene built with {} entities", scene.len());
        Self { scene, spinning_cube }
    }

    fn animate(&mut self, seconds: f32) -> Result<(), SceneError> {
        let transform = self.scene.transform_mut(self.spinning_cube)?;
        transform.rotation = Quat::from_axis_angle(&Vec3::y_axis(), seconds * 0.6)
            * Quat::from_axis_angle(&Vec3::x_axis(), seconds * 0.25);
        Ok(())
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = ApplicationConfig::load_or_default(CONFIG_PATH)?;
    logging::init(
        &LoggingConfig::with_filter(config.engine.log_level.clone()).with_log_file(config.engine.log_file_path()),
    );
    config.validate()?;

    log::info!("Starting Iris viewer");

    let missing = config.renderer.shaders.missing_files();
    if !missing.is_empty() {
        log::warn!("Shader binaries not found: {missing:?} (build with VULKAN_SDK set to compile them)");
    }

    let mut window = Window::new(
        &config.engine.window_title,
        config.engine.window_width,
        config.engine.window_height,
    )?;
    let mut renderer = VulkanRenderer::new(&window, &config.renderer)?;
    let mut demo = DemoScene::build(&renderer);

    let mut mouse = MouseState::default();
    mouse.update_sizes(window.size(), window.framebuffer_size());

    let start = Instant::now();
    let mut consecutive_timeouts = 0;

    while !window.should_close() {
        window.poll_events();
        for event in window.flush_events() {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) | WindowEvent::Close => {
                    window.set_should_close(true);
                }
                WindowEvent::CursorPos(x, y) => mouse.update_position(x, y),
                WindowEvent::MouseButton(MouseButton::Button1, Action::Press, _) => mouse.set_left_click(true),
                _ => {}
            }
        }

        if mouse.left_click {
            match mouse.pixel() {
                Some((x, y)) => renderer.request_pick(x, y),
                None => log::debug!("Click outside the framebuffer ignored"),
            }
        }
        mouse.clear_clicks();

        demo.animate(start.elapsed().as_secs_f32())?;

        match renderer.draw_frame(&demo.scene) {
            Ok(()) => consecutive_timeouts = 0,
            Err(e) if e.is_retryable() => {
                consecutive_timeouts += 1;
                log::warn!("{e} ({consecutive_timeouts} in a row)");
                if consecutive_timeouts >= config.engine.max_consecutive_timeouts {
                    return Err(e.into());
                }
            }
            Err(e) => return Err(e.into()),
        }

        if let Some(pick) = renderer.take_pick_result() {
            match pick.entity {
                Some(entity) => log::info!("Picked {entity} at pixel {:?}", pick.pixel),
                None => log::info!("Picked background at pixel {:?}", pick.pixel),
            }
        }
    }

    renderer.wait_idle()?;
    log::info!("Iris viewer shut down cleanly");
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        // No-op when the configured logger is already installed.
        logging::init(&LoggingConfig::default().with_log_file(EngineConfig::default().log_file_path()));
        log::error!("Fatal: {e}");
        std::process::exit(1);
    }
}
