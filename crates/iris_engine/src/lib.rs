//! # Iris Engine
//!
//! Vulkan rendering backend for the Iris 3D engine.
//!
//! ## Features
//!
//! - **Forward rendering**: textured meshes lit by a storage buffer of point,
//!   spot and directional lights
//! - **Object picking**: every draw writes its entity's id into a second color
//!   attachment that can be read back under the cursor
//! - **Transfer-queue uploads**: geometry and textures stream in through a
//!   dedicated queue with bounded waits
//! - **Scene decoupling**: the renderer holds entity ids only and learns about
//!   new entities through an observer queue
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use iris_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RendererConfig::default();
//!     let mut window = Window::new("Iris", 1600, 900)?;
//!     let mut renderer = VulkanRenderer::new(&window, &config)?;
//!
//!     let mut scene = Scene::new();
//!     scene.subscribe(renderer.entity_queue());
//!     scene.spawn(EntityDesc::new().with_mesh(MeshData::cube()));
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         renderer.draw_frame(&scene)?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::cast_possible_truncation)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod input;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::Config,
        core::config::{ApplicationConfig, EngineConfig, RendererConfig, ShaderConfig},
        foundation::math::{Mat4, Quat, Transform, Vec3},
        input::{cursor_to_pixel, MouseState},
        render::backends::vulkan::PickResult,
        render::{VulkanError, VulkanRenderer, VulkanResult, Window},
        scene::{Camera, EntityDesc, EntityId, Light, Material, MeshData, Scene, SceneQuery},
    };
}
