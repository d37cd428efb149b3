//! Vulkan backend implementation
//!
//! Organized into initialization, resources, rendering and state modules, plus
//! the transfer-queue upload path, object picking and the frame loop.

/// Vulkan initialization types (context, window)
pub mod initialization;

/// GPU resources (buffers, textures, meshes, descriptors)
pub mod resources;

/// Vulkan rendering operations (shaders, pipelines, render passes, commands)
pub mod rendering;

/// Swapchain, frame targets and synchronization
pub mod state;

/// One-shot command submission on the transfer queue
pub mod upload;

/// Object-id read-back
pub mod picking;

/// Main Vulkan renderer implementation
pub mod renderer;

pub use renderer::VulkanRenderer;

pub use initialization::context::{PhysicalDeviceInfo, QueueFamilyIndices, VulkanContext, VulkanError, VulkanResult};
pub use initialization::window::{Window, WindowError, WindowResult};

pub use picking::PickResult;
pub use resources::buffer::{Buffer, MemoryAccess};
pub use resources::texture::Texture;
