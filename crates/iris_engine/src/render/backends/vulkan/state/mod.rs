// Vulkan state management

pub mod frame_targets;
pub mod swapchain;
pub mod sync;

pub use frame_targets::*;
pub use swapchain::*;
pub use sync::*;
