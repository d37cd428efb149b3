//! SPIR-V shader module loading

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use ash::{vk, Device};
use std::ffi::CStr;
use std::fs::File;
use std::path::Path;

/// Entry point every shader stage uses
pub(crate) const ENTRY_POINT: &CStr = c"main";

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V words
    pub fn from_words(device: Device, words: &[u32]) -> VulkanResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);
        let module = unsafe { device.create_shader_module(&create_info, None)? };
        Ok(Self { device, module })
    }

    /// Load a shader from a SPIR-V file
    ///
    /// A missing file is [`VulkanError::ShaderNotFound`]; malformed SPIR-V is an
    /// initialization failure.
    pub fn from_file<P: AsRef<Path>>(device: Device, path: P) -> VulkanResult<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|_| VulkanError::ShaderNotFound {
            path: path.display().to_string(),
        })?;

        // read_spv handles alignment and endianness of the byte stream.
        let words = ash::util::read_spv(&mut file).map_err(|e| {
            VulkanError::InitializationFailed(format!("invalid SPIR-V in {}: {e}", path.display()))
        })?;

        log::debug!("Loaded shader {} ({} words)", path.display(), words.len());
        Self::from_words(device, &words)
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Stage create info for this module
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.module, None) };
    }
}
