//! Vulkan context management
//!
//! Instance, debug messenger, surface, physical device selection and the
//! logical device with its four queues. Everything else in the backend
//! borrows from the [`VulkanContext`] and is destroyed before it.

use super::window::Window;
use crate::core::config::RendererConfig;
use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::vk;
use ash::{Device, Entry, Instance};
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};
use thiserror::Error;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// A bounded wait expired before the GPU signaled
    #[error("{operation} timed out after {waited_ms} ms")]
    Timeout {
        /// What was being waited on
        operation: &'static str,
        /// Bound that expired
        waited_ms: u64,
    },

    /// The transfer queue missed its bound; the upload context is unusable
    #[error("Transfer queue stalled for more than {waited_ms} ms")]
    UploadStalled {
        /// Bound that expired
        waited_ms: u64,
    },

    /// A SPIR-V file could not be read
    #[error("Shader not found: {path}")]
    ShaderNotFound {
        /// Path that was tried
        path: String,
    },

    /// A texture file could not be opened or decoded
    #[error("Failed to load texture {path}: {reason}")]
    TextureLoad {
        /// Texture file
        path: String,
        /// Decoder message
        reason: String,
    },

    /// A descriptor update targeted a binding the pipeline never declared
    #[error("Descriptor set {set} binding {binding} was not declared")]
    DescriptorNotDeclared {
        /// Descriptor set index
        set: u32,
        /// Binding within the set
        binding: u32,
    },

    /// Vertex attribute size has no matching format
    #[error("Unsupported vertex attribute of {size} bytes at offset {offset}")]
    UnsupportedVertexAttribute {
        /// Attribute size in bytes
        size: u32,
        /// Attribute offset in bytes
        offset: u32,
    },

    /// Acquire or present returned something other than success
    #[error("Presentation failed: {0:?}")]
    PresentFailed(vk::Result),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

impl VulkanError {
    /// Whether the frame that failed can simply be attempted again
    ///
    /// Only a missed frame-loop bound qualifies. The frame fence stays
    /// signaled until a later acquire succeeds, so the next attempt starts clean.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<vk::Result> for VulkanError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}

const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

fn to_cstring(value: &str) -> VulkanResult<CString> {
    CString::new(value).map_err(|_| VulkanError::InitializationFailed(format!("interior NUL in {value:?}")))
}

/// Vulkan instance with its optional debug messenger
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a Vulkan 1.2 instance with the extensions the window needs
    pub fn new(window: &Window, config: &RendererConfig) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {e}")))?;

        let app_name = to_cstring(&config.application_name)?;
        let engine_name = to_cstring("Iris")?;
        let (major, minor, patch) = config.application_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_2);

        let required_extensions = window
            .required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {e}")))?;
        let extension_names = required_extensions
            .iter()
            .map(|ext| to_cstring(ext))
            .collect::<VulkanResult<Vec<_>>>()?;
        let mut extensions: Vec<*const i8> = extension_names.iter().map(|ext| ext.as_ptr()).collect();

        let enable_validation = config.validation_enabled() && Self::validation_layer_available(&entry);
        if config.validation_enabled() && !enable_validation {
            log::warn!("{VALIDATION_LAYER} requested but not installed; continuing without validation");
        }

        let layer_names = if enable_validation {
            vec![to_cstring(VALIDATION_LAYER)?]
        } else {
            Vec::new()
        };
        let layer_ptrs: Vec<*const i8> = layer_names.iter().map(|name| name.as_ptr()).collect();

        if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let debug = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            let messenger = Self::setup_debug_messenger(&debug_utils)?;
            log::info!("Vulkan validation enabled");
            Some((debug_utils, messenger))
        } else {
            None
        };

        Ok(Self { entry, instance, debug })
    }

    fn validation_layer_available(entry: &Entry) -> bool {
        entry
            .enumerate_instance_layer_properties()
            .map(|layers| {
                layers.iter().any(|layer| {
                    let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
                    name.to_str() == Ok(VALIDATION_LAYER)
                })
            })
            .unwrap_or(false)
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        Ok(unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? })
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Routes driver and validation messages to the logger at matching severity
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => log::error!("[Vulkan] {message_type:?}: {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => log::warn!("[Vulkan] {message_type:?}: {message}"),
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => log::info!("[Vulkan] {message_type:?}: {message}"),
        _ => log::trace!("[Vulkan] {message_type:?}: {message}"),
    }

    vk::FALSE
}

/// Queue family chosen for each kind of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Graphics commands
    pub graphics: u32,
    /// Presentation to the window surface
    pub present: u32,
    /// Compute dispatches
    pub compute: u32,
    /// Staging uploads; never a graphics-capable family
    pub transfer: u32,
}

impl QueueFamilyIndices {
    /// Pick queue families from a device's family list
    ///
    /// `present_support[i]` says whether family `i` can present to the surface.
    /// Compute prefers the graphics family. Transfer must come from a family
    /// without GRAPHICS and prefers one without COMPUTE as well.
    pub fn select(families: &[vk::QueueFamilyProperties], present_support: &[bool]) -> Result<Self, String> {
        let has = |index: usize, flags: vk::QueueFlags| {
            families[index].queue_count > 0 && families[index].queue_flags.contains(flags)
        };
        let indices = 0..families.len();

        let graphics = indices
            .clone()
            .find(|&i| has(i, vk::QueueFlags::GRAPHICS))
            .ok_or("no graphics queue family")?;

        let can_present = |i: usize| present_support.get(i).copied().unwrap_or(false);
        let present = if can_present(graphics) {
            graphics
        } else {
            indices.clone().find(|&i| can_present(i)).ok_or("no queue family can present to the surface")?
        };

        let compute = if has(graphics, vk::QueueFlags::COMPUTE) {
            graphics
        } else {
            indices
                .clone()
                .find(|&i| has(i, vk::QueueFlags::COMPUTE))
                .ok_or("no compute queue family")?
        };

        let separate_transfer = |i: &usize| has(*i, vk::QueueFlags::TRANSFER) && !has(*i, vk::QueueFlags::GRAPHICS);
        let transfer = indices
            .clone()
            .filter(separate_transfer)
            .find(|&i| !has(i, vk::QueueFlags::COMPUTE))
            .or_else(|| indices.clone().find(separate_transfer))
            .ok_or("no dedicated transfer queue family")?;

        Ok(Self {
            graphics: graphics as u32,
            present: present as u32,
            compute: compute as u32,
            transfer: transfer as u32,
        })
    }

    /// Distinct families, each needing one queue
    pub fn unique(&self) -> BTreeSet<u32> {
        [self.graphics, self.present, self.compute, self.transfer].into_iter().collect()
    }
}

/// Vulkan 1.2 features the bindless material arrays depend on
pub fn required_features12() -> vk::PhysicalDeviceVulkan12Features {
    vk::PhysicalDeviceVulkan12Features::builder()
        .runtime_descriptor_array(true)
        .descriptor_binding_partially_bound(true)
        .shader_uniform_buffer_array_non_uniform_indexing(true)
        .shader_storage_buffer_array_non_uniform_indexing(true)
        .shader_sampled_image_array_non_uniform_indexing(true)
        .shader_storage_image_array_non_uniform_indexing(true)
        .descriptor_binding_storage_buffer_update_after_bind(true)
        .descriptor_binding_sampled_image_update_after_bind(true)
        .descriptor_binding_storage_image_update_after_bind(true)
        .build()
}

/// Names of required descriptor-indexing features a device lacks
pub fn missing_features12(supported: &vk::PhysicalDeviceVulkan12Features) -> Vec<&'static str> {
    [
        ("runtimeDescriptorArray", supported.runtime_descriptor_array),
        ("descriptorBindingPartiallyBound", supported.descriptor_binding_partially_bound),
        (
            "shaderUniformBufferArrayNonUniformIndexing",
            supported.shader_uniform_buffer_array_non_uniform_indexing,
        ),
        (
            "shaderStorageBufferArrayNonUniformIndexing",
            supported.shader_storage_buffer_array_non_uniform_indexing,
        ),
        (
            "shaderSampledImageArrayNonUniformIndexing",
            supported.shader_sampled_image_array_non_uniform_indexing,
        ),
        (
            "shaderStorageImageArrayNonUniformIndexing",
            supported.shader_storage_image_array_non_uniform_indexing,
        ),
        (
            "descriptorBindingStorageBufferUpdateAfterBind",
            supported.descriptor_binding_storage_buffer_update_after_bind,
        ),
        (
            "descriptorBindingSampledImageUpdateAfterBind",
            supported.descriptor_binding_sampled_image_update_after_bind,
        ),
        (
            "descriptorBindingStorageImageUpdateAfterBind",
            supported.descriptor_binding_storage_image_update_after_bind,
        ),
    ]
    .into_iter()
    .filter(|(_, enabled)| *enabled == vk::FALSE)
    .map(|(name, _)| name)
    .collect()
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types, used for every allocation
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Selected queue families
    pub queue_families: QueueFamilyIndices,
    /// Whether anisotropic filtering can be enabled
    pub sampler_anisotropy: bool,
}

impl PhysicalDeviceInfo {
    /// Select the first device that satisfies every requirement
    pub fn select_suitable_device(
        instance: &Instance,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices()? };

        for device in devices {
            let properties = unsafe { instance.get_physical_device_properties(device) };
            let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();

            match Self::evaluate_device(instance, device, properties, surface, surface_loader) {
                Ok(info) => {
                    log::info!(
                        "Selected GPU: {name} (queues: graphics {}, present {}, compute {}, transfer {})",
                        info.queue_families.graphics,
                        info.queue_families.present,
                        info.queue_families.compute,
                        info.queue_families.transfer
                    );
                    return Ok(info);
                }
                Err(reason) => log::warn!("Rejected GPU {name}: {reason}"),
            }
        }

        Err(VulkanError::InitializationFailed("No suitable GPU found".to_string()))
    }

    fn evaluate_device(
        instance: &Instance,
        device: vk::PhysicalDevice,
        properties: vk::PhysicalDeviceProperties,
        surface: vk::SurfaceKHR,
        surface_loader: &Surface,
    ) -> Result<Self, String> {
        if properties.api_version < vk::API_VERSION_1_2 {
            return Err("Vulkan 1.2 not supported".to_string());
        }

        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let present_support = (0..families.len() as u32)
            .map(|index| unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .unwrap_or(false)
            })
            .collect::<Vec<_>>();
        let queue_families = QueueFamilyIndices::select(&families, &present_support)?;

        let extensions = unsafe { instance.enumerate_device_extension_properties(device) }
            .map_err(|e| format!("cannot enumerate extensions: {e:?}"))?;
        let has_swapchain = extensions.iter().any(|available| {
            let extension_name = unsafe { CStr::from_ptr(available.extension_name.as_ptr()) };
            extension_name == SwapchainLoader::name()
        });
        if !has_swapchain {
            return Err("VK_KHR_swapchain not supported".to_string());
        }

        let mut features12 = vk::PhysicalDeviceVulkan12Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::builder().push_next(&mut features12).build();
        unsafe { instance.get_physical_device_features2(device, &mut features2) };
        let sampler_anisotropy = features2.features.sampler_anisotropy == vk::TRUE;

        let missing = missing_features12(&features12);
        if !missing.is_empty() {
            return Err(format!("missing descriptor indexing features: {}", missing.join(", ")));
        }

        let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

        Ok(Self {
            device,
            properties,
            memory_properties,
            queue_families,
            sampler_anisotropy,
        })
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Transfer queue used by uploads
    pub transfer_queue: vk::Queue,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
}

impl LogicalDevice {
    /// Create the logical device with one queue per distinct family
    pub fn new(instance: &Instance, physical_device: &PhysicalDeviceInfo) -> VulkanResult<Self> {
        let families = physical_device.queue_families;
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let required_extensions = [SwapchainLoader::name().as_ptr()];
        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(physical_device.sampler_anisotropy)
            .build();
        let mut features12 = required_features12();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&required_extensions)
            .enabled_features(&device_features)
            .push_next(&mut features12);

        let device = unsafe { instance.create_device(physical_device.device, &create_info, None)? };

        let (graphics_queue, present_queue, transfer_queue) = unsafe {
            (
                device.get_device_queue(families.graphics, 0),
                device.get_device_queue(families.present, 0),
                device.get_device_queue(families.transfer, 0),
            )
        };

        let swapchain_loader = SwapchainLoader::new(instance, &device);
        log::debug!("Logical device created with {} queue families", queue_infos.len());

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            transfer_queue,
            swapchain_loader,
        })
    }
}

/// Log a failed idle wait during teardown; `true` when the device went idle
fn idle_before_teardown(result: Result<(), vk::Result>, owner: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::error!("Device did not go idle before destroying {owner}: {e:?}");
            false
        }
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            idle_before_teardown(self.device.device_wait_idle(), "the logical device");
            self.device.destroy_device(None);
        }
    }
}

/// Owns the instance, surface and device
///
/// Fields drop in declaration order: device, then surface (in `Drop`), then instance.
pub struct VulkanContext {
    device: LogicalDevice,
    physical_device: PhysicalDeviceInfo,
    surface_loader: Surface,
    surface: vk::SurfaceKHR,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create the context for a window
    pub fn new(window: &Window, config: &RendererConfig) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(window, config)?;

        let surface_loader = Surface::new(&instance.entry, &instance.instance);
        let surface = window
            .create_vulkan_surface(instance.instance.handle())
            .map_err(|e| VulkanError::InitializationFailed(format!("Surface creation: {e}")))?;

        let physical_device =
            match PhysicalDeviceInfo::select_suitable_device(&instance.instance, surface, &surface_loader) {
                Ok(info) => info,
                Err(e) => {
                    unsafe { surface_loader.destroy_surface(surface, None) };
                    return Err(e);
                }
            };

        let device = match LogicalDevice::new(&instance.instance, &physical_device) {
            Ok(device) => device,
            Err(e) => {
                unsafe { surface_loader.destroy_surface(surface, None) };
                return Err(e);
            }
        };

        Ok(Self {
            device,
            physical_device,
            surface_loader,
            surface,
            instance,
        })
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Window surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Surface extension loader
    pub fn surface_loader(&self) -> &Surface {
        &self.surface_loader
    }

    /// Selected physical device
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Logical device and queues
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// Cloned device handle for RAII wrappers
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// Swapchain extension loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Selected queue families
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.physical_device.queue_families
    }

    /// Memory types and heaps
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.physical_device.memory_properties
    }

    /// Graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Transfer queue
    pub fn transfer_queue(&self) -> vk::Queue {
        self.device.transfer_queue
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        log::debug!("Destroying Vulkan context");
        unsafe {
            idle_before_teardown(self.device.device.device_wait_idle(), "the surface");
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_prefers_pure_transfer_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::select(&families, &[true, false, false]).unwrap();

        assert_eq!(indices.graphics, 0);
        assert_eq!(indices.present, 0);
        assert_eq!(indices.compute, 0);
        assert_eq!(indices.transfer, 2);
        assert_eq!(indices.unique().len(), 2);
    }

    #[test]
    fn test_falls_back_to_async_compute_family_for_transfer() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::select(&families, &[true, true]).unwrap();
        assert_eq!(indices.transfer, 1);
    }

    #[test]
    fn test_present_on_separate_family() {
        let families = [
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::COMPUTE),
        ];
        let indices = QueueFamilyIndices::select(&families, &[false, false, true]).unwrap();
        assert_eq!(indices.present, 2);
        assert_eq!(indices.graphics, 0);
    }

    #[test]
    fn test_rejects_missing_families() {
        let graphics_only = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER)];
        assert!(QueueFamilyIndices::select(&graphics_only, &[true]).is_err());

        let no_present = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE), family(vk::QueueFlags::TRANSFER)];
        assert!(QueueFamilyIndices::select(&no_present, &[false, false]).is_err());

        let mut empty = family(vk::QueueFlags::TRANSFER);
        empty.queue_count = 0;
        let zero_queues = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE), empty];
        assert!(QueueFamilyIndices::select(&zero_queues, &[true, false]).is_err());
    }

    #[test]
    fn test_teardown_idle_failure_is_reported() {
        assert!(idle_before_teardown(Ok(()), "the surface"));
        assert!(!idle_before_teardown(Err(vk::Result::ERROR_DEVICE_LOST), "the logical device"));
    }

    #[test]
    fn test_required_features_are_complete() {
        assert!(missing_features12(&required_features12()).is_empty());
    }

    #[test]
    fn test_missing_features_are_named() {
        let mut supported = required_features12();
        supported.runtime_descriptor_array = vk::FALSE;
        supported.descriptor_binding_sampled_image_update_after_bind = vk::FALSE;

        assert_eq!(
            missing_features12(&supported),
            vec!["runtimeDescriptorArray", "descriptorBindingSampledImageUpdateAfterBind"]
        );
        assert_eq!(missing_features12(&vk::PhysicalDeviceVulkan12Features::default()).len(), 9);
    }
}
