//! Buffer management for vertex data, uniforms and staging
//!
//! One generic [`Buffer<T>`] covers every usage. Where its memory lives is a
//! pure decision of [`MemoryAccess::for_usage`]; device-local buffers are filled
//! through a staging buffer and the transfer queue.

use crate::render::backends::vulkan::upload::UploadContext;
use crate::render::backends::vulkan::{VulkanContext, VulkanError, VulkanResult};
use ash::{vk, Device};
use bytemuck::Pod;
use std::marker::PhantomData;
use std::mem;
use std::ops::{Deref, DerefMut};

/// Where a buffer's memory lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccess {
    /// Host-visible and coherent; written through a mapping
    HostVisible,
    /// Device-local; written through a staged transfer
    DeviceLocal,
}

impl MemoryAccess {
    /// Vertex/index data above this size is staged into device-local memory
    pub const STAGING_THRESHOLD: vk::DeviceSize = 64 * 1024;

    /// Pick the memory access pattern for a buffer
    ///
    /// Uniform, storage and staging buffers are rewritten from the host, so they
    /// stay host-visible. Large static geometry goes to device-local memory.
    pub fn for_usage(usage: vk::BufferUsageFlags, bytes: vk::DeviceSize) -> Self {
        let host_written =
            vk::BufferUsageFlags::UNIFORM_BUFFER | vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC;
        let geometry = vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::INDEX_BUFFER;

        if usage.intersects(host_written) {
            Self::HostVisible
        } else if usage.intersects(geometry) && bytes > Self::STAGING_THRESHOLD {
            Self::DeviceLocal
        } else {
            Self::HostVisible
        }
    }

    /// Memory property flags this access pattern requires
    pub fn property_flags(self) -> vk::MemoryPropertyFlags {
        match self {
            Self::HostVisible => vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            Self::DeviceLocal => vk::MemoryPropertyFlags::DEVICE_LOCAL,
        }
    }
}

/// Find the first memory type allowed by `type_filter` that has all `required` flags
pub fn select_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..memory_properties.memory_type_count).find(|&i| {
        type_filter & (1 << i) != 0 && memory_properties.memory_types[i as usize].property_flags.contains(required)
    })
}

/// Allocate and bind device memory for a buffer or image's requirements
pub(crate) fn allocate_memory(
    device: &Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    properties: vk::MemoryPropertyFlags,
) -> VulkanResult<vk::DeviceMemory> {
    let memory_type_index = select_memory_type(memory_properties, requirements.memory_type_bits, properties)
        .ok_or(VulkanError::NoSuitableMemoryType)?;

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    Ok(unsafe { device.allocate_memory(&alloc_info, None)? })
}

/// Copy elements into a mapped byte range
///
/// Fails instead of writing past the end of the mapping.
pub fn copy_into_mapped<T: Pod>(dst: &mut [u8], src: &[T]) -> VulkanResult<()> {
    let bytes: &[u8] = bytemuck::cast_slice(src);
    let dst_len = dst.len();
    let target = dst.get_mut(..bytes.len()).ok_or_else(|| VulkanError::InvalidOperation {
        reason: format!("write of {} bytes into a {}-byte mapping", bytes.len(), dst_len),
    })?;
    target.copy_from_slice(bytes);
    Ok(())
}

/// Typed buffer wrapper with memory management
pub struct Buffer<T: Pod> {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    len: usize,
    access: MemoryAccess,
    _marker: PhantomData<T>,
}

impl<T: Pod> Buffer<T> {
    /// Allocate room for `len` elements without initializing them
    pub fn new(
        context: &VulkanContext,
        usage: vk::BufferUsageFlags,
        len: usize,
        access: MemoryAccess,
    ) -> VulkanResult<Self> {
        if len == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "cannot create an empty buffer".to_string(),
            });
        }

        let device = context.raw_device();
        let size = (len * mem::size_of::<T>()) as vk::DeviceSize;

        // Device-local buffers are written on the transfer queue and read on the graphics queue.
        let families = context.queue_families();
        let shared = [families.graphics, families.transfer];
        let concurrent = access == MemoryAccess::DeviceLocal && families.graphics != families.transfer;

        let mut buffer_info = vk::BufferCreateInfo::builder().size(size).usage(usage);
        buffer_info = if concurrent {
            buffer_info.sharing_mode(vk::SharingMode::CONCURRENT).queue_family_indices(&shared)
        } else {
            buffer_info.sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let buffer = unsafe { device.create_buffer(&buffer_info, None)? };
        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };

        let memory = match allocate_memory(&device, context.memory_properties(), requirements, access.property_flags()) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(e.into());
        }

        Ok(Self {
            device,
            buffer,
            memory,
            len,
            access,
            _marker: PhantomData,
        })
    }

    /// Create a buffer holding `data`, staging it when it belongs in device-local memory
    pub fn with_data(
        context: &VulkanContext,
        upload: &UploadContext,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> VulkanResult<Self> {
        let bytes = mem::size_of_val(data) as vk::DeviceSize;

        match MemoryAccess::for_usage(usage, bytes) {
            MemoryAccess::HostVisible => {
                let mut buffer = Self::new(context, usage, data.len(), MemoryAccess::HostVisible)?;
                buffer.write(data)?;
                Ok(buffer)
            }
            MemoryAccess::DeviceLocal => {
                let staging = Buffer::staging(context, data)?;
                let buffer = Self::new(
                    context,
                    usage | vk::BufferUsageFlags::TRANSFER_DST,
                    data.len(),
                    MemoryAccess::DeviceLocal,
                )?;

                upload.submit_command(|device, cmd| unsafe {
                    let region = vk::BufferCopy::builder().size(bytes).build();
                    device.cmd_copy_buffer(cmd, staging.handle(), buffer.handle(), &[region]);
                })?;

                log::debug!("Staged {bytes} bytes into device-local buffer");
                Ok(buffer)
            }
        }
    }

    /// Host-visible transfer source filled with `data`
    pub fn staging(context: &VulkanContext, data: &[T]) -> VulkanResult<Self> {
        let mut buffer = Self::new(context, vk::BufferUsageFlags::TRANSFER_SRC, data.len(), MemoryAccess::HostVisible)?;
        buffer.write(data)?;
        Ok(buffer)
    }

    /// Map the whole buffer for host access; unmapped when the guard drops
    pub fn map(&mut self) -> VulkanResult<MappedBuffer<'_, T>> {
        if self.access != MemoryAccess::HostVisible {
            return Err(VulkanError::InvalidOperation {
                reason: "device-local buffers cannot be mapped".to_string(),
            });
        }

        let ptr = unsafe {
            self.device
                .map_memory(self.memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())?
        };
        let bytes = unsafe { std::slice::from_raw_parts_mut(ptr.cast::<u8>(), self.len * mem::size_of::<T>()) };

        Ok(MappedBuffer {
            device: &self.device,
            memory: self.memory,
            bytes,
            _marker: PhantomData,
        })
    }

    /// Overwrite the start of the buffer with `data`
    pub fn write(&mut self, data: &[T]) -> VulkanResult<()> {
        let mut mapped = self.map()?;
        copy_into_mapped(mapped.bytes_mut(), data)
    }

    /// Copy the buffer's contents back to the host
    pub fn read(&mut self) -> VulkanResult<Vec<T>> {
        let mapped = self.map()?;
        Ok(mapped.to_vec())
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Element count
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements (never true; creation rejects it)
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Size in bytes
    pub fn size_bytes(&self) -> vk::DeviceSize {
        (self.len * mem::size_of::<T>()) as vk::DeviceSize
    }

    /// Memory access pattern
    pub fn access(&self) -> MemoryAccess {
        self.access
    }

    /// Descriptor info covering the whole buffer
    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset: 0,
            range: self.size_bytes(),
        }
    }
}

impl<T: Pod> Drop for Buffer<T> {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Scoped host mapping of a [`Buffer`]
///
/// Derefs to the typed element slice. The memory is unmapped on drop, so host
/// access cannot outlive the bracket.
pub struct MappedBuffer<'a, T: Pod> {
    device: &'a Device,
    memory: vk::DeviceMemory,
    bytes: &'a mut [u8],
    _marker: PhantomData<T>,
}

impl<T: Pod> MappedBuffer<'_, T> {
    /// Raw bytes of the mapping
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.bytes
    }
}

impl<T: Pod> Deref for MappedBuffer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        bytemuck::cast_slice(&*self.bytes)
    }
}

impl<T: Pod> DerefMut for MappedBuffer<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        bytemuck::cast_slice_mut(&mut *self.bytes)
    }
}

impl<T: Pod> Drop for MappedBuffer<'_, T> {
    fn drop(&mut self) {
        unsafe { self.device.unmap_memory(self.memory) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::lighting::GpuLight;

    fn memory_properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        properties.memory_type_count = types.len() as u32;
        for (i, flags) in types.iter().enumerate() {
            properties.memory_types[i].property_flags = *flags;
        }
        properties
    }

    #[test]
    fn test_access_policy() {
        let small = 1024;
        let large = MemoryAccess::STAGING_THRESHOLD + 1;

        assert_eq!(MemoryAccess::for_usage(vk::BufferUsageFlags::UNIFORM_BUFFER, large), MemoryAccess::HostVisible);
        assert_eq!(MemoryAccess::for_usage(vk::BufferUsageFlags::STORAGE_BUFFER, small), MemoryAccess::HostVisible);
        assert_eq!(MemoryAccess::for_usage(vk::BufferUsageFlags::TRANSFER_SRC, large), MemoryAccess::HostVisible);
        assert_eq!(MemoryAccess::for_usage(vk::BufferUsageFlags::VERTEX_BUFFER, small), MemoryAccess::HostVisible);
        assert_eq!(MemoryAccess::for_usage(vk::BufferUsageFlags::VERTEX_BUFFER, large), MemoryAccess::DeviceLocal);
        assert_eq!(MemoryAccess::for_usage(vk::BufferUsageFlags::INDEX_BUFFER, large), MemoryAccess::DeviceLocal);
        assert_eq!(
            MemoryAccess::for_usage(vk::BufferUsageFlags::INDEX_BUFFER, MemoryAccess::STAGING_THRESHOLD),
            MemoryAccess::HostVisible
        );
    }

    #[test]
    fn test_select_memory_type_respects_filter_and_flags() {
        let properties = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);
        let host = MemoryAccess::HostVisible.property_flags();
        let device = MemoryAccess::DeviceLocal.property_flags();

        assert_eq!(select_memory_type(&properties, 0b1111, host), Some(2));
        assert_eq!(select_memory_type(&properties, 0b1011, host), Some(3));
        assert_eq!(select_memory_type(&properties, 0b1111, device), Some(0));
        assert_eq!(select_memory_type(&properties, 0b0010, host), None);
        assert_eq!(select_memory_type(&properties, 0, device), None);
    }

    fn round_trip<T: Pod + PartialEq + std::fmt::Debug>(data: &[T]) {
        let mut mapping = vec![0u8; mem::size_of_val(data)];
        copy_into_mapped(&mut mapping, data).unwrap();
        assert_eq!(mapping.as_slice(), bytemuck::cast_slice::<T, u8>(data));

        let back: Vec<T> = mapping
            .chunks_exact(mem::size_of::<T>())
            .map(bytemuck::pod_read_unaligned)
            .collect();
        assert_eq!(back, data);
    }

    #[test]
    fn test_mapped_copy_round_trip() {
        round_trip(&[0xDEAD_BEEF_u32]);

        let lights: Vec<GpuLight> = (0..50)
            .map(|i| GpuLight {
                position: [i as f32, 1.0, 2.0, 3.0],
                flags: [1, 1, i, 0],
                ..Default::default()
            })
            .collect();
        round_trip(&lights);

        let indices: Vec<u32> = (0..1024).map(|i| i * 7 + 3).collect();
        round_trip(&indices);
    }

    #[test]
    fn test_copy_into_mapped_rejects_overflow() {
        let mut mapping = vec![0u8; 8];
        assert!(copy_into_mapped(&mut mapping, &[1u32, 2, 3]).is_err());
        assert!(copy_into_mapped(&mut mapping, &[1u32]).is_ok());
        assert_eq!(&mapping[..4], &1u32.to_ne_bytes());
    }
}
