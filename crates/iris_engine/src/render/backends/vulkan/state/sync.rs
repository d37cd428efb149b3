//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for semaphores and fences, and the single [`FrameSync`] set the
//! renderer uses. There is exactly one frame in flight: the CPU waits on the
//! frame fence before touching anything the previous frame's commands read.
//!
//! Every CPU-side wait is bounded. An expired wait surfaces as
//! [`VulkanError::Timeout`] and the caller decides whether to retry.

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use ash::{vk, Device};

/// Map the outcome of a bounded Vulkan wait to a result
pub fn bounded_wait_result(
    result: Result<(), vk::Result>,
    operation: &'static str,
    timeout_ns: u64,
) -> VulkanResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(vk::Result::TIMEOUT) | Err(vk::Result::NOT_READY) => Err(VulkanError::Timeout {
            operation,
            waited_ms: timeout_ns / 1_000_000,
        }),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// GPU-GPU synchronization primitive
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a binary semaphore
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        let semaphore = unsafe { device.create_semaphore(&create_info, None)? };
        Ok(Self { device, semaphore })
    }

    /// Semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.destroy_semaphore(self.semaphore, None) };
    }
}

/// CPU-GPU synchronization primitive
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        let fence = unsafe { device.create_fence(&create_info, None)? };

        Ok(Self { device, fence })
    }

    /// Wait at most `timeout_ns` for the fence to signal
    pub fn wait_bounded(&self, timeout_ns: u64, operation: &'static str) -> VulkanResult<()> {
        let result = unsafe { self.device.wait_for_fences(&[self.fence], true, timeout_ns) };
        bounded_wait_result(result, operation, timeout_ns)
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe { self.device.reset_fences(&[self.fence])? };
        Ok(())
    }

    /// Fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.destroy_fence(self.fence, None) };
    }
}

/// Synchronization set of the single in-flight frame
pub struct FrameSync {
    /// Signaled by the presentation engine when the acquired image is ready
    pub image_available: Semaphore,
    /// Signaled by the graphics queue when rendering is done
    pub render_finished: Semaphore,
    /// Signaled when the frame's command buffer has finished executing
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create the set; the fence starts signaled so the first frame does not block
    pub fn new(device: Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            in_flight: Fence::new(device, true)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_reported_not_retried() {
        let result = bounded_wait_result(Err(vk::Result::TIMEOUT), "frame fence", 100_000_000);
        match result {
            Err(VulkanError::Timeout { operation, waited_ms }) => {
                assert_eq!(operation, "frame fence");
                assert_eq!(waited_ms, 100);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_other_results_pass_through() {
        assert!(bounded_wait_result(Ok(()), "upload", 1).is_ok());
        assert!(matches!(
            bounded_wait_result(Err(vk::Result::ERROR_DEVICE_LOST), "upload", 1),
            Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
        ));
    }
}
