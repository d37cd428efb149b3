//! One-shot transfer submissions
//!
//! Every upload records into a single command buffer on the transfer queue,
//! submits it, and blocks on a dedicated fence. Uploads are serialized and only
//! happen when new entities are drained, never in the middle of recording a frame.
//!
//! A missed bound is not retryable. The command buffer is still pending and the
//! fence unreset, so the context refuses further work and reports
//! [`VulkanError::UploadStalled`].

use super::rendering::commands::CommandPool;
use super::state::sync::Fence;
use super::{VulkanContext, VulkanError, VulkanResult};
use ash::{vk, Device};
use std::cell::Cell;

/// Transfer-queue command buffer with its fence
pub struct UploadContext {
    device: Device,
    queue: vk::Queue,
    command_buffer: vk::CommandBuffer,
    fence: Fence,
    timeout_ns: u64,
    stalled: Cell<bool>,
    // Declared last so the fence and buffer go first.
    _pool: CommandPool,
}

impl UploadContext {
    /// Create the upload context on the transfer queue family
    pub fn new(context: &VulkanContext, timeout_ns: u64) -> VulkanResult<Self> {
        let device = context.raw_device();
        let pool = CommandPool::new(device.clone(), context.queue_families().transfer)?;
        let command_buffer = pool.allocate_command_buffer()?;
        let fence = Fence::new(device.clone(), false)?;

        Ok(Self {
            device,
            queue: context.transfer_queue(),
            command_buffer,
            fence,
            timeout_ns,
            stalled: Cell::new(false),
            _pool: pool,
        })
    }

    /// Record with `record`, submit, and block until the transfer queue is done
    ///
    /// On [`VulkanError::UploadStalled`] the queue has been drained before
    /// returning, so callers may free their staging resources.
    pub fn submit_command<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer),
    {
        if self.stalled.get() {
            return Err(stalled_error(self.timeout_ns));
        }

        let cmd = self.command_buffer;
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device.begin_command_buffer(cmd, &begin_info)?;
        }
        record(&self.device, cmd);

        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::builder().command_buffers(&command_buffers).build();

        unsafe {
            self.device.end_command_buffer(cmd)?;
            self.device.queue_submit(self.queue, &[submit_info], self.fence.handle())?;
        }

        let waited = upload_wait_outcome(self.fence.wait_bounded(self.timeout_ns, "transfer submission"));

        match waited {
            Ok(()) => {
                self.fence.reset()?;
                unsafe {
                    self.device
                        .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
                }
                Ok(())
            }
            Err(e) => {
                self.stalled.set(true);
                log::error!("{e}; draining the transfer queue before releasing staging memory");
                if let Err(drain) = unsafe { self.device.queue_wait_idle(self.queue) } {
                    log::error!("Transfer queue drain failed: {drain:?}");
                }
                Err(e)
            }
        }
    }
}

fn stalled_error(timeout_ns: u64) -> VulkanError {
    VulkanError::UploadStalled {
        waited_ms: timeout_ns / 1_000_000,
    }
}

/// Turn a missed transfer bound into the fatal upload error
fn upload_wait_outcome(waited: VulkanResult<()>) -> VulkanResult<()> {
    match waited {
        Err(VulkanError::Timeout { waited_ms, .. }) => Err(VulkanError::UploadStalled { waited_ms }),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::state::sync::bounded_wait_result;

    #[test]
    fn test_transfer_timeout_is_not_retryable() {
        let waited = bounded_wait_result(Err(vk::Result::TIMEOUT), "transfer submission", 2_000_000_000);
        let err = upload_wait_outcome(waited).unwrap_err();

        assert!(matches!(err, VulkanError::UploadStalled { waited_ms: 2000 }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_frame_timeout_stays_retryable() {
        let err = bounded_wait_result(Err(vk::Result::TIMEOUT), "frame fence", 100_000_000).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_other_wait_results_pass_through() {
        assert!(upload_wait_outcome(Ok(())).is_ok());
        assert!(matches!(
            upload_wait_outcome(Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))),
            Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST))
        ));
        assert_eq!(stalled_error(5_000_000).to_string(), "Transfer queue stalled for more than 5 ms");
    }
}
