//! Frame synchronization primitives and the acquire/submit/present calls.
//!
//! One [`FrameSyncPair`] orders each frame entirely on the GPU:
//! - `image_available` is signaled by acquisition and waited on by the submit
//!   at the color-attachment-output stage
//! - `render_finished` is signaled by the submit and waited on by present
//!
//! No fence is used, so at most one frame is in flight and the CPU is paced
//! by acquisition alone.

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::driver::{AcquiredImage, Presentation, Submission};
use crate::error::{RhiError, RhiResult};

/// Frames the CPU may record ahead of the GPU.
///
/// Raising this needs one [`FrameSyncPair`] per frame slot, indexed by a
/// frame counter, plus a fence per slot so a pair is not reused while its
/// frame is still executing.
pub const MAX_FRAMES_IN_FLIGHT: usize = 1;

/// The two binary semaphores that order one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSyncPair {
    /// Signaled when the acquired image may be rendered to
    pub image_available: vk::Semaphore,
    /// Signaled when rendering finished, gating presentation
    pub render_finished: vk::Semaphore,
}

impl FrameSyncPair {
    /// Builds the submission of `command_buffer` ordered by this pair.
    pub fn submission(&self, command_buffer: vk::CommandBuffer) -> Submission {
        Submission {
            command_buffer,
            wait_semaphore: self.image_available,
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: self.render_finished,
        }
    }

    /// Builds the presentation of `image_index` ordered by this pair.
    pub fn presentation(&self, swapchain: vk::SwapchainKHR, image_index: u32) -> Presentation {
        Presentation {
            swapchain,
            image_index,
            wait_semaphore: self.render_finished,
        }
    }
}

/// Creates an unsignaled binary semaphore.
pub fn create_semaphore(device: &Device) -> RhiResult<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
    debug!("Created semaphore");
    Ok(semaphore)
}

/// Maps a stale-swapchain status to the dedicated error.
fn swapchain_result(result: vk::Result) -> RhiError {
    match result {
        vk::Result::ERROR_OUT_OF_DATE_KHR => RhiError::SwapchainOutOfDate,
        other => RhiError::VulkanError(other),
    }
}

/// Acquires the next swapchain image with no timeout and no fence.
pub fn acquire_next_image(
    device: &Device,
    swapchain: vk::SwapchainKHR,
    signal: vk::Semaphore,
) -> RhiResult<AcquiredImage> {
    let (index, suboptimal) = unsafe {
        device
            .swapchain_loader()
            .acquire_next_image(swapchain, u64::MAX, signal, vk::Fence::null())
            .map_err(swapchain_result)?
    };

    Ok(AcquiredImage { index, suboptimal })
}

/// Submits one command buffer to `queue`, without a fence.
pub fn queue_submit(device: &Device, queue: vk::Queue, submission: &Submission) -> RhiResult<()> {
    let wait_semaphores = [submission.wait_semaphore];
    let wait_stages = [submission.wait_stage];
    let command_buffers = [submission.command_buffer];
    let signal_semaphores = [submission.signal_semaphore];

    let submit_info = vk::SubmitInfo::default()
        .wait_semaphores(&wait_semaphores)
        .wait_dst_stage_mask(&wait_stages)
        .command_buffers(&command_buffers)
        .signal_semaphores(&signal_semaphores);

    unsafe {
        device
            .handle()
            .queue_submit(queue, &[submit_info], vk::Fence::null())?;
    }
    Ok(())
}

/// Presents one image. Returns true when the swapchain is suboptimal.
pub fn queue_present(
    device: &Device,
    queue: vk::Queue,
    presentation: &Presentation,
) -> RhiResult<bool> {
    let wait_semaphores = [presentation.wait_semaphore];
    let swapchains = [presentation.swapchain];
    let image_indices = [presentation.image_index];

    let present_info = vk::PresentInfoKHR::default()
        .wait_semaphores(&wait_semaphores)
        .swapchains(&swapchains)
        .image_indices(&image_indices);

    let suboptimal = unsafe {
        device
            .swapchain_loader()
            .queue_present(queue, &present_info)
            .map_err(swapchain_result)?
    };
    Ok(suboptimal)
}
