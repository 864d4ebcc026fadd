//! The steady-state acquire, submit, present cycle.

use tracing::{debug, trace};

use triangle_rhi::{Driver, RhiResult};

use crate::context::RenderContext;

/// Draws one frame and returns the image index that was presented.
///
/// Ordering is carried entirely by the frame's semaphore pair: acquisition
/// signals `image_available`, the submission waits on it and signals
/// `render_finished`, and presentation waits on that. The CPU never waits
/// here except inside acquisition.
///
/// # Errors
///
/// An out-of-date swapchain surfaces as
/// [`RhiError::SwapchainOutOfDate`](triangle_rhi::RhiError::SwapchainOutOfDate);
/// nothing is retried.
pub fn draw_frame<D: Driver>(driver: &mut D, ctx: &RenderContext) -> RhiResult<u32> {
    let acquired = driver.acquire_next_image(ctx.swapchain, ctx.sync.image_available)?;
    if acquired.suboptimal {
        debug!("Acquire reported a suboptimal swapchain");
    }

    let command_buffer = ctx.commands.buffer(acquired.index)?;
    driver.queue_submit(ctx.queues.graphics, &ctx.sync.submission(command_buffer))?;

    let suboptimal = driver.queue_present(
        ctx.queues.present,
        &ctx.sync.presentation(ctx.swapchain, acquired.index),
    )?;
    if suboptimal {
        debug!("Present reported a suboptimal swapchain");
    }

    trace!("Presented image {}", acquired.index);
    Ok(acquired.index)
}
