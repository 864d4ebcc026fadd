//! Top-level driver: initialize, loop until the window closes, tear down.

use tracing::info;

use triangle_core::AppConfig;
use triangle_platform::WindowSystem;
use triangle_rhi::{Driver, RhiResult};

use crate::bootstrap::initialize;
use crate::context::RenderContext;
use crate::frame::draw_frame;
use crate::teardown::TeardownStack;

/// Counters reported after a clean shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_presented: u64,
}

/// Runs the whole application lifecycle against `driver` and `window`.
///
/// Teardown always runs, after a clean close and after a failure at any
/// point, and releases exactly what was created. The window itself is left
/// to the caller and must outlive this call.
///
/// # Errors
///
/// Returns the first initialization or per-frame error. It is not logged
/// here; reporting is left to the caller.
pub fn run<D, W>(driver: &mut D, window: &mut W, config: &AppConfig) -> RhiResult<FrameStats>
where
    D: Driver,
    W: WindowSystem,
{
    let mut stack = TeardownStack::new();

    let result = initialize(driver, &*window, config, &mut stack)
        .and_then(|ctx| main_loop(driver, window, &ctx));

    stack.unwind(driver);

    if let Ok(stats) = &result {
        info!("Presented {} frames", stats.frames_presented);
    }
    result
}

fn main_loop<D, W>(driver: &mut D, window: &mut W, ctx: &RenderContext) -> RhiResult<FrameStats>
where
    D: Driver,
    W: WindowSystem,
{
    let mut stats = FrameStats::default();

    info!("Entering main loop");
    while !window.should_close() {
        window.poll_events();
        draw_frame(driver, ctx)?;
        stats.frames_presented += 1;
    }

    Ok(stats)
}
