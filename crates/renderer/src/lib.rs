//! Bootstrap, frame loop and teardown for the triangle renderer.
//!
//! This crate sequences the stages that bring up a Vulkan swapchain and
//! pipeline, drives the per-frame acquire/submit/present cycle, and
//! releases everything in reverse creation order:
//! - [`bootstrap`]: one function per initialization stage
//! - [`draw_frame`]: one frame of the synchronized cycle
//! - [`TeardownStack`]: release guards unwound on every exit path
//! - [`run`]: the top-level driver

pub mod bootstrap;
mod context;
mod frame;
mod renderer;
mod teardown;

pub use context::RenderContext;
pub use frame::draw_frame;
pub use renderer::{FrameStats, run};
pub use teardown::TeardownStack;
