//! Platform abstraction layer for the triangle renderer.
//!
//! This crate provides the windowing collaborator:
//! - A fixed-size window via winit with non-blocking event pumping
//! - The [`WindowSystem`] trait the render loop polls
//! - Raw window handles for Vulkan surface creation

mod window;

pub use window::{Window, WindowSystem};
