//! Hello Triangle - Main Entry Point
//!
//! Opens an 800x600 window and draws a single triangle with Vulkan until the
//! window is closed. Exits with status 1 and a message on stderr if any
//! step fails.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::info;

use triangle_core::AppConfig;
use triangle_platform::Window;
use triangle_rhi::{SurfaceTarget, VulkanDriver};

fn main() -> ExitCode {
    triangle_core::init_logging();

    println!("Starting Application");

    if let Err(e) = run() {
        eprintln!("{e:#}");
        return ExitCode::FAILURE;
    }

    println!("Closed Application");
    ExitCode::SUCCESS
}

fn run() -> Result<()> {
    let config = AppConfig::default();
    config.validate().context("Invalid configuration")?;

    let mut window = Window::new(
        config.window.width,
        config.window.height,
        &config.window.title,
    )
    .context("Failed to create window")?;

    let (display, handle) = window.raw_handles()?;

    // The driver holds raw handles into the window and is dropped first.
    let stats = {
        let mut driver = VulkanDriver::load(SurfaceTarget {
            display,
            window: handle,
        })
        .context("Failed to load Vulkan")?;

        triangle_renderer::run(&mut driver, &mut window, &config)?
    };

    info!("Shutdown complete after {} frames", stats.frames_presented);
    Ok(())
}
