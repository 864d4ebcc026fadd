//! Window management using winit.
//!
//! The window owns its event loop and drives it by pumping: each
//! [`WindowSystem::poll_events`] call dispatches whatever events are pending
//! and returns immediately. This keeps the render loop in charge of the
//! thread instead of handing control to winit.

use std::time::Duration;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};
use tracing::{debug, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window as WinitWindow, WindowAttributes, WindowId};

use triangle_core::{Error, Result};

/// What the render loop needs from a window.
pub trait WindowSystem {
    /// Drawable size in physical pixels.
    fn framebuffer_size(&self) -> (u32, u32);

    /// Processes pending window events without blocking.
    fn poll_events(&mut self);

    /// Returns true once the user asked to close the window.
    fn should_close(&self) -> bool;
}

/// Event handler state shared with winit while pumping.
struct WindowState {
    /// Attributes for the window not yet created
    pending: Option<WindowAttributes>,
    /// Window created during `resumed`, handed over once pumping returns
    created: Option<WinitWindow>,
    create_error: Option<String>,
    close_requested: bool,
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.pending.take() else {
            return;
        };

        match event_loop.create_window(attributes) {
            Ok(window) => self.created = Some(window),
            Err(e) => self.create_error = Some(e.to_string()),
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Resize to {}x{} ignored", size.width, size.height);
            }
            _ => {}
        }
    }
}

/// A fixed-size, non-resizable window with its own event loop.
///
/// Field order matters: the window is dropped before its event loop.
pub struct Window {
    window: WinitWindow,
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl Window {
    /// Create a new window with the given physical size and title.
    ///
    /// Pumps the event loop until the platform has created the window.
    pub fn new(width: u32, height: u32, title: &str) -> Result<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| Error::Window(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let attributes = WindowAttributes::default()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height))
            .with_resizable(false);

        let mut state = WindowState {
            pending: Some(attributes),
            created: None,
            create_error: None,
            close_requested: false,
        };

        let window = loop {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut state);

            if let Some(window) = state.created.take() {
                break window;
            }
            if let Some(err) = state.create_error.take() {
                return Err(Error::Window(format!("Failed to create window: {err}")));
            }
            if let PumpStatus::Exit(code) = status {
                return Err(Error::Window(format!(
                    "Event loop exited with code {code} before the window was created"
                )));
            }
        };

        info!("Window created: {}x{} \"{}\"", width, height, title);

        Ok(Self {
            window,
            state,
            event_loop,
        })
    }

    /// Raw display and window handles for surface creation.
    pub fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle)> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| Error::Window(format!("Failed to get display handle: {}", e)))?;

        let window = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("Failed to get window handle: {}", e)))?;

        Ok((display.as_raw(), window.as_raw()))
    }
}

impl WindowSystem for Window {
    fn framebuffer_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn poll_events(&mut self) {
        if let PumpStatus::Exit(code) =
            self.event_loop
                .pump_app_events(Some(Duration::ZERO), &mut self.state)
        {
            debug!("Event loop exited with code {}", code);
            self.state.close_requested = true;
        }
    }

    fn should_close(&self) -> bool {
        self.state.close_requested
    }
}
