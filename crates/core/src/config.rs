//! Fixed application settings.
//!
//! The program takes no arguments and reads no environment, so every
//! setting lives here with its default value.

use std::path::PathBuf;

use crate::error::{Error, Result};

/// Window settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowConfig {
    /// Width in physical pixels
    pub width: u32,
    /// Height in physical pixels
    pub height: u32,
    /// Window title
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Vulkan".to_string(),
        }
    }
}

/// Pre-compiled shader blob locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderConfig {
    /// Vertex stage SPIR-V
    pub vertex: PathBuf,
    /// Fragment stage SPIR-V
    pub fragment: PathBuf,
    /// Entry point shared by both stages
    pub entry_point: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/shader.vert.spv"),
            fragment: PathBuf::from("shaders/shader.frag.spv"),
            entry_point: "main".to_string(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Name reported to the driver
    pub application_name: String,
    pub window: WindowConfig,
    pub shaders: ShaderConfig,
    /// Request the Khronos validation layer
    pub enable_validation: bool,
    /// RGBA clear color for the color attachment
    pub clear_color: [f32; 4],
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            application_name: "Hello Triangle".to_string(),
            window: WindowConfig::default(),
            shaders: ShaderConfig::default(),
            enable_validation: cfg!(debug_assertions),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl AppConfig {
    /// Checks the settings for values no window or driver could accept.
    pub fn validate(&self) -> Result<()> {
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::Config(format!(
                "window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }

        if self.shaders.entry_point.is_empty() || self.shaders.entry_point.contains('\0') {
            return Err(Error::Config(format!(
                "invalid shader entry point {:?}",
                self.shaders.entry_point
            )));
        }

        Ok(())
    }
}
