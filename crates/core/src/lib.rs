//! Core utilities for the triangle renderer.
//!
//! This crate provides foundational types used across the workspace:
//! - Error types and result aliases
//! - Logging initialization
//! - Application configuration

mod config;
mod error;
mod logging;

pub use config::{AppConfig, ShaderConfig, WindowConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
