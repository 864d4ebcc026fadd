//! SPIR-V shader blobs and shader module creation.
//!
//! - [`ShaderStage`] names the two programmable stages the pipeline uses
//! - [`ShaderBlob`] is a validated SPIR-V binary read fully into memory
//!
//! Shader modules are only needed while the pipeline is being built; the
//! caller destroys them right after.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// First word of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage - processes each vertex
    Vertex,
    /// Fragment (pixel) shader stage - processes each fragment
    Fragment,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            Self::Vertex => "Vertex",
            Self::Fragment => "Fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A SPIR-V binary for one stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderBlob {
    stage: ShaderStage,
    /// Where the blob came from, for error messages
    origin: PathBuf,
    code: Vec<u32>,
}

impl ShaderBlob {
    /// Reads and validates a SPIR-V file.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::ShaderIo`] if the file cannot be read and
    /// [`RhiError::ShaderError`] if the contents are not SPIR-V.
    pub fn load(path: &Path, stage: ShaderStage) -> RhiResult<Self> {
        let bytes = std::fs::read(path).map_err(|source| RhiError::ShaderIo {
            path: path.to_path_buf(),
            source,
        })?;

        let blob = Self::from_bytes(&bytes, stage, path)?;
        info!(
            "Loaded {} shader from {} ({} bytes)",
            stage,
            path.display(),
            bytes.len()
        );
        Ok(blob)
    }

    /// Validates SPIR-V bytes already in memory.
    ///
    /// The byte length must be a non-zero multiple of four and the first word
    /// must be the SPIR-V magic number in either byte order.
    pub fn from_bytes(bytes: &[u8], stage: ShaderStage, origin: &Path) -> RhiResult<Self> {
        if bytes.is_empty() {
            return Err(RhiError::ShaderError(format!(
                "{} shader {} is empty",
                stage,
                origin.display()
            )));
        }

        let code = ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| {
            RhiError::ShaderError(format!(
                "{} shader {} is not valid SPIR-V: {}",
                stage,
                origin.display(),
                e
            ))
        })?;

        if code.first() != Some(&SPIRV_MAGIC) {
            return Err(RhiError::ShaderError(format!(
                "{} shader {} is missing the SPIR-V magic number",
                stage,
                origin.display()
            )));
        }

        Ok(Self {
            stage,
            origin: origin.to_path_buf(),
            code,
        })
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    #[inline]
    pub fn origin(&self) -> &Path {
        &self.origin
    }

    /// SPIR-V words in host byte order.
    #[inline]
    pub fn code(&self) -> &[u32] {
        &self.code
    }
}

/// Creates a shader module from a validated blob.
pub fn create_shader_module(device: &Device, blob: &ShaderBlob) -> RhiResult<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::default().code(blob.code());

    let module = unsafe { device.handle().create_shader_module(&create_info, None)? };
    debug!(
        "{} shader module created from {}",
        blob.stage(),
        blob.origin().display()
    );
    Ok(module)
}
