//! Vulkan instance management.
//!
//! This module handles VkInstance creation, layer validation, and the debug
//! messenger that routes validation output into `tracing`.
//!
//! Requesting the validation layer is a hard requirement: if it was asked for
//! and the loader does not know it, creation fails with
//! [`RhiError::MissingLayers`] instead of silently running without it.

use std::ffi::{CStr, CString, c_char};

use ash::{Entry, vk};
use tracing::{debug, error, info, warn};

use crate::error::{RhiError, RhiResult};

/// The Khronos validation layer name.
pub const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Engine name reported in the application info.
const ENGINE_NAME: &CStr = c"No Engine";

/// Parameters for instance creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDesc {
    /// Application name reported to the driver
    pub application_name: CString,
    /// Enables the Khronos validation layer and the debug messenger
    pub enable_validation: bool,
}

impl InstanceDesc {
    /// Builds a description, rejecting names with interior NUL bytes.
    pub fn new(application_name: &str, enable_validation: bool) -> RhiResult<Self> {
        let application_name = CString::new(application_name).map_err(|_| {
            RhiError::InvalidHandle(format!(
                "application name {application_name:?} contains a NUL byte"
            ))
        })?;

        Ok(Self {
            application_name,
            enable_validation,
        })
    }

    /// Layers to enable for this description.
    pub fn requested_layers(&self) -> Vec<&'static CStr> {
        if self.enable_validation {
            vec![VALIDATION_LAYER_NAME]
        } else {
            Vec::new()
        }
    }
}

/// Vulkan instance wrapper.
///
/// Not released on drop. The owner calls [`Instance::destroy`] once every
/// surface and device created from it is gone.
pub struct Instance {
    /// Vulkan instance handle
    instance: ash::Instance,
    /// Surface extension loader
    surface_loader: ash::khr::surface::Instance,
    /// Debug utils loader and messenger (only present when validation is enabled)
    debug: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Creates a new Vulkan instance.
    ///
    /// `extensions` are the instance extensions the window system needs for
    /// surface creation. The debug utils extension is appended when
    /// validation is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A requested layer is not installed
    /// - Instance creation fails
    /// - Debug messenger setup fails (when validation is enabled)
    pub fn new(entry: &Entry, desc: &InstanceDesc, extensions: &[*const c_char]) -> RhiResult<Self> {
        let layers = desc.requested_layers();
        if !layers.is_empty() {
            let available = Self::available_layers(entry)?;
            let missing = missing_layers(&layers, &available);
            if !missing.is_empty() {
                return Err(RhiError::MissingLayers(missing));
            }
        }

        for name in available_extensions(entry)? {
            debug!("Available instance extension: {}", name.to_string_lossy());
        }

        let app_info = vk::ApplicationInfo::default()
            .application_name(&desc.application_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_1);

        let mut extension_names = extensions.to_vec();
        if desc.enable_validation {
            extension_names.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        let layer_names: Vec<*const c_char> = layers.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None)? };
        info!(
            "Vulkan instance created ({} extensions, {} layers)",
            extension_names.len(),
            layer_names.len()
        );

        let debug = if desc.enable_validation {
            let debug_utils = ash::ext::debug_utils::Instance::new(entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => {
                    info!("Validation layers enabled");
                    Some((debug_utils, messenger))
                }
                Err(e) => {
                    // SAFETY: nothing has been created from the instance yet.
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let surface_loader = ash::khr::surface::Instance::new(entry, &instance);

        Ok(Self {
            instance,
            surface_loader,
            debug,
        })
    }

    /// Returns the Vulkan instance handle.
    #[inline]
    pub fn handle(&self) -> &ash::Instance {
        &self.instance
    }

    /// Returns the surface extension loader.
    #[inline]
    pub fn surface_loader(&self) -> &ash::khr::surface::Instance {
        &self.surface_loader
    }

    /// Destroys the debug messenger and then the instance.
    ///
    /// # Safety
    ///
    /// Every surface and device created from this instance must already be
    /// destroyed.
    pub unsafe fn destroy(self) {
        unsafe {
            if let Some((debug_utils, messenger)) = &self.debug {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        info!("Vulkan instance destroyed");
    }

    fn available_layers(entry: &Entry) -> RhiResult<Vec<CString>> {
        let properties = unsafe { entry.enumerate_instance_layer_properties()? };

        let names = properties
            .iter()
            .map(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) }.to_owned())
            .collect::<Vec<_>>();

        debug!("{} instance layers available", names.len());
        Ok(names)
    }

    /// Sets up the debug messenger for validation layer callbacks.
    fn setup_debug_messenger(
        debug_utils: &ash::ext::debug_utils::Instance,
    ) -> RhiResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None)? };
        Ok(messenger)
    }
}

/// Lists the instance extensions the loader reports.
fn available_extensions(entry: &Entry) -> RhiResult<Vec<CString>> {
    let properties = unsafe { entry.enumerate_instance_extension_properties(None)? };

    Ok(properties
        .iter()
        .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }.to_owned())
        .collect())
}

/// Returns the requested layers that are not in `available`, in request order.
pub fn missing_layers(requested: &[&CStr], available: &[CString]) -> Vec<String> {
    requested
        .iter()
        .filter(|name| !available.iter().any(|a| a.as_c_str() == **name))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Debug callback function for validation layer messages.
///
/// # Safety
///
/// Called by the Vulkan loader with a valid callback data pointer or null.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = unsafe { &*p_callback_data };
    let message = if callback_data.p_message.is_null() {
        std::borrow::Cow::Borrowed("(no message)")
    } else {
        unsafe { CStr::from_ptr(callback_data.p_message).to_string_lossy() }
    };

    let type_str = match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "General",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "Validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "Performance",
        _ => "Unknown",
    };

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => error!("[Vulkan {}] {}", type_str, message),
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => warn!("[Vulkan {}] {}", type_str, message),
        _ => debug!("[Vulkan {}] {}", type_str, message),
    }

    vk::FALSE
}
