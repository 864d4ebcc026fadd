//! Swapchain negotiation and creation.
//!
//! Negotiation is pure: given what the surface supports and, when needed, the
//! window's framebuffer size, [`SwapchainConfig::negotiate`] settles on a
//! format, present mode, extent and image count. The swapchain itself is
//! created once with no previous swapchain; there is no recreate path, so a
//! resized or invalidated surface is unsupported.

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::physical_device::QueueRoleAssignment;

/// Swapchain surface support details.
///
/// Contains information about what the surface supports for swapchain creation.
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes (FIFO, MAILBOX, IMMEDIATE, etc.)
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };

        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };

        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            if capabilities.max_image_count == 0 {
                "unlimited".to_string()
            } else {
                capabilities.max_image_count.to_string()
            }
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Checks if the swapchain support is adequate for rendering.
    ///
    /// Returns true if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Settings negotiated between the surface and the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    /// Image format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    /// Minimum number of images requested from the driver
    pub image_count: u32,
}

impl SwapchainConfig {
    /// Negotiates a configuration from surface support.
    ///
    /// `framebuffer_size` is only called when the surface leaves the extent
    /// undefined.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainError`] if the surface offers no formats
    /// or no present modes.
    pub fn negotiate<F>(support: &SwapchainSupportDetails, framebuffer_size: F) -> RhiResult<Self>
    where
        F: FnOnce() -> (u32, u32),
    {
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats).ok_or_else(|| {
            RhiError::SwapchainError("Surface reports no formats".to_string())
        })?;

        Ok(Self {
            surface_format,
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(&support.capabilities, framebuffer_size),
            image_count: determine_image_count(&support.capabilities),
        })
    }

    /// Returns the image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.surface_format.format
    }
}

/// How swapchain images are shared between queue families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSharing {
    /// One family owns the images
    Exclusive,
    /// Graphics and present families access the images concurrently
    Concurrent([u32; 2]),
}

impl ImageSharing {
    /// Concurrent across both families when they differ, else exclusive.
    pub fn for_roles(roles: &QueueRoleAssignment) -> Self {
        if roles.is_shared() {
            Self::Exclusive
        } else {
            Self::Concurrent([roles.graphics, roles.present])
        }
    }

    pub fn mode(&self) -> vk::SharingMode {
        match self {
            Self::Exclusive => vk::SharingMode::EXCLUSIVE,
            Self::Concurrent(_) => vk::SharingMode::CONCURRENT,
        }
    }

    /// Family list passed with the create info; empty when exclusive.
    pub fn queue_family_indices(&self) -> &[u32] {
        match self {
            Self::Exclusive => &[],
            Self::Concurrent(families) => families,
        }
    }
}

/// Everything needed to create the swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainDesc {
    pub surface: vk::SurfaceKHR,
    pub config: SwapchainConfig,
    pub sharing: ImageSharing,
    /// Usually the surface's current transform
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainDesc {
    /// Builds the create info. `old_swapchain` is always null.
    pub fn create_info(&self) -> vk::SwapchainCreateInfoKHR<'_> {
        vk::SwapchainCreateInfoKHR::default()
            .surface(self.surface)
            .min_image_count(self.config.image_count)
            .image_format(self.config.surface_format.format)
            .image_color_space(self.config.surface_format.color_space)
            .image_extent(self.config.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(self.sharing.mode())
            .queue_family_indices(self.sharing.queue_family_indices())
            .pre_transform(self.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.config.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null())
    }
}

/// The presentable images and one view per image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapchainImageSet {
    pub images: Vec<vk::Image>,
    pub views: Vec<vk::ImageView>,
}

impl SwapchainImageSet {
    #[inline]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Creates the swapchain described by `desc`.
pub fn create_swapchain(device: &Device, desc: &SwapchainDesc) -> RhiResult<vk::SwapchainKHR> {
    let config = &desc.config;
    info!(
        "Creating swapchain: {}x{}, format {:?}, color space {:?}, present mode {:?}, {} images",
        config.extent.width,
        config.extent.height,
        config.surface_format.format,
        config.surface_format.color_space,
        config.present_mode,
        config.image_count
    );

    match desc.sharing {
        ImageSharing::Concurrent([graphics, present]) => debug!(
            "Using CONCURRENT sharing mode between graphics ({}) and present ({}) queues",
            graphics, present
        ),
        ImageSharing::Exclusive => {
            debug!("Using EXCLUSIVE sharing mode (same queue family for graphics and present)")
        }
    }

    let create_info = desc.create_info();
    let swapchain = unsafe {
        device
            .swapchain_loader()
            .create_swapchain(&create_info, None)?
    };
    Ok(swapchain)
}

/// Creates a 2D color view of one swapchain image.
pub fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
) -> RhiResult<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    let view = unsafe { device.handle().create_image_view(&create_info, None)? };
    Ok(view)
}

/// Chooses the surface format.
///
/// Prefers B8G8R8A8_SRGB with SRGB_NONLINEAR color space, otherwise the first
/// format the surface lists. Returns `None` only for an empty list.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    if let Some(&format) = preferred {
        debug!("Selected preferred surface format: B8G8R8A8_SRGB with SRGB_NONLINEAR");
        return Some(format);
    }

    let first = formats.first().copied()?;
    warn!(
        "Using first available surface format: {:?} / {:?}",
        first.format, first.color_space
    );
    Some(first)
}

/// Chooses the present mode.
///
/// Always FIFO, which every driver must support. The list is only consulted
/// for logging.
pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    debug!(
        "Selected FIFO present mode (vsync), {} modes offered",
        present_modes.len()
    );
    vk::PresentModeKHR::FIFO
}

/// Chooses the swapchain extent (resolution).
///
/// Uses the surface's current extent unless its width is `u32::MAX`, in
/// which case the framebuffer size is clamped to the surface's limits.
pub fn choose_extent<F>(capabilities: &vk::SurfaceCapabilitiesKHR, framebuffer_size: F) -> vk::Extent2D
where
    F: FnOnce() -> (u32, u32),
{
    if capabilities.current_extent.width != u32::MAX {
        debug!(
            "Using current surface extent: {}x{}",
            capabilities.current_extent.width, capabilities.current_extent.height
        );
        return capabilities.current_extent;
    }

    let (width, height) = framebuffer_size();
    let extent = vk::Extent2D {
        width: width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    };

    debug!(
        "Calculated extent: {}x{} (framebuffer: {}x{}, min: {}x{}, max: {}x{})",
        extent.width,
        extent.height,
        width,
        height,
        capabilities.min_image_extent.width,
        capabilities.min_image_extent.height,
        capabilities.max_image_extent.width,
        capabilities.max_image_extent.height
    );

    extent
}

/// Determines the number of swapchain images.
///
/// One more than the minimum, capped at the maximum when one is advertised
/// (a maximum of 0 means unbounded).
pub fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    let image_count = if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    };

    debug!(
        "Image count: {} (min: {}, max: {})",
        image_count,
        capabilities.min_image_count,
        if capabilities.max_image_count == 0 {
            "unlimited".to_string()
        } else {
            capabilities.max_image_count.to_string()
        }
    );

    image_count
}
