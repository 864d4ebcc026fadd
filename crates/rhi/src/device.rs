//! Vulkan logical device and queue management.
//!
//! The [`Device`] struct owns the logical device handle and the swapchain
//! extension loader. Every other GPU object is created from it, so it is
//! destroyed explicitly by the teardown sequence after all of them.

use ash::vk;
use tracing::{debug, info};

use crate::error::RhiResult;
use crate::instance::Instance;
use crate::physical_device::{QueueRoleAssignment, REQUIRED_DEVICE_EXTENSIONS};

/// Queues retrieved for the selected roles.
///
/// When both roles share a family the two handles are the same queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceQueues {
    pub graphics: vk::Queue,
    pub present: vk::Queue,
}

/// Builds one queue create info per unique family, each with one queue.
pub fn queue_create_infos<'a>(
    roles: &QueueRoleAssignment,
    priorities: &'a [f32],
) -> Vec<vk::DeviceQueueCreateInfo<'a>> {
    roles
        .unique_families()
        .into_iter()
        .map(|family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(priorities)
        })
        .collect()
}

/// Vulkan logical device wrapper.
pub struct Device {
    /// Logical device handle
    device: ash::Device,
    /// Swapchain extension loader
    swapchain_loader: ash::khr::swapchain::Device,
}

impl Device {
    /// Creates the logical device and fetches queue 0 of each role's family.
    ///
    /// No optional features are enabled; the only extension is the swapchain.
    pub fn new(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        roles: &QueueRoleAssignment,
    ) -> RhiResult<(Self, DeviceQueues)> {
        let queue_priorities = [1.0f32];
        let queue_infos = queue_create_infos(roles, &queue_priorities);

        debug!(
            "Creating {} queue(s) for families: {:?}",
            queue_infos.len(),
            roles.unique_families()
        );

        let features = vk::PhysicalDeviceFeatures::default();
        let extension_names: Vec<*const std::ffi::c_char> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .handle()
                .create_device(physical_device, &create_info, None)?
        };

        info!(
            "Logical device created with {} extension(s)",
            extension_names.len()
        );

        let queues = unsafe {
            DeviceQueues {
                graphics: device.get_device_queue(roles.graphics, 0),
                present: device.get_device_queue(roles.present, 0),
            }
        };
        debug!(
            "Queues retrieved: graphics from family {}, present from family {}",
            roles.graphics, roles.present
        );

        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), &device);

        Ok((
            Self {
                device,
                swapchain_loader,
            },
            queues,
        ))
    }

    /// Returns the logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the swapchain extension loader.
    #[inline]
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Waits for the device to become idle.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }

    /// Destroys the logical device.
    ///
    /// # Safety
    ///
    /// Every object created from this device must already be destroyed and
    /// the device must be idle.
    pub unsafe fn destroy(self) {
        unsafe { self.device.destroy_device(None) };
        info!("Logical device destroyed");
    }
}
