//! Physical device (GPU) selection.
//!
//! The selection process:
//! 1. Enumerate all available GPUs
//! 2. Resolve the graphics and present queue roles for each
//! 3. Verify the required device extensions
//! 4. Verify the surface offers at least one format and one present mode
//!
//! The first GPU that passes every check, in enumeration order, is selected.
//! There is no scoring between suitable devices.

use std::ffi::{CStr, CString};

use ash::vk;
use tracing::{debug, info};

use crate::driver::Driver;
use crate::error::{RhiError, RhiResult};
use crate::swapchain::SwapchainSupportDetails;

/// Device extensions every candidate must support.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Outcome of searching for a queue family with a given capability.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum QueueFamily {
    Found(u32),
    #[default]
    NotFound,
}

impl QueueFamily {
    /// Returns the family index if one was found.
    #[inline]
    pub fn index(self) -> Option<u32> {
        match self {
            Self::Found(index) => Some(index),
            Self::NotFound => None,
        }
    }

    #[inline]
    pub fn is_found(self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Queue roles as discovered during a family scan; either may be missing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueRoles {
    pub graphics: QueueFamily,
    pub present: QueueFamily,
}

impl QueueRoles {
    /// Checks if both roles resolved.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics.is_found() && self.present.is_found()
    }

    /// Converts to a fully resolved assignment, if both roles were found.
    pub fn resolve(&self) -> Option<QueueRoleAssignment> {
        Some(QueueRoleAssignment {
            graphics: self.graphics.index()?,
            present: self.present.index()?,
        })
    }
}

/// Queue family index for each logical role of the selected device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueRoleAssignment {
    pub graphics: u32,
    pub present: u32,
}

impl QueueRoleAssignment {
    /// Returns true when one family serves both roles.
    #[inline]
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Returns the distinct family indices, graphics first.
    ///
    /// Used when creating the logical device so no family gets two queue
    /// create infos.
    pub fn unique_families(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics]
        } else {
            vec![self.graphics, self.present]
        }
    }
}

/// An enumerated GPU, only alive during selection.
#[derive(Clone, Debug)]
pub struct AcceleratorCandidate {
    /// Vulkan physical device handle.
    pub handle: vk::PhysicalDevice,
    /// Device name as reported by the driver.
    pub name: String,
    /// Device type (Discrete, Integrated, etc.).
    pub device_type: vk::PhysicalDeviceType,
    /// Optional core features the device supports. None are required.
    pub features: vk::PhysicalDeviceFeatures,
}

impl AcceleratorCandidate {
    /// Builds a candidate from the properties and features the driver reports.
    pub fn from_properties(
        handle: vk::PhysicalDevice,
        properties: &vk::PhysicalDeviceProperties,
        features: vk::PhysicalDeviceFeatures,
    ) -> Self {
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        Self {
            handle,
            name,
            device_type: properties.device_type,
            features,
        }
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }
}

/// The chosen GPU together with everything learned while checking it.
#[derive(Clone, Debug)]
pub struct SelectedAccelerator {
    pub candidate: AcceleratorCandidate,
    pub roles: QueueRoleAssignment,
    /// Surface support captured during selection; reused by the swapchain.
    pub support: SwapchainSupportDetails,
}

/// Why a candidate was turned down.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    MissingQueueRoles(QueueRoles),
    MissingExtensions(Vec<String>),
    InadequateSurfaceSupport { formats: usize, present_modes: usize },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingQueueRoles(roles) => write!(
                f,
                "missing required queue families (graphics={}, present={})",
                roles.graphics.is_found(),
                roles.present.is_found()
            ),
            Self::MissingExtensions(names) => {
                write!(f, "missing device extensions: {}", names.join(", "))
            }
            Self::InadequateSurfaceSupport {
                formats,
                present_modes,
            } => write!(
                f,
                "inadequate surface support ({formats} formats, {present_modes} present modes)"
            ),
        }
    }
}

/// Scans queue families in index order and records the first family for
/// each role.
///
/// `supports_present` is asked about each family until a present-capable one
/// is found. Families that expose no queues are skipped.
pub fn resolve_queue_roles<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> RhiResult<QueueRoles>
where
    F: FnMut(u32) -> RhiResult<bool>,
{
    let mut roles = QueueRoles::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;

        if family.queue_count == 0 {
            continue;
        }

        if !roles.graphics.is_found() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            roles.graphics = QueueFamily::Found(i);
        }

        if !roles.present.is_found() && supports_present(i)? {
            roles.present = QueueFamily::Found(i);
        }

        if roles.is_complete() {
            break;
        }
    }

    Ok(roles)
}

/// Returns the required extensions missing from `supported`.
pub fn missing_device_extensions(supported: &[CString]) -> Vec<String> {
    REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .filter(|required| !supported.iter().any(|s| s.as_c_str() == **required))
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Returns the first candidate, in order, for which `check` yields a value.
///
/// Errors from `check` abort the search.
pub fn first_suitable<T, S, F>(candidates: Vec<T>, mut check: F) -> RhiResult<Option<(T, S)>>
where
    F: FnMut(&T) -> RhiResult<Option<S>>,
{
    for candidate in candidates {
        if let Some(found) = check(&candidate)? {
            return Ok(Some((candidate, found)));
        }
    }
    Ok(None)
}

/// Runs every suitability check against one candidate.
pub fn check_suitability<D: Driver>(
    driver: &D,
    candidate: &AcceleratorCandidate,
    surface: vk::SurfaceKHR,
) -> RhiResult<Result<(QueueRoleAssignment, SwapchainSupportDetails), Rejection>> {
    let families = driver.queue_families(candidate.handle)?;
    let roles = resolve_queue_roles(&families, |index| {
        driver.supports_present(candidate.handle, index, surface)
    })?;

    let Some(assignment) = roles.resolve() else {
        return Ok(Err(Rejection::MissingQueueRoles(roles)));
    };

    let missing = missing_device_extensions(&driver.device_extensions(candidate.handle)?);
    if !missing.is_empty() {
        return Ok(Err(Rejection::MissingExtensions(missing)));
    }

    let support = driver.surface_support(candidate.handle, surface)?;
    if !support.is_adequate() {
        return Ok(Err(Rejection::InadequateSurfaceSupport {
            formats: support.formats.len(),
            present_modes: support.present_modes.len(),
        }));
    }

    Ok(Ok((assignment, support)))
}

/// Picks the error for a selection where every candidate was rejected.
///
/// If extensions were the only problem, the missing names are reported.
pub fn no_suitable_error(rejections: &[Rejection]) -> RhiError {
    let mut missing: Vec<String> = Vec::new();
    for rejection in rejections {
        let Rejection::MissingExtensions(names) = rejection else {
            return RhiError::NoSuitableGpu;
        };
        for name in names {
            if !missing.contains(name) {
                missing.push(name.clone());
            }
        }
    }

    if missing.is_empty() {
        RhiError::NoSuitableGpu
    } else {
        RhiError::MissingExtensions(missing)
    }
}

/// Selects the first suitable GPU for rendering to `surface`.
///
/// # Errors
///
/// Returns [`RhiError::NoAccelerator`] when nothing is enumerated and
/// [`RhiError::NoSuitableGpu`] when no candidate passes, or
/// [`RhiError::MissingExtensions`] when extensions were the only reason.
pub fn select_accelerator<D: Driver>(
    driver: &D,
    surface: vk::SurfaceKHR,
) -> RhiResult<SelectedAccelerator> {
    let candidates = driver.enumerate_accelerators()?;

    if candidates.is_empty() {
        return Err(RhiError::NoAccelerator);
    }

    info!("Found {} GPU(s)", candidates.len());
    for candidate in &candidates {
        info!("  '{}' ({})", candidate.name, candidate.device_type_name());
        debug!(
            "    geometry shader: {}, sampler anisotropy: {}, wide lines: {}",
            candidate.features.geometry_shader == vk::TRUE,
            candidate.features.sampler_anisotropy == vk::TRUE,
            candidate.features.wide_lines == vk::TRUE
        );
    }

    let mut rejections = Vec::new();
    let selected = first_suitable(candidates, |candidate| {
        Ok(match check_suitability(driver, candidate, surface)? {
            Ok(found) => Some(found),
            Err(rejection) => {
                debug!("GPU '{}' skipped: {}", candidate.name, rejection);
                rejections.push(rejection);
                None
            }
        })
    })?;

    let Some((candidate, (roles, support))) = selected else {
        return Err(no_suitable_error(&rejections));
    };

    info!(
        "Selected GPU: '{}' ({}), graphics family {}, present family {}",
        candidate.name,
        candidate.device_type_name(),
        roles.graphics,
        roles.present
    );

    Ok(SelectedAccelerator {
        candidate,
        roles,
        support,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn test_queue_family_default_is_not_found() {
        assert_eq!(QueueFamily::default(), QueueFamily::NotFound);
        assert_eq!(QueueFamily::NotFound.index(), None);
        assert_eq!(QueueFamily::Found(2).index(), Some(2));
    }

    #[test]
    fn test_resolve_roles_on_shared_family() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 1)];
        let roles = resolve_queue_roles(&families, |_| Ok(true)).unwrap();

        assert_eq!(
            roles.resolve(),
            Some(QueueRoleAssignment {
                graphics: 0,
                present: 0
            })
        );
    }

    #[test]
    fn test_resolve_roles_on_separate_families() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::COMPUTE, 1),
        ];
        let roles = resolve_queue_roles(&families, |i| Ok(i == 2)).unwrap();

        let assignment = roles.resolve().unwrap();
        assert_eq!(assignment.graphics, 1);
        assert_eq!(assignment.present, 2);
        assert!(!assignment.is_shared());
    }

    #[test]
    fn test_resolve_roles_keeps_first_match() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        let roles = resolve_queue_roles(&families, |i| Ok(i >= 1)).unwrap();

        assert_eq!(roles.graphics, QueueFamily::Found(0));
        assert_eq!(roles.present, QueueFamily::Found(1));
    }

    #[test]
    fn test_resolve_roles_skips_empty_families() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::GRAPHICS, 4),
        ];
        let mut queried = Vec::new();
        let roles = resolve_queue_roles(&families, |i| {
            queried.push(i);
            Ok(true)
        })
        .unwrap();

        assert_eq!(roles.graphics, QueueFamily::Found(1));
        assert_eq!(roles.present, QueueFamily::Found(1));
        assert_eq!(queried, vec![1]);
    }

    #[test]
    fn test_resolve_roles_incomplete_without_present() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let roles = resolve_queue_roles(&families, |_| Ok(false)).unwrap();

        assert!(!roles.is_complete());
        assert_eq!(roles.resolve(), None);
    }

    #[test]
    fn test_resolve_roles_propagates_query_errors() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let result = resolve_queue_roles(&families, |_| {
            Err(RhiError::VulkanError(vk::Result::ERROR_SURFACE_LOST_KHR))
        });
        assert!(matches!(
            result,
            Err(RhiError::VulkanError(vk::Result::ERROR_SURFACE_LOST_KHR))
        ));
    }

    #[test]
    fn test_unique_families() {
        let shared = QueueRoleAssignment {
            graphics: 3,
            present: 3,
        };
        assert_eq!(shared.unique_families(), vec![3]);

        let split = QueueRoleAssignment {
            graphics: 0,
            present: 2,
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_missing_device_extensions() {
        assert_eq!(
            missing_device_extensions(&[]),
            vec!["VK_KHR_swapchain".to_string()]
        );
        assert!(
            missing_device_extensions(&[
                c"VK_KHR_maintenance1".to_owned(),
                c"VK_KHR_swapchain".to_owned(),
            ])
            .is_empty()
        );
    }

    #[test]
    fn test_first_suitable_returns_first_in_order() {
        let candidates = vec!["a", "b", "c", "d"];
        let selected = first_suitable(candidates, |c| {
            Ok(matches!(*c, "b" | "d").then(|| c.to_uppercase()))
        })
        .unwrap();

        assert_eq!(selected, Some(("b", "B".to_string())));
    }

    #[test]
    fn test_first_suitable_stops_checking_after_match() {
        let mut checked = Vec::new();
        let _ = first_suitable(vec![1, 2, 3], |c| {
            checked.push(*c);
            Ok((*c == 2).then_some(()))
        });
        assert_eq!(checked, vec![1, 2]);
    }

    #[test]
    fn test_first_suitable_none() {
        let selected: Option<(u32, ())> = first_suitable(vec![1, 2], |_| Ok(None)).unwrap();
        assert!(selected.is_none());
    }

    #[test]
    fn test_candidate_device_type_name() {
        let mut properties = vk::PhysicalDeviceProperties::default();
        properties.device_type = vk::PhysicalDeviceType::INTEGRATED_GPU;
        for (dst, src) in properties.device_name.iter_mut().zip(b"Test GPU\0") {
            *dst = *src as std::ffi::c_char;
        }

        let features = vk::PhysicalDeviceFeatures {
            geometry_shader: vk::TRUE,
            ..Default::default()
        };

        let candidate = AcceleratorCandidate::from_properties(
            vk::PhysicalDevice::null(),
            &properties,
            features,
        );
        assert_eq!(candidate.name, "Test GPU");
        assert_eq!(candidate.device_type_name(), "Integrated GPU");
        assert_eq!(candidate.features.geometry_shader, vk::TRUE);
    }

    #[test]
    fn test_no_suitable_error_names_missing_extensions() {
        let err = no_suitable_error(&[
            Rejection::MissingExtensions(vec!["VK_KHR_swapchain".to_string()]),
            Rejection::MissingExtensions(vec!["VK_KHR_swapchain".to_string()]),
        ]);
        match err {
            RhiError::MissingExtensions(names) => assert_eq!(names, vec!["VK_KHR_swapchain"]),
            other => panic!("expected missing extensions, got {other:?}"),
        }
    }

    #[test]
    fn test_no_suitable_error_with_mixed_rejections() {
        let err = no_suitable_error(&[
            Rejection::MissingExtensions(vec!["VK_KHR_swapchain".to_string()]),
            Rejection::InadequateSurfaceSupport {
                formats: 0,
                present_modes: 1,
            },
        ]);
        assert!(matches!(err, RhiError::NoSuitableGpu));
        assert!(matches!(no_suitable_error(&[]), RhiError::NoSuitableGpu));
    }
}
