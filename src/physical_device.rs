use std::ffi::{CStr, CString};

use ash::vk;
use log::{debug, info};

use crate::{
    config::DeviceRequirements,
    error::{Error, Result},
    queue_family::QueueFamilyIndices,
    surface::{SurfaceQuery, SurfaceSupport},
};

/// Caller-supplied gate layered on top of the surface checks.
pub type DevicePredicate = fn(&PhysicalDevice) -> bool;

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueFamily {
    pub index: u32,
    pub properties: vk::QueueFamilyProperties,
}

/// A candidate device as captured at enumeration time.
#[derive(Debug, Clone, Default)]
pub struct PhysicalDevice {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub queue_families: Vec<QueueFamily>,
    pub extensions: Vec<CString>,
}

impl PhysicalDevice {
    /// Exact name match, order-independent.
    pub fn supports_extensions(&self, required: &[CString]) -> bool {
        required
            .iter()
            .all(|name| self.supports_extension(name))
    }

    pub fn supports_extension(&self, name: &CStr) -> bool {
        self.extensions
            .iter()
            .any(|extension| extension.as_c_str() == name)
    }
}

/// The outcome of device selection: the device plus everything probed while
/// deciding it was suitable.
#[derive(Debug, Clone)]
pub struct Selection {
    pub physical_device: PhysicalDevice,
    pub queue_families: QueueFamilyIndices,
    pub surface_support: SurfaceSupport,
}

/// Returns the first candidate, in enumeration order, that satisfies every
/// requirement. There is no ranking between suitable devices.
pub fn select(
    candidates: impl IntoIterator<Item = PhysicalDevice>,
    surface: &impl SurfaceQuery,
    requirements: &DeviceRequirements,
) -> Result<Selection> {
    let mut count = 0;
    for physical_device in candidates {
        count += 1;
        if let Some((queue_families, surface_support)) =
            evaluate(&physical_device, surface, requirements)?
        {
            info!(
                "Selected {} ({:?})",
                physical_device.name, physical_device.properties.device_type
            );
            return Ok(Selection {
                physical_device,
                queue_families,
                surface_support,
            });
        }
    }
    Err(Error::NoSuitableDevice { candidates: count })
}

pub fn is_suitable(
    physical_device: &PhysicalDevice,
    surface: &impl SurfaceQuery,
    requirements: &DeviceRequirements,
) -> Result<bool> {
    Ok(evaluate(physical_device, surface, requirements)?.is_some())
}

fn evaluate(
    physical_device: &PhysicalDevice,
    surface: &impl SurfaceQuery,
    requirements: &DeviceRequirements,
) -> Result<Option<(QueueFamilyIndices, SurfaceSupport)>> {
    let name = &physical_device.name;
    if !physical_device.supports_extensions(&requirements.extensions) {
        debug!("{name}: missing required device extensions");
        return Ok(None);
    }
    if let Some(predicate) = requirements.predicate {
        if !predicate(physical_device) {
            debug!("{name}: rejected by device predicate");
            return Ok(None);
        }
    }
    let queue_families = QueueFamilyIndices::resolve(physical_device, surface)?;
    if !queue_families.is_complete() {
        debug!("{name}: incomplete queue families {queue_families:?}");
        return Ok(None);
    }
    let surface_support = SurfaceSupport::query(surface, physical_device)?;
    if !surface_support.is_adequate() {
        debug!(
            "{name}: {} surface format(s), {} present mode(s)",
            surface_support.formats.len(),
            surface_support.present_modes.len()
        );
        return Ok(None);
    }
    Ok(Some((queue_families, surface_support)))
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use ash::{extensions::khr, vk::Handle};

    use super::*;

    #[derive(Default)]
    pub(crate) struct FakeSurface {
        pub present: HashMap<u64, Vec<bool>>,
        pub support: HashMap<u64, SurfaceSupport>,
        pub failing: Option<u64>,
    }

    impl FakeSurface {
        fn check(&self, physical_device: &PhysicalDevice) -> Result<()> {
            if self.failing == Some(physical_device.handle.as_raw()) {
                return Err(Error::Query {
                    what: "fake",
                    result: vk::Result::ERROR_SURFACE_LOST_KHR,
                });
            }
            Ok(())
        }

        fn support(&self, physical_device: &PhysicalDevice) -> SurfaceSupport {
            self.support
                .get(&physical_device.handle.as_raw())
                .cloned()
                .unwrap_or_default()
        }
    }

    impl SurfaceQuery for FakeSurface {
        fn supports_present(&self, physical_device: &PhysicalDevice, index: u32) -> Result<bool> {
            self.check(physical_device)?;
            Ok(self
                .present
                .get(&physical_device.handle.as_raw())
                .and_then(|flags| flags.get(index as usize).copied())
                .unwrap_or(false))
        }

        fn capabilities(
            &self,
            physical_device: &PhysicalDevice,
        ) -> Result<vk::SurfaceCapabilitiesKHR> {
            self.check(physical_device)?;
            Ok(self.support(physical_device).capabilities)
        }

        fn formats(&self, physical_device: &PhysicalDevice) -> Result<Vec<vk::SurfaceFormatKHR>> {
            self.check(physical_device)?;
            Ok(self.support(physical_device).formats)
        }

        fn present_modes(&self, physical_device: &PhysicalDevice) -> Result<Vec<vk::PresentModeKHR>> {
            self.check(physical_device)?;
            Ok(self.support(physical_device).present_modes)
        }
    }

    pub(crate) fn device(raw: u64, flags: &[vk::QueueFlags]) -> PhysicalDevice {
        PhysicalDevice {
            handle: vk::PhysicalDevice::from_raw(raw),
            name: format!("gpu{raw}"),
            queue_families: flags
                .iter()
                .enumerate()
                .map(|(index, &queue_flags)| QueueFamily {
                    index: index as u32,
                    properties: vk::QueueFamilyProperties {
                        queue_flags,
                        queue_count: 1,
                        ..Default::default()
                    },
                })
                .collect(),
            extensions: vec![khr::Swapchain::name().to_owned()],
            ..Default::default()
        }
    }

    pub(crate) fn adequate_support() -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        }
    }

    fn usable(surface: &mut FakeSurface, physical_device: &PhysicalDevice) {
        let raw = physical_device.handle.as_raw();
        surface
            .present
            .insert(raw, vec![true; physical_device.queue_families.len()]);
        surface.support.insert(raw, adequate_support());
    }

    #[test]
    fn picks_first_suitable_in_enumeration_order() {
        let mut surface = FakeSurface::default();
        let first = device(1, &[vk::QueueFlags::COMPUTE]);
        let second = device(2, &[vk::QueueFlags::GRAPHICS]);
        let third = device(3, &[vk::QueueFlags::GRAPHICS]);
        for physical_device in [&first, &second, &third] {
            usable(&mut surface, physical_device);
        }

        let selection = select([first, second, third], &surface, &DeviceRequirements::default())
            .unwrap();
        assert_eq!(selection.physical_device.name, "gpu2");
        assert_eq!(selection.queue_families.graphics, Some(0));
        assert_eq!(selection.queue_families.present, Some(0));
    }

    #[test]
    fn empty_candidate_list_fails() {
        let surface = FakeSurface::default();
        assert!(matches!(
            select(Vec::new(), &surface, &DeviceRequirements::default()),
            Err(Error::NoSuitableDevice { candidates: 0 })
        ));
    }

    #[test]
    fn missing_extension_disqualifies() {
        let mut surface = FakeSurface::default();
        let mut physical_device = device(1, &[vk::QueueFlags::GRAPHICS]);
        usable(&mut surface, &physical_device);
        physical_device.extensions.clear();

        assert!(matches!(
            select([physical_device], &surface, &DeviceRequirements::default()),
            Err(Error::NoSuitableDevice { candidates: 1 })
        ));
    }

    #[test]
    fn extension_check_ignores_order() {
        let mut physical_device = device(1, &[]);
        physical_device.extensions = vec![
            CString::new("VK_KHR_maintenance1").unwrap(),
            khr::Swapchain::name().to_owned(),
        ];
        let required = [
            khr::Swapchain::name().to_owned(),
            CString::new("VK_KHR_maintenance1").unwrap(),
        ];
        assert!(physical_device.supports_extensions(&required));
        assert!(!physical_device.supports_extensions(&[CString::new("VK_KHR_swap").unwrap()]));
    }

    #[test]
    fn empty_present_modes_disqualify() {
        let mut surface = FakeSurface::default();
        let physical_device = device(1, &[vk::QueueFlags::GRAPHICS]);
        usable(&mut surface, &physical_device);
        surface
            .support
            .get_mut(&1)
            .unwrap()
            .present_modes
            .clear();

        assert!(!is_suitable(&physical_device, &surface, &DeviceRequirements::default()).unwrap());
    }

    #[test]
    fn no_present_queue_disqualifies() {
        let mut surface = FakeSurface::default();
        let physical_device = device(1, &[vk::QueueFlags::GRAPHICS]);
        surface.support.insert(1, adequate_support());

        assert!(!is_suitable(&physical_device, &surface, &DeviceRequirements::default()).unwrap());
    }

    #[test]
    fn predicate_is_applied() {
        let mut surface = FakeSurface::default();
        let integrated = device(1, &[vk::QueueFlags::GRAPHICS]);
        let mut discrete = device(2, &[vk::QueueFlags::GRAPHICS]);
        discrete.properties.device_type = vk::PhysicalDeviceType::DISCRETE_GPU;
        discrete.features.geometry_shader = vk::TRUE;
        usable(&mut surface, &integrated);
        usable(&mut surface, &discrete);

        let selection = select(
            [integrated.clone(), discrete.clone()],
            &surface,
            &DeviceRequirements::discrete_with_geometry_shader(),
        )
        .unwrap();
        assert_eq!(selection.physical_device.name, "gpu2");

        let selection =
            select([integrated, discrete], &surface, &DeviceRequirements::default()).unwrap();
        assert_eq!(selection.physical_device.name, "gpu1");
    }

    #[test]
    fn query_failure_propagates() {
        let mut surface = FakeSurface::default();
        let physical_device = device(1, &[vk::QueueFlags::GRAPHICS]);
        usable(&mut surface, &physical_device);
        surface.failing = Some(1);

        assert!(matches!(
            select([physical_device], &surface, &DeviceRequirements::default()),
            Err(Error::Query { .. })
        ));
    }
}
