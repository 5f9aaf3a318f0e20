use ash::vk;

use crate::{error::Result, physical_device::PhysicalDevice, surface::SurfaceQuery};

/// Queue family indices for the two roles a presenting renderer needs.
/// They may name the same family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scans the families in index order, keeping the first match for each role.
    pub fn resolve(physical_device: &PhysicalDevice, surface: &impl SurfaceQuery) -> Result<Self> {
        let mut indices = Self::default();
        for queue_family in &physical_device.queue_families {
            if indices.graphics.is_none()
                && queue_family
                    .properties
                    .queue_flags
                    .contains(vk::QueueFlags::GRAPHICS)
            {
                indices.graphics = Some(queue_family.index);
            }
            if indices.present.is_none()
                && surface.supports_present(physical_device, queue_family.index)?
            {
                indices.present = Some(queue_family.index);
            }
            if indices.is_complete() {
                break;
            }
        }
        Ok(indices)
    }

    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// `(graphics, present)` when both roles are filled.
    pub fn pair(&self) -> Option<(u32, u32)> {
        Some((self.graphics?, self.present?))
    }

    /// One entry per distinct family, graphics first.
    pub fn unique(&self) -> Vec<u32> {
        let mut families: Vec<u32> = self.graphics.into_iter().collect();
        if let Some(present) = self.present {
            if !families.contains(&present) {
                families.push(present);
            }
        }
        families
    }
}

#[cfg(test)]
mod tests {
    use ash::vk::Handle;

    use super::*;
    use crate::physical_device::tests::{device, FakeSurface};

    fn surface_presenting_on(raw: u64, flags: Vec<bool>) -> FakeSurface {
        let mut surface = FakeSurface::default();
        surface.present.insert(raw, flags);
        surface
    }

    #[test]
    fn same_family_for_both_roles() {
        let physical_device = device(1, &[vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE]);
        let surface = surface_presenting_on(1, vec![true]);

        let indices = QueueFamilyIndices::resolve(&physical_device, &surface).unwrap();
        assert_eq!(indices.pair(), Some((0, 0)));
        assert_eq!(indices.unique(), vec![0]);
    }

    #[test]
    fn distinct_families() {
        let physical_device = device(
            1,
            &[
                vk::QueueFlags::TRANSFER,
                vk::QueueFlags::GRAPHICS,
                vk::QueueFlags::COMPUTE,
                vk::QueueFlags::COMPUTE,
            ],
        );
        let surface = surface_presenting_on(1, vec![false, false, false, true]);

        let indices = QueueFamilyIndices::resolve(&physical_device, &surface).unwrap();
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(3));
        assert_eq!(indices.unique(), vec![1, 3]);
    }

    #[test]
    fn first_match_wins() {
        let physical_device = device(
            1,
            &[
                vk::QueueFlags::COMPUTE,
                vk::QueueFlags::GRAPHICS,
                vk::QueueFlags::GRAPHICS,
            ],
        );
        let surface = surface_presenting_on(1, vec![true, true, true]);

        let indices = QueueFamilyIndices::resolve(&physical_device, &surface).unwrap();
        assert_eq!(indices.pair(), Some((1, 0)));
    }

    #[test]
    fn index_zero_is_a_real_index() {
        let indices = QueueFamilyIndices {
            graphics: Some(0),
            present: Some(0),
        };
        assert!(indices.is_complete());
    }

    #[test]
    fn incomplete_without_graphics() {
        let physical_device = device(1, &[vk::QueueFlags::COMPUTE, vk::QueueFlags::TRANSFER]);
        let surface = surface_presenting_on(1, vec![true, true]);

        let indices = QueueFamilyIndices::resolve(&physical_device, &surface).unwrap();
        assert!(!indices.is_complete());
        assert_eq!(indices.graphics, None);
        assert_eq!(indices.present, Some(0));
        assert_eq!(indices.pair(), None);
    }

    #[test]
    fn incomplete_without_present() {
        let physical_device = device(1, &[vk::QueueFlags::GRAPHICS]);
        let surface = surface_presenting_on(1, vec![false]);

        let indices = QueueFamilyIndices::resolve(&physical_device, &surface).unwrap();
        assert!(!indices.is_complete());
        assert_eq!(indices.unique(), vec![0]);
    }

    #[test]
    fn complete_iff_both_roles_exist() {
        let flag_sets = [
            vk::QueueFlags::GRAPHICS,
            vk::QueueFlags::COMPUTE,
            vk::QueueFlags::TRANSFER,
        ];
        for graphics_at in 0..3usize {
            for present_mask in 0..8u32 {
                let flags: Vec<_> = (0..3)
                    .map(|i| if i == graphics_at { flag_sets[0] } else { flag_sets[1 + i % 2] })
                    .collect();
                let present: Vec<bool> = (0..3).map(|i| present_mask & (1 << i) != 0).collect();
                let physical_device = device(7, &flags);
                let surface = surface_presenting_on(physical_device.handle.as_raw(), present);

                let indices = QueueFamilyIndices::resolve(&physical_device, &surface).unwrap();
                assert_eq!(indices.is_complete(), present_mask != 0);
                assert_eq!(indices.graphics, Some(graphics_at as u32));
                if present_mask != 0 {
                    assert_eq!(indices.present, Some(present_mask.trailing_zeros()));
                }
            }
        }
    }
}
