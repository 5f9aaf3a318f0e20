use std::{ffi::CString, sync::Arc};

use ash::vk;
use log::info;

use crate::{
    error::{Error, QueryExt, Result},
    instance::Instance,
    physical_device::PhysicalDevice,
    queue_family::QueueFamilyIndices,
};

static QUEUE_PRIORITIES: [f32; 1] = [1.0];

#[derive(Debug, Clone, Copy)]
pub struct Queue {
    pub handle: vk::Queue,
    pub family_index: u32,
}

/// The graphics and present queues. Both refer to the same queue when the
/// families coincide.
#[derive(Debug, Clone, Copy)]
pub struct QueuePair {
    pub graphics: Queue,
    pub present: Queue,
}

impl QueuePair {
    pub fn is_shared(&self) -> bool {
        self.graphics.family_index == self.present.family_index
    }
}

pub struct Device {
    pub handle: ash::Device,
    pub instance: Arc<Instance>,
    pub physical_device: PhysicalDevice,
    pub queue_families: QueueFamilyIndices,
    pub queues: QueuePair,
}

impl Device {
    pub fn new(
        instance: Arc<Instance>,
        physical_device: PhysicalDevice,
        queue_families: QueueFamilyIndices,
        extensions: &[CString],
    ) -> Result<Self> {
        let (graphics_family, present_family) =
            queue_families
                .pair()
                .ok_or_else(|| Error::IncompleteQueueFamilies {
                    device: physical_device.name.clone(),
                })?;
        let queue_create_infos = queue_create_infos(&queue_families);
        let enabled_extension_names: Vec<_> =
            extensions.iter().map(|name| name.as_ptr()).collect();
        let handle = unsafe {
            instance
                .handle
                .create_device(
                    physical_device.handle,
                    &vk::DeviceCreateInfo::builder()
                        .queue_create_infos(&queue_create_infos)
                        .enabled_extension_names(&enabled_extension_names),
                    None,
                )
                .query("vkCreateDevice")?
        };
        let queues = QueuePair {
            graphics: Queue {
                handle: unsafe { handle.get_device_queue(graphics_family, 0) },
                family_index: graphics_family,
            },
            present: Queue {
                handle: unsafe { handle.get_device_queue(present_family, 0) },
                family_index: present_family,
            },
        };
        info!(
            "Created device on {} (graphics family {graphics_family}, present family {present_family})",
            physical_device.name
        );
        Ok(Self {
            handle,
            instance,
            physical_device,
            queue_families,
            queues,
        })
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe { self.handle.destroy_device(None) };
    }
}

/// One queue, priority 1.0, per distinct family.
fn queue_create_infos(queue_families: &QueueFamilyIndices) -> Vec<vk::DeviceQueueCreateInfo> {
    queue_families
        .unique()
        .into_iter()
        .map(|index| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(index)
                .queue_priorities(&QUEUE_PRIORITIES)
                .build()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_queue_for_a_shared_family() {
        let infos = queue_create_infos(&QueueFamilyIndices {
            graphics: Some(2),
            present: Some(2),
        });
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_family_index, 2);
        assert_eq!(infos[0].queue_count, 1);
    }

    #[test]
    fn one_queue_per_distinct_family() {
        let infos = queue_create_infos(&QueueFamilyIndices {
            graphics: Some(1),
            present: Some(3),
        });
        let families: Vec<u32> = infos.iter().map(|info| info.queue_family_index).collect();
        assert_eq!(families, vec![1, 3]);
        for info in &infos {
            assert_eq!(info.queue_count, 1);
            assert_eq!(unsafe { *info.p_queue_priorities }, 1.0);
        }
    }

    #[test]
    fn queue_pair_aliasing() {
        let queue = |family_index| Queue {
            handle: vk::Queue::null(),
            family_index,
        };
        let pair = QueuePair {
            graphics: queue(0),
            present: queue(0),
        };
        assert!(pair.is_shared());
        let pair = QueuePair {
            graphics: queue(0),
            present: queue(1),
        };
        assert!(!pair.is_shared());
    }
}
