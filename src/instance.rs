use std::ffi::{c_char, c_void, CStr, CString};

use ash::{extensions::ext, vk};
use log::{debug, error, info, trace, warn};
use raw_window_handle::RawDisplayHandle;

use crate::{
    config::InstanceConfig,
    error::{Error, QueryExt, Result},
    physical_device::{PhysicalDevice, QueueFamily},
    surface,
};

const VALIDATION_LAYER: &CStr =
    unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };

struct DebugMessenger {
    functions: ext::DebugUtils,
    handle: vk::DebugUtilsMessengerEXT,
}

pub struct Instance {
    pub entry: ash::Entry,
    pub handle: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
}

impl Instance {
    pub fn new(display: RawDisplayHandle, config: &InstanceConfig) -> Result<Self> {
        let entry = unsafe { ash::Entry::load()? };

        let mut enabled_extension_names: Vec<*const c_char> = surface::required_extensions(display)?
            .iter()
            .map(|name| name.as_ptr())
            .collect();
        let mut enabled_layer_names = Vec::new();
        if config.validation {
            let layers = entry
                .enumerate_instance_layer_properties()
                .query("vkEnumerateInstanceLayerProperties")?;
            if !has_layer(&layers, VALIDATION_LAYER) {
                return Err(Error::MissingValidationLayer {
                    layer: VALIDATION_LAYER.to_string_lossy().into_owned(),
                });
            }
            enabled_layer_names.push(VALIDATION_LAYER.as_ptr());
            enabled_extension_names.push(ext::DebugUtils::name().as_ptr());
        }

        let application_name = CString::new(config.application_name.as_str())?;
        let application_version = vk::make_api_version(0, 1, 0, 0);
        let engine_name = CString::new("vulkan-present")?;
        let engine_version = vk::make_api_version(0, 1, 0, 0);

        let mut debug_info = debug_messenger_info();
        let handle = {
            let application_info = vk::ApplicationInfo::builder()
                .application_name(&application_name)
                .application_version(application_version)
                .engine_name(&engine_name)
                .engine_version(engine_version)
                .api_version(vk::API_VERSION_1_0);
            let mut create_info = vk::InstanceCreateInfo::builder()
                .application_info(&application_info)
                .enabled_layer_names(&enabled_layer_names)
                .enabled_extension_names(&enabled_extension_names);
            if config.validation {
                create_info = create_info.push_next(&mut debug_info);
            }
            unsafe {
                entry
                    .create_instance(&create_info, None)
                    .query("vkCreateInstance")?
            }
        };

        let debug_messenger = if config.validation {
            let functions = ext::DebugUtils::new(&entry, &handle);
            let messenger = unsafe {
                functions.create_debug_utils_messenger(&debug_messenger_info(), None)
            };
            match messenger {
                Ok(handle) => Some(DebugMessenger { functions, handle }),
                Err(result) => {
                    unsafe { handle.destroy_instance(None) };
                    return Err(Error::Query {
                        what: "vkCreateDebugUtilsMessengerEXT",
                        result,
                    });
                }
            }
        } else {
            None
        };

        info!(
            "Created Vulkan instance (validation {})",
            if config.validation { "on" } else { "off" }
        );
        Ok(Self {
            entry,
            handle,
            debug_messenger,
        })
    }

    pub fn physical_devices(&self) -> Result<Vec<PhysicalDevice>> {
        let physical_devices = unsafe {
            self.handle
                .enumerate_physical_devices()
                .query("vkEnumeratePhysicalDevices")?
        };
        physical_devices
            .iter()
            .map(|&physical_device| self.describe(physical_device))
            .collect()
    }

    fn describe(&self, physical_device: vk::PhysicalDevice) -> Result<PhysicalDevice> {
        let properties = unsafe { self.handle.get_physical_device_properties(physical_device) };
        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();
        let features = unsafe { self.handle.get_physical_device_features(physical_device) };
        let queue_families = unsafe {
            self.handle
                .get_physical_device_queue_family_properties(physical_device)
        }
        .into_iter()
        .enumerate()
        .map(|(index, properties)| QueueFamily {
            index: index as u32,
            properties,
        })
        .collect();
        let extensions = unsafe {
            self.handle
                .enumerate_device_extension_properties(physical_device)
                .query("vkEnumerateDeviceExtensionProperties")?
        }
        .iter()
        .map(|extension| unsafe { CStr::from_ptr(extension.extension_name.as_ptr()) }.to_owned())
        .collect();
        debug!("Found {name} ({:?})", properties.device_type);
        Ok(PhysicalDevice {
            handle: physical_device,
            name,
            properties,
            features,
            queue_families,
            extensions,
        })
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        unsafe {
            if let Some(messenger) = self.debug_messenger.take() {
                messenger
                    .functions
                    .destroy_debug_utils_messenger(messenger.handle, None);
            }
            self.handle.destroy_instance(None);
        }
    }
}

fn has_layer(layers: &[vk::LayerProperties], name: &CStr) -> bool {
    layers
        .iter()
        .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == name)
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .build()
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[{message_type:?}] {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[{message_type:?}] {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        info!("[{message_type:?}] {message}");
    } else {
        trace!("[{message_type:?}] {message}");
    }
    vk::FALSE
}
