use std::{ffi::CString, io, path::Path};

use ash::{extensions::khr, vk};
use serde::Deserialize;

use crate::physical_device::{DevicePredicate, PhysicalDevice};

/// What the negotiator aims for when the surface offers a choice.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainPreferences {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    /// Used when `present_mode` is not offered. FIFO is the only mode every
    /// conformant implementation must support.
    pub fallback_present_mode: vk::PresentModeKHR,
    /// Used when the surface follows the window but no framebuffer size is known.
    pub default_extent: vk::Extent2D,
}

impl Default for SwapchainPreferences {
    fn default() -> Self {
        Self {
            surface_format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            present_mode: vk::PresentModeKHR::MAILBOX,
            fallback_present_mode: vk::PresentModeKHR::FIFO,
            default_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceRequirements {
    pub extensions: Vec<CString>,
    /// Extra gate applied after the extension check and before any surface query.
    pub predicate: Option<DevicePredicate>,
}

impl Default for DeviceRequirements {
    fn default() -> Self {
        Self {
            extensions: vec![khr::Swapchain::name().to_owned()],
            predicate: None,
        }
    }
}

impl DeviceRequirements {
    pub fn discrete_with_geometry_shader() -> Self {
        Self {
            predicate: Some(is_discrete_with_geometry_shader),
            ..Self::default()
        }
    }
}

fn is_discrete_with_geometry_shader(physical_device: &PhysicalDevice) -> bool {
    physical_device.properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
        && physical_device.features.geometry_shader == vk::TRUE
}

#[derive(Debug, Clone)]
pub struct InstanceConfig {
    pub application_name: String,
    pub validation: bool,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            application_name: "Vulkan Learn".to_owned(),
            validation: cfg!(debug_assertions),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentMode {
    Immediate,
    Mailbox,
    Fifo,
    FifoRelaxed,
}

impl From<PresentMode> for vk::PresentModeKHR {
    fn from(mode: PresentMode) -> Self {
        match mode {
            PresentMode::Immediate => vk::PresentModeKHR::IMMEDIATE,
            PresentMode::Mailbox => vk::PresentModeKHR::MAILBOX,
            PresentMode::Fifo => vk::PresentModeKHR::FIFO,
            PresentMode::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Learn".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

/// Settings read by the demo from a TOML file. Every field is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub validation: bool,
    pub present_mode: PresentMode,
    pub require_discrete_gpu: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            validation: cfg!(debug_assertions),
            present_mode: PresentMode::Mailbox,
            require_discrete_gpu: false,
        }
    }
}

impl AppConfig {
    /// A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => Self::parse(&contents),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!(
                    "{} not found, using default configuration",
                    path.as_ref().display()
                );
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn instance_config(&self) -> InstanceConfig {
        InstanceConfig {
            application_name: self.window.title.clone(),
            validation: self.validation,
        }
    }

    pub fn device_requirements(&self) -> DeviceRequirements {
        if self.require_discrete_gpu {
            DeviceRequirements::discrete_with_geometry_shader()
        } else {
            DeviceRequirements::default()
        }
    }

    pub fn swapchain_preferences(&self) -> SwapchainPreferences {
        SwapchainPreferences {
            present_mode: self.present_mode.into(),
            default_extent: vk::Extent2D {
                width: self.window.width,
                height: self.window.height,
            },
            ..SwapchainPreferences::default()
        }
    }
}
