//! Picks a presentation-capable Vulkan device and negotiates a swapchain for
//! a window surface.
//!
//! The sequence is: enumerate [`PhysicalDevice`]s from an [`Instance`], pick
//! one with [`physical_device::select`], create the [`Device`] with the
//! resolved [`QueueFamilyIndices`], then build a [`Swapchain`] whose
//! [`SwapchainConfig`] comes out of [`SwapchainConfig::negotiate`]. Every
//! decision reads the surface through [`SurfaceQuery`].

pub mod config;
pub mod device;
pub mod error;
pub mod instance;
pub mod physical_device;
pub mod queue_family;
pub mod surface;
pub mod swapchain;

pub use config::{AppConfig, DeviceRequirements, InstanceConfig, SwapchainPreferences};
pub use device::{Device, Queue, QueuePair};
pub use error::{Error, Result};
pub use instance::Instance;
pub use physical_device::{PhysicalDevice, QueueFamily, Selection};
pub use queue_family::QueueFamilyIndices;
pub use surface::{Surface, SurfaceQuery, SurfaceSupport};
pub use swapchain::{Swapchain, SwapchainConfig};
