use std::{ffi::CStr, sync::Arc};

use ash::{extensions::khr, vk};
use log::debug;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};

use crate::{
    error::{Error, QueryExt, Result},
    instance::Instance,
    physical_device::PhysicalDevice,
};

/// Read-only surface queries the selection and negotiation logic depends on.
pub trait SurfaceQuery {
    fn supports_present(&self, physical_device: &PhysicalDevice, queue_family_index: u32)
        -> Result<bool>;
    fn capabilities(&self, physical_device: &PhysicalDevice) -> Result<vk::SurfaceCapabilitiesKHR>;
    fn formats(&self, physical_device: &PhysicalDevice) -> Result<Vec<vk::SurfaceFormatKHR>>;
    fn present_modes(&self, physical_device: &PhysicalDevice) -> Result<Vec<vk::PresentModeKHR>>;
}

/// Everything a surface reports about one device. Empty lists are a valid
/// answer and mean the device cannot drive a swapchain on this surface.
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn query(surface: &impl SurfaceQuery, physical_device: &PhysicalDevice) -> Result<Self> {
        let capabilities = surface.capabilities(physical_device)?;
        let formats = surface.formats(physical_device)?;
        let present_modes = surface.present_modes(physical_device)?;
        debug!(
            "{}: {} format(s), {} present mode(s), image count {}..{}",
            physical_device.name,
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            match capabilities.max_image_count {
                0 => "unbounded".to_owned(),
                max => max.to_string(),
            }
        );
        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

pub struct Surface {
    pub handle: vk::SurfaceKHR,
    pub functions: khr::Surface,
    pub instance: Arc<Instance>,
}

impl Surface {
    pub fn new(
        instance: &Arc<Instance>,
        window: &(impl HasWindowHandle + HasDisplayHandle),
    ) -> Result<Self> {
        let entry = &instance.entry;
        let handle = match (window.display_handle()?.as_raw(), window.window_handle()?.as_raw()) {
            (RawDisplayHandle::Windows(_), RawWindowHandle::Win32(window_handle)) => {
                let hinstance = window_handle.hinstance.map_or(0, |hinstance| hinstance.get());
                let create_info = vk::Win32SurfaceCreateInfoKHR::builder()
                    .hinstance(hinstance as vk::HINSTANCE)
                    .hwnd(window_handle.hwnd.get() as vk::HWND);
                unsafe {
                    khr::Win32Surface::new(entry, &instance.handle)
                        .create_win32_surface(&create_info, None)
                        .query("vkCreateWin32SurfaceKHR")?
                }
            }
            (RawDisplayHandle::Xlib(display_handle), RawWindowHandle::Xlib(window_handle)) => {
                let display = display_handle
                    .display
                    .ok_or(Error::UnsupportedWindowHandle("Xlib window without a display"))?;
                let create_info = vk::XlibSurfaceCreateInfoKHR::builder()
                    .dpy(display.as_ptr().cast())
                    .window(window_handle.window);
                unsafe {
                    khr::XlibSurface::new(entry, &instance.handle)
                        .create_xlib_surface(&create_info, None)
                        .query("vkCreateXlibSurfaceKHR")?
                }
            }
            (RawDisplayHandle::Wayland(display_handle), RawWindowHandle::Wayland(window_handle)) => {
                let create_info = vk::WaylandSurfaceCreateInfoKHR::builder()
                    .display(display_handle.display.as_ptr())
                    .surface(window_handle.surface.as_ptr());
                unsafe {
                    khr::WaylandSurface::new(entry, &instance.handle)
                        .create_wayland_surface(&create_info, None)
                        .query("vkCreateWaylandSurfaceKHR")?
                }
            }
            _ => return Err(Error::UnsupportedWindowHandle("no Vulkan surface for this platform")),
        };
        let functions = khr::Surface::new(entry, &instance.handle);
        Ok(Self {
            handle,
            functions,
            instance: instance.clone(),
        })
    }
}

impl SurfaceQuery for Surface {
    fn supports_present(&self, physical_device: &PhysicalDevice, queue_family_index: u32) -> Result<bool> {
        unsafe {
            self.functions
                .get_physical_device_surface_support(
                    physical_device.handle,
                    queue_family_index,
                    self.handle,
                )
                .query("vkGetPhysicalDeviceSurfaceSupportKHR")
        }
    }

    fn capabilities(&self, physical_device: &PhysicalDevice) -> Result<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.functions
                .get_physical_device_surface_capabilities(physical_device.handle, self.handle)
                .query("vkGetPhysicalDeviceSurfaceCapabilitiesKHR")
        }
    }

    fn formats(&self, physical_device: &PhysicalDevice) -> Result<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.functions
                .get_physical_device_surface_formats(physical_device.handle, self.handle)
                .query("vkGetPhysicalDeviceSurfaceFormatsKHR")
        }
    }

    fn present_modes(&self, physical_device: &PhysicalDevice) -> Result<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.functions
                .get_physical_device_surface_present_modes(physical_device.handle, self.handle)
                .query("vkGetPhysicalDeviceSurfacePresentModesKHR")
        }
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        unsafe { self.functions.destroy_surface(self.handle, None) };
    }
}

/// Instance extensions needed to create a surface for `display`.
pub fn required_extensions(display: RawDisplayHandle) -> Result<[&'static CStr; 2]> {
    let platform = match display {
        RawDisplayHandle::Windows(_) => khr::Win32Surface::name(),
        RawDisplayHandle::Xlib(_) => khr::XlibSurface::name(),
        RawDisplayHandle::Wayland(_) => khr::WaylandSurface::name(),
        _ => return Err(Error::UnsupportedWindowHandle("no Vulkan surface for this platform")),
    };
    Ok([khr::Surface::name(), platform])
}
