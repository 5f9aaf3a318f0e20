use std::sync::Arc;

use ash::{extensions::khr, vk};
use log::{info, warn};

use crate::{
    config::SwapchainPreferences,
    device::Device,
    error::{Error, QueryExt, Result},
    physical_device::PhysicalDevice,
    queue_family::QueueFamilyIndices,
    surface::{Surface, SurfaceSupport},
};

/// Surfaces report this width when the swapchain extent decides the surface size.
pub const EXTENT_FOLLOWS_WINDOW: u32 = u32::MAX;

/// A fully decided swapchain configuration, used verbatim at creation.
#[derive(Debug, Clone)]
pub struct SwapchainConfig {
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub sharing_mode: vk::SharingMode,
    /// Empty unless `sharing_mode` is `CONCURRENT`.
    pub queue_family_indices: Vec<u32>,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainConfig {
    pub fn negotiate(
        physical_device: &PhysicalDevice,
        support: &SurfaceSupport,
        queue_families: &QueueFamilyIndices,
        framebuffer_size: Option<vk::Extent2D>,
        preferences: &SwapchainPreferences,
    ) -> Result<Self> {
        let (graphics, present) =
            queue_families
                .pair()
                .ok_or_else(|| Error::IncompleteQueueFamilies {
                    device: physical_device.name.clone(),
                })?;
        let surface_format = choose_surface_format(&support.formats, preferences.surface_format)
            .filter(|_| !support.present_modes.is_empty())
            .ok_or_else(|| Error::EmptySwapchainCapability {
                device: physical_device.name.clone(),
                formats: support.formats.len(),
                present_modes: support.present_modes.len(),
            })?;
        let present_mode = choose_present_mode(
            &support.present_modes,
            preferences.present_mode,
            preferences.fallback_present_mode,
        );
        let extent = choose_extent(
            &support.capabilities,
            framebuffer_size.unwrap_or(preferences.default_extent),
        );
        let image_count = choose_image_count(&support.capabilities);
        let (sharing_mode, queue_family_indices) = choose_sharing_mode(graphics, present);

        info!(
            "Swapchain: {:?}/{:?}, {:?}, {}x{}, {} images, {:?}",
            surface_format.format,
            surface_format.color_space,
            present_mode,
            extent.width,
            extent.height,
            image_count,
            sharing_mode
        );
        Ok(Self {
            format: surface_format.format,
            color_space: surface_format.color_space,
            present_mode,
            extent,
            image_count,
            sharing_mode,
            queue_family_indices,
            pre_transform: support.capabilities.current_transform,
        })
    }
}

/// The preferred pair if offered, otherwise the first entry. `None` only for an empty list.
pub fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
    preferred: vk::SurfaceFormatKHR,
) -> Option<vk::SurfaceFormatKHR> {
    let chosen = formats
        .iter()
        .find(|surface_format| {
            surface_format.format == preferred.format
                && surface_format.color_space == preferred.color_space
        })
        .or_else(|| formats.first())
        .copied()?;
    if chosen.format != preferred.format || chosen.color_space != preferred.color_space {
        warn!(
            "{:?}/{:?} not offered, using {:?}/{:?}",
            preferred.format, preferred.color_space, chosen.format, chosen.color_space
        );
    }
    Some(chosen)
}

pub fn choose_present_mode(
    present_modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
    fallback: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if present_modes.contains(&preferred) {
        preferred
    } else {
        warn!("{preferred:?} not offered, falling back to {fallback:?}");
        fallback
    }
}

pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != EXTENT_FOLLOWS_WINDOW {
        return capabilities.current_extent;
    }
    let (min, max) = (capabilities.min_image_extent, capabilities.max_image_extent);
    vk::Extent2D {
        width: framebuffer_size.width.max(min.width).min(max.width),
        height: framebuffer_size.height.max(min.height).min(max.height),
    }
}

/// One image above the minimum, capped by the maximum. A maximum of zero means no cap.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count.saturating_add(1);
    match capabilities.max_image_count {
        0 => desired,
        max => desired.min(max).max(capabilities.min_image_count),
    }
}

/// Images touched by two queue families must be declared concurrent.
pub fn choose_sharing_mode(graphics: u32, present: u32) -> (vk::SharingMode, Vec<u32>) {
    if graphics == present {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    } else {
        (vk::SharingMode::CONCURRENT, vec![graphics, present])
    }
}

pub struct Swapchain {
    pub handle: vk::SwapchainKHR,
    pub functions: khr::Swapchain,
    pub device: Arc<Device>,
    pub surface: Arc<Surface>,
    pub preferences: SwapchainPreferences,
    pub config: SwapchainConfig,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
}

impl Swapchain {
    pub fn new(
        device: Arc<Device>,
        surface: Arc<Surface>,
        preferences: SwapchainPreferences,
        framebuffer_size: Option<vk::Extent2D>,
    ) -> Result<Self> {
        let functions = khr::Swapchain::new(&device.instance.handle, &device.handle);
        let config = negotiate(&device, &surface, &preferences, framebuffer_size)?;
        let (handle, images, image_views) =
            create(&device, &surface, &functions, &config, vk::SwapchainKHR::null())?;
        Ok(Self {
            handle,
            functions,
            device,
            surface,
            preferences,
            config,
            images,
            image_views,
        })
    }

    /// Negotiates from scratch against the current surface state and replaces
    /// the swapchain and its views.
    pub fn recreate(&mut self, framebuffer_size: Option<vk::Extent2D>) -> Result<()> {
        unsafe {
            self.device
                .handle
                .device_wait_idle()
                .query("vkDeviceWaitIdle")?;
        }
        let config = negotiate(&self.device, &self.surface, &self.preferences, framebuffer_size)?;
        let (handle, images, image_views) = create(
            &self.device,
            &self.surface,
            &self.functions,
            &config,
            self.handle,
        )?;
        self.destroy();
        self.handle = handle;
        self.config = config;
        self.images = images;
        self.image_views = image_views;
        Ok(())
    }

    fn destroy(&mut self) {
        unsafe {
            for image_view in self.image_views.drain(..) {
                self.device.handle.destroy_image_view(image_view, None);
            }
            self.functions.destroy_swapchain(self.handle, None);
        }
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            _ = self.device.handle.device_wait_idle();
        }
        self.destroy();
    }
}

fn negotiate(
    device: &Device,
    surface: &Surface,
    preferences: &SwapchainPreferences,
    framebuffer_size: Option<vk::Extent2D>,
) -> Result<SwapchainConfig> {
    let support = SurfaceSupport::query(surface, &device.physical_device)?;
    SwapchainConfig::negotiate(
        &device.physical_device,
        &support,
        &device.queue_families,
        framebuffer_size,
        preferences,
    )
}

fn create(
    device: &Device,
    surface: &Surface,
    functions: &khr::Swapchain,
    config: &SwapchainConfig,
    old_swapchain: vk::SwapchainKHR,
) -> Result<(vk::SwapchainKHR, Vec<vk::Image>, Vec<vk::ImageView>)> {
    let handle = unsafe {
        functions
            .create_swapchain(
                &vk::SwapchainCreateInfoKHR::builder()
                    .surface(surface.handle)
                    .min_image_count(config.image_count)
                    .image_format(config.format)
                    .image_color_space(config.color_space)
                    .image_extent(config.extent)
                    .image_array_layers(1)
                    .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
                    .image_sharing_mode(config.sharing_mode)
                    .queue_family_indices(&config.queue_family_indices)
                    .pre_transform(config.pre_transform)
                    .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                    .present_mode(config.present_mode)
                    .clipped(true)
                    .old_swapchain(old_swapchain),
                None,
            )
            .query("vkCreateSwapchainKHR")?
    };
    let images = match unsafe { functions.get_swapchain_images(handle) } {
        Ok(images) => images,
        Err(result) => {
            unsafe { functions.destroy_swapchain(handle, None) };
            return Err(Error::Query {
                what: "vkGetSwapchainImagesKHR",
                result,
            });
        }
    };
    let mut image_views = Vec::with_capacity(images.len());
    for &image in &images {
        match create_image_view(device, image, config.format) {
            Ok(image_view) => image_views.push(image_view),
            Err(err) => {
                unsafe {
                    for image_view in image_views {
                        device.handle.destroy_image_view(image_view, None);
                    }
                    functions.destroy_swapchain(handle, None);
                }
                return Err(err);
            }
        }
    }
    Ok((handle, images, image_views))
}

fn create_image_view(device: &Device, image: vk::Image, format: vk::Format) -> Result<vk::ImageView> {
    let create_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(
            vk::ComponentMapping::builder()
                .r(vk::ComponentSwizzle::IDENTITY)
                .g(vk::ComponentSwizzle::IDENTITY)
                .b(vk::ComponentSwizzle::IDENTITY)
                .a(vk::ComponentSwizzle::IDENTITY)
                .build(),
        )
        .subresource_range(
            vk::ImageSubresourceRange::builder()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1)
                .build(),
        );
    unsafe {
        device
            .handle
            .create_image_view(&create_info, None)
            .query("vkCreateImageView")
    }
}
