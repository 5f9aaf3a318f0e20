use std::sync::Arc;

use ash::vk;
use log::{error, info};
use raw_window_handle::HasDisplayHandle;
use vulkan_present::{
    physical_device, AppConfig, Device, Instance, Surface, Swapchain,
};
use winit::{
    dpi::PhysicalSize,
    event::{Event, KeyEvent, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowBuilder},
};

fn framebuffer_size(window: &Window) -> vk::Extent2D {
    let size = window.inner_size();
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/present.toml".to_owned());
    let config = AppConfig::load(config_path)?;

    let event_loop = EventLoop::new()?;
    let window = WindowBuilder::new()
        .with_title(&config.window.title)
        .with_inner_size(PhysicalSize::new(config.window.width, config.window.height))
        .build(&event_loop)?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let instance = Arc::new(Instance::new(
        window.display_handle()?.as_raw(),
        &config.instance_config(),
    )?);
    let surface = Arc::new(Surface::new(&instance, &window)?);
    let requirements = config.device_requirements();
    let selection = physical_device::select(instance.physical_devices()?, &*surface, &requirements)?;
    let device = Arc::new(Device::new(
        instance.clone(),
        selection.physical_device,
        selection.queue_families,
        &requirements.extensions,
    )?);
    let mut swapchain = Swapchain::new(
        device,
        surface,
        config.swapchain_preferences(),
        Some(framebuffer_size(&window)),
    )?;
    info!("{} swapchain images", swapchain.images.len());

    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent {
            event: WindowEvent::CloseRequested,
            ..
        }
        | Event::WindowEvent {
            event:
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(KeyCode::Escape),
                            ..
                        },
                    ..
                },
            ..
        } => {
            elwt.exit();
        }
        Event::WindowEvent {
            event: WindowEvent::Resized(size),
            ..
        } if size.width > 0 && size.height > 0 => {
            if let Err(err) = swapchain.recreate(Some(framebuffer_size(&window))) {
                error!("Failed to recreate swapchain: {err}");
                elwt.exit();
            }
        }
        _ => (),
    })?;

    Ok(())
}
