// SPDX-License-Identifier: CEPL-1.0
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use lumen_core::Version;
use tracing::info;

use crate::device::{create_logical_device, select_physical_device, DEVICE_EXTENSIONS};
use crate::error::{Error, Result};
use crate::features::FeatureRequest;
use crate::instance::{create_instance, DebugMessenger};
use crate::queues::{try_select_queue_families, QueueFamilies};
use crate::window::WindowSystem;

#[derive(Debug, Clone)]
pub struct ContextSettings {
    pub app_name: String,
    pub app_version: Version,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            app_name: "No Name".to_owned(),
            app_version: Version::new(1, 0, 0),
        }
    }
}

/// Instance, device and queues. Shared read-only (usually behind an `Arc`) by
/// every surface that presents with it; must outlive all of them.
pub struct GraphicsContext {
    entry: Entry,
    instance: Instance,
    debug: Option<DebugMessenger>,
    surface_fns: surface::Instance,

    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    swapchain_fns: swapchain::Device,

    families: QueueFamilies,
    main_queue: vk::Queue,
    transfer_queue: vk::Queue,
}

// Tears the instance down if a later negotiation step fails.
struct InstanceGuard {
    instance: Instance,
    debug: Option<DebugMessenger>,
    armed: bool,
}

impl InstanceGuard {
    fn disarm(mut self) -> (Instance, Option<DebugMessenger>) {
        self.armed = false;
        (self.instance.clone(), self.debug.take())
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        unsafe {
            if let Some(debug) = self.debug.take() {
                debug.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}

impl GraphicsContext {
    // STRICT ORDER:
    // 1) instance (window system's surface extensions are mandatory)
    // 2) physical device
    // 3) queue families (needs presentation support against that device)
    // 4) logical device + queues (queue list derives from 3)
    pub fn new(settings: &ContextSettings, window_system: &dyn WindowSystem) -> Result<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| Error::InstanceCreationFailed(format!("loading Vulkan: {e}")))?;

        let required = window_system.required_instance_extensions()?;
        let created =
            unsafe { create_instance(&entry, settings, &required, cfg!(debug_assertions)) }?;
        let debug = if created.debug_utils {
            unsafe { DebugMessenger::new(&entry, &created.instance) }
        } else {
            None
        };
        let guard = InstanceGuard {
            instance: created.instance,
            debug,
            armed: true,
        };
        let instance = &guard.instance;

        let physical_device = unsafe { select_physical_device(instance) }?;

        let family_props =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let families = try_select_queue_families(&family_props, |family| {
            window_system.supports_presentation(&entry, instance, physical_device, family)
        })?;

        let device = unsafe {
            create_logical_device(
                instance,
                physical_device,
                families,
                DEVICE_EXTENSIONS,
                &FeatureRequest::required(),
            )
        }?;

        let main_queue = unsafe { device.get_device_queue(families.main, 0) };
        let transfer_queue = unsafe { device.get_device_queue(families.transfer, 0) };

        let surface_fns = surface::Instance::new(&entry, instance);
        let swapchain_fns = swapchain::Device::new(instance, &device);
        let (instance, debug) = guard.disarm();

        info!(
            "vk: context ready for \"{}\" {}",
            settings.app_name, settings.app_version
        );

        Ok(Self {
            entry,
            instance,
            debug,
            surface_fns,
            physical_device,
            device,
            swapchain_fns,
            families,
            main_queue,
            transfer_queue,
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn surface_fns(&self) -> &surface::Instance {
        &self.surface_fns
    }

    pub fn swapchain_fns(&self) -> &swapchain::Device {
        &self.swapchain_fns
    }

    pub fn queue_families(&self) -> QueueFamilies {
        self.families
    }

    pub fn main_queue_family(&self) -> u32 {
        self.families.main
    }

    pub fn transfer_queue_family(&self) -> u32 {
        self.families.transfer
    }

    pub fn main_queue(&self) -> vk::Queue {
        self.main_queue
    }

    pub fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    /// Blocks until the device has drained all submitted work. No timeout.
    pub fn wait_idle(&self) -> std::result::Result<(), vk::Result> {
        unsafe { self.device.device_wait_idle() }
    }
}

// STRICT TEARDOWN ORDER: device, then debug messenger, then instance.
// Every PresentationSurface holding this context is gone by now.
impl Drop for GraphicsContext {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_device(None);
            if let Some(debug) = self.debug.take() {
                debug.destroy();
            }
            self.instance.destroy_instance(None);
        }
    }
}
