// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;

use ash::khr::surface;
use ash::{vk, Entry, Instance};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};

use crate::error::{Error, Result};

/// What negotiation needs from the windowing layer.
pub trait WindowSystem {
    /// Platform surface extensions; instance creation fails without them.
    fn required_instance_extensions(&self) -> Result<Vec<&'static CStr>>;

    fn supports_presentation(
        &self,
        entry: &Entry,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool>;
}

/// A window/display pair from any `raw-window-handle` windowing library.
#[derive(Clone, Copy)]
pub struct WindowTarget<'w> {
    pub window: &'w dyn HasWindowHandle,
    pub display: &'w dyn HasDisplayHandle,
}

impl<'w> WindowTarget<'w> {
    pub fn new(window: &'w dyn HasWindowHandle, display: &'w dyn HasDisplayHandle) -> Self {
        Self { window, display }
    }

    pub(crate) fn raw_display(&self) -> std::result::Result<RawDisplayHandle, String> {
        self.display
            .display_handle()
            .map(|h| h.as_raw())
            .map_err(|e| e.to_string())
    }

    pub(crate) fn raw_window(&self) -> std::result::Result<RawWindowHandle, String> {
        self.window
            .window_handle()
            .map(|h| h.as_raw())
            .map_err(|e| e.to_string())
    }

    /// # Safety
    /// `instance` must have been created from `entry` with the extensions
    /// returned by [`WindowSystem::required_instance_extensions`].
    pub(crate) unsafe fn create_surface(
        &self,
        entry: &Entry,
        instance: &Instance,
    ) -> Result<vk::SurfaceKHR> {
        let dh = self.raw_display().map_err(Error::SurfaceCreationFailed)?;
        let wh = self.raw_window().map_err(Error::SurfaceCreationFailed)?;
        unsafe { ash_window::create_surface(entry, instance, dh, wh, None) }
            .map_err(|e| Error::SurfaceCreationFailed(e.to_string()))
    }
}

impl WindowSystem for WindowTarget<'_> {
    fn required_instance_extensions(&self) -> Result<Vec<&'static CStr>> {
        let dh = self.raw_display().map_err(Error::InstanceCreationFailed)?;
        let names = ash_window::enumerate_required_extensions(dh)
            .map_err(|e| Error::InstanceCreationFailed(format!("surface extensions: {e}")))?;
        // ash_window hands out pointers to its static extension names.
        Ok(names
            .iter()
            .map(|&p| unsafe { CStr::from_ptr(p) })
            .collect())
    }

    // Surface-less presentation queries are per-platform, so a throwaway
    // surface for this window answers the question instead.
    fn supports_presentation(
        &self,
        entry: &Entry,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool> {
        let probe = unsafe { self.create_surface(entry, instance) }?;
        let surface_fns = surface::Instance::new(entry, instance);
        let supported = unsafe {
            surface_fns.get_physical_device_surface_support(physical_device, queue_family, probe)
        };
        unsafe { surface_fns.destroy_surface(probe, None) };
        supported.map_err(|e| Error::SurfaceCreationFailed(format!("presentation probe: {e}")))
    }
}
