// SPDX-License-Identifier: CEPL-1.0
use std::sync::Arc;

use ash::vk;
use lumen_render::RenderSize;
use tracing::info;

use crate::context::GraphicsContext;
use crate::error::{Error, Result};
use crate::swapchain::{build_swapchain, SwapchainState};
use crate::window::WindowTarget;

/// The negotiated main family must present to every surface, not only the
/// one used during negotiation.
fn require_presentation(query: std::result::Result<bool, vk::Result>, family: u32) -> Result<()> {
    match query {
        Ok(true) => Ok(()),
        Ok(false) => Err(Error::SurfaceCreationFailed(format!(
            "queue family {family} cannot present to this surface"
        ))),
        Err(e) => Err(Error::SurfaceCreationFailed(format!(
            "presentation support query: {e}"
        ))),
    }
}

/// A window's surface and the swapchain presenting to it.
pub struct PresentationSurface {
    context: Arc<GraphicsContext>,
    surface: vk::SurfaceKHR,
    swapchain: Option<SwapchainState>,
}

impl PresentationSurface {
    pub fn new(context: Arc<GraphicsContext>, target: WindowTarget<'_>) -> Result<Self> {
        let surface = unsafe { target.create_surface(context.entry(), context.instance()) }?;

        let family = context.main_queue_family();
        let query = unsafe {
            context.surface_fns().get_physical_device_surface_support(
                context.physical_device(),
                family,
                surface,
            )
        };
        if let Err(e) = require_presentation(query, family) {
            unsafe { context.surface_fns().destroy_surface(surface, None) };
            return Err(e);
        }

        Ok(Self {
            context,
            surface,
            swapchain: None,
        })
    }

    pub fn context(&self) -> &Arc<GraphicsContext> {
        &self.context
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn swapchain(&self) -> Option<&SwapchainState> {
        self.swapchain.as_ref()
    }

    /// Builds the first swapchain on demand; a no-op once one exists.
    pub fn ensure_swapchain(
        &mut self,
        framebuffer_size: impl FnOnce() -> RenderSize,
    ) -> Result<&SwapchainState> {
        if self.swapchain.is_none() {
            self.rebuild_swapchain(framebuffer_size)?;
        }
        self.swapchain
            .as_ref()
            .ok_or_else(|| Error::SwapchainCreationFailed("no swapchain".to_owned()))
    }

    /// Replaces the current swapchain. On failure none is left; the next call
    /// starts from scratch.
    pub fn rebuild_swapchain(
        &mut self,
        framebuffer_size: impl FnOnce() -> RenderSize,
    ) -> Result<&SwapchainState> {
        let previous = self.swapchain.take();
        let rebuilt = previous.is_some();
        let state = build_swapchain(&self.context, self.surface, framebuffer_size, previous)?;
        if rebuilt {
            info!(
                "vk: swapchain rebuilt ({}x{})",
                state.extent.width, state.extent.height
            );
        }
        Ok(self.swapchain.insert(state))
    }
}

// STRICT TEARDOWN ORDER: drain, views + swapchain, surface. The context (and
// with it device and instance) goes when the last Arc drops, after this.
impl Drop for PresentationSurface {
    fn drop(&mut self) {
        unsafe {
            self.context.wait_idle().ok();
            if let Some(state) = self.swapchain.take() {
                state.destroy(&self.context);
            }
            self.context.surface_fns().destroy_surface(self.surface, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_the_main_family_cannot_present_to_is_rejected() {
        assert!(require_presentation(Ok(true), 0).is_ok());

        let err = require_presentation(Ok(false), 2).unwrap_err();
        assert!(matches!(err, Error::SurfaceCreationFailed(ref m) if m.contains("family 2")));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn failed_support_query_is_not_read_as_unsupported() {
        let err = require_presentation(Err(vk::Result::ERROR_SURFACE_LOST_KHR), 0).unwrap_err();
        assert!(matches!(err, Error::SurfaceCreationFailed(ref m) if m.contains("query")));
    }
}
