// SPDX-License-Identifier: CEPL-1.0
//! Vulkan device negotiation and swapchain lifecycle.
//!
//! [`GraphicsContext`] owns instance, device and queues. Each window gets a
//! [`PresentationSurface`] that (re)builds its swapchain on demand.
#![deny(unsafe_op_in_unsafe_fn)]

mod context;
mod device;
mod error;
mod features;
mod instance;
mod queues;
mod select;
mod surface;
mod swapchain;
mod window;

use std::sync::Arc;

use lumen_render::{Backend, RenderSize};
use tracing::{info, warn};

pub use context::{ContextSettings, GraphicsContext};
pub use device::DEVICE_EXTENSIONS;
pub use error::{Error, Result};
pub use features::{Feature, FeatureBlock, FeatureBlocks, FeatureRequest, REQUIRED_FEATURES};
pub use instance::vk_version;
pub use queues::{select_queue_families, try_select_queue_families, QueueFamilies, MAIN_QUEUE_FLAGS};
pub use select::{choose_present_mode, choose_surface_format};
pub use surface::PresentationSurface;
pub use swapchain::{
    build_swapchain, extent_from_caps, image_count_from_caps, image_view_info, SwapchainPlan,
    SwapchainState, UNDEFINED_EXTENT,
};
pub use window::{WindowSystem, WindowTarget};

pub use ash;

/// Drives a [`PresentationSurface`] from host window events.
///
/// The swapchain is built lazily on the first redraw. A failed build is
/// logged and retried on the next resize or redraw; negotiation-class errors
/// propagate.
pub struct VkBackend {
    surface: PresentationSurface,
    size: RenderSize,
    paused: bool,
}

impl VkBackend {
    pub fn new(context: Arc<GraphicsContext>, target: WindowTarget<'_>, size: RenderSize) -> Result<Self> {
        Ok(Self {
            surface: PresentationSurface::new(context, target)?,
            size,
            paused: size.is_empty(),
        })
    }

    pub fn surface(&self) -> &PresentationSurface {
        &self.surface
    }

    fn settle(result: Result<()>) -> anyhow::Result<()> {
        match result {
            Err(e) if e.is_recoverable() => {
                warn!("vk: {e}; retrying on next resize/redraw");
                Ok(())
            }
            other => Ok(other?),
        }
    }
}

impl Backend for VkBackend {
    fn name(&self) -> &'static str {
        "vk"
    }

    fn resize(&mut self, size: RenderSize) -> anyhow::Result<()> {
        self.size = size;
        if size.is_empty() {
            if !self.paused {
                info!("vk: resize to {}x{} → paused=true", size.width, size.height);
            }
            self.paused = true;
            return Ok(());
        }
        self.paused = false;

        let size = self.size;
        Self::settle(self.surface.rebuild_swapchain(|| size).map(|_| ()))
    }

    fn redraw(&mut self) -> anyhow::Result<()> {
        if self.paused {
            return Ok(());
        }
        let size = self.size;
        Self::settle(self.surface.ensure_swapchain(|| size).map(|_| ()))
    }
}
