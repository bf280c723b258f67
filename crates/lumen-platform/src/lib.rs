// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use lumen_render::RenderSize;
use serde::Deserialize;
use tracing::info;

pub use winit;

use winit::{
    dpi::PhysicalSize,
    event_loop::ActiveEventLoop,
    window::Window,
};

#[derive(Debug, Clone, Deserialize)]
pub struct WindowSettings {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_title() -> String {
    "Window".to_owned()
}
fn default_width() -> u32 {
    800
}
fn default_height() -> u32 {
    600
}

pub fn create_window(event_loop: &ActiveEventLoop, settings: &WindowSettings) -> Result<Window> {
    let attrs = Window::default_attributes()
        .with_title(settings.title.clone())
        .with_inner_size(PhysicalSize::new(settings.width.max(1), settings.height.max(1)));
    let window = event_loop.create_window(attrs).context("create_window")?;
    info!(
        "window \"{}\" created ({}x{})",
        settings.title, settings.width, settings.height
    );
    Ok(window)
}

/// Framebuffer size in physical pixels; zero-area while minimized.
pub fn framebuffer_size(window: &Window) -> RenderSize {
    let size = window.inner_size();
    RenderSize::new(size.width, size.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_small_window() {
        let s = WindowSettings::default();
        assert_eq!((s.width, s.height), (800, 600));
        assert_eq!(s.title, "Window");
    }
}
