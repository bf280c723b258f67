// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A minimized window reports a zero-area framebuffer.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// What the host loop drives once per window event.
pub trait Backend {
    fn name(&self) -> &'static str;
    fn resize(&mut self, size: RenderSize) -> Result<()>;
    fn redraw(&mut self) -> Result<()>;
    fn set_clear_color(&mut self, _rgba: [f32; 4]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_dimension_is_empty() {
        assert!(RenderSize::new(0, 600).is_empty());
        assert!(RenderSize::new(800, 0).is_empty());
        assert!(!RenderSize::new(1, 1).is_empty());
    }
}
