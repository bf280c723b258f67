// SPDX-License-Identifier: CEPL-1.0
//! OpenGL backend: context bring-up through glutin and thin RAII wrappers
//! over glow objects.

mod buffer;
mod info;
mod texture;
mod vertex_array;

use anyhow::{anyhow, Context, Result};
use glow::HasContext as _;
use lumen_render::{Backend, RenderSize};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawWindowHandle};
use tracing::{info, warn};

use glutin::{
    config::{Config, ConfigTemplateBuilder},
    context::{
        ContextApi, ContextAttributesBuilder, GlProfile, NotCurrentContext,
        PossiblyCurrentContext, Version,
    },
    display::{Display, DisplayApiPreference},
    prelude::*,
    surface::{Surface, SurfaceAttributesBuilder, SwapInterval, WindowSurface},
};

use std::{num::NonZeroU32, rc::Rc};

pub use buffer::{check_map, fill_pattern, plan_upload, Buffer, Mapping, Range, Target, Upload, Usage};
pub use info::{supports_spirv_queries, GlInfo};
pub use texture::{Texture, TextureKind};
pub use vertex_array::{packed_layout, vertex_count, Attribute, VertexArray};

pub use glow;

/// Context versions tried in order.
pub const CONTEXT_VERSIONS: [(u8, u8); 2] = [(4, 6), (3, 3)];

fn non_zero(v: u32) -> NonZeroU32 {
    NonZeroU32::new(v).unwrap_or(NonZeroU32::MIN)
}

pub struct GlRenderer {
    context: PossiblyCurrentContext,
    surface: Surface<WindowSurface>,
    gl: Rc<glow::Context>,
    size: RenderSize,
    clear: [f32; 4],
    mesh: Option<(VertexArray, i32)>,
}

impl GlRenderer {
    pub fn new(
        window: &dyn HasWindowHandle,
        display_handle: &dyn HasDisplayHandle,
        size: RenderSize,
    ) -> Result<Self> {
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let dh = display_handle
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();

        let display =
            unsafe { Display::new(dh, DisplayApiPreference::Egl) }.context("Display::new")?;

        let (context, surface, gl) = Self::make_current(&display, wh, size)?;

        let v = gl.version();
        info!("gl: context {}.{} ({})", v.major, v.minor, v.vendor_info);

        Ok(Self {
            context,
            surface,
            gl: Rc::new(gl),
            size,
            clear: [0.02, 0.02, 0.04, 1.0],
            mesh: None,
        })
    }

    fn create_context(
        display: &Display,
        config: &Config,
        window_handle: RawWindowHandle,
    ) -> Result<NotCurrentContext> {
        let mut last_err = None;
        for (major, minor) in CONTEXT_VERSIONS {
            let attrs = ContextAttributesBuilder::new()
                .with_context_api(ContextApi::OpenGl(Some(Version::new(major, minor))))
                .with_profile(GlProfile::Core)
                .build(Some(window_handle));
            match unsafe { display.create_context(config, &attrs) } {
                Ok(ctx) => return Ok(ctx),
                Err(e) => {
                    warn!("gl: {major}.{minor} core context unavailable: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(anyhow!(
            "create_context: {}",
            last_err.map_or_else(|| "no versions tried".to_owned(), |e| e.to_string())
        ))
    }

    fn make_current(
        display: &Display,
        window_handle: RawWindowHandle,
        size: RenderSize,
    ) -> Result<(
        PossiblyCurrentContext,
        Surface<WindowSurface>,
        glow::Context,
    )> {
        let template = ConfigTemplateBuilder::new().build();
        let mut configs = unsafe { display.find_configs(template) }.context("find_configs")?;
        let config = configs.next().ok_or_else(|| anyhow!("no GL configs"))?;

        let sattrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
            window_handle,
            non_zero(size.width),
            non_zero(size.height),
        );
        let surface = unsafe { display.create_window_surface(&config, &sattrs) }
            .context("create_window_surface")?;

        let not_current = Self::create_context(display, &config, window_handle)?;
        let context = not_current.make_current(&surface).context("make_current")?;

        let gl = unsafe {
            glow::Context::from_loader_function_cstr(|s| display.get_proc_address(s) as *const _)
        };

        if let Err(e) = surface.set_swap_interval(&context, SwapInterval::Wait(NonZeroU32::MIN)) {
            warn!("gl: vsync unavailable: {e}");
        }

        Ok((context, surface, gl))
    }

    /// Shared handle for creating buffers, vertex arrays and textures.
    pub fn gl(&self) -> &Rc<glow::Context> {
        &self.gl
    }

    pub fn info(&self) -> GlInfo {
        GlInfo::query(&self.gl)
    }

    /// Vertex array drawn as `vertex_count` triangle-list vertices each frame.
    pub fn attach_vertex_array(&mut self, vertex_array: VertexArray, vertex_count: i32) {
        self.mesh = Some((vertex_array, vertex_count));
    }
}

impl Backend for GlRenderer {
    fn name(&self) -> &'static str {
        "gl"
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        self.size = size;
        if size.is_empty() {
            return Ok(());
        }
        self.surface
            .resize(&self.context, non_zero(size.width), non_zero(size.height));
        Ok(())
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear = rgba;
    }

    fn redraw(&mut self) -> Result<()> {
        if self.size.is_empty() {
            return Ok(());
        }

        unsafe {
            self.gl
                .viewport(0, 0, self.size.width as i32, self.size.height as i32);
            self.gl
                .clear_color(self.clear[0], self.clear[1], self.clear[2], self.clear[3]);
            self.gl.clear(glow::COLOR_BUFFER_BIT);
        }
        if let Some((vao, count)) = &self.mesh {
            vao.bind();
            unsafe {
                self.gl.draw_arrays(glow::TRIANGLES, 0, *count);
                self.gl.bind_vertex_array(None);
            }
        }

        self.surface
            .swap_buffers(&self.context)
            .context("swap_buffers")?;

        Ok(())
    }
}

impl Drop for GlRenderer {
    fn drop(&mut self) {
        // GL objects go while the context is still current.
        self.mesh = None;
    }
}
