// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lumen_core::init_tracing;
use lumen_platform::{create_window, framebuffer_size};
use lumen_render::{Backend, RenderSize};
use lumen_render_gl::{vertex_count, Buffer, GlRenderer, Usage, VertexArray};
use lumen_render_vk::{ContextSettings, GraphicsContext, VkBackend, WindowTarget};
use tracing::{error, info};

use lumen_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use config::{AppConfig, DEFAULT_CONFIG_PATH};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendChoice {
    Gl,
    Vk,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Renderer backend
    #[arg(long, value_enum, default_value_t = BackendChoice::Vk)]
    backend: BackendChoice,
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

struct GlScene {
    // Dropped before the renderer so deletion happens on a live context.
    _vertices: Buffer,
    renderer: GlRenderer,
}

enum ActiveBackend {
    Gl(Box<GlScene>),
    Vk(Box<VkBackend>),
}

impl ActiveBackend {
    fn get(&mut self) -> &mut dyn Backend {
        match self {
            ActiveBackend::Gl(s) => &mut s.renderer as &mut dyn Backend,
            ActiveBackend::Vk(r) => r.as_mut(),
        }
    }
}

fn start_gl(window: &Window, size: RenderSize) -> Result<ActiveBackend> {
    let mut renderer = GlRenderer::new(window, window, size)?;

    let gl_info = renderer.info();
    info!("gl: {} / {} / {}", gl_info.vendor, gl_info.renderer, gl_info.version);
    info!("gl: GLSL {}", gl_info.shading_language_version);
    info!("gl: {} extensions", gl_info.extensions.len());
    for ext in &gl_info.extensions {
        info!("  {ext}");
    }
    info!("gl: {} SPIR-V extensions", gl_info.spirv_extensions.len());
    for ext in &gl_info.spirv_extensions {
        info!("  {ext}");
    }

    let vertices = Buffer::from_slice(renderer.gl(), &TRIANGLE, Usage::StaticDraw)?;
    let mut vao = VertexArray::new(renderer.gl())?;
    let layout = [3];
    vao.bind_vertex_buffer(&vertices, &layout, 0);
    info!(
        "gl: vertex buffer {} bytes, {} attributes",
        vertices.size(),
        vao.attribute_count()
    );
    renderer.attach_vertex_array(vao, vertex_count(TRIANGLE.len(), &layout));

    Ok(ActiveBackend::Gl(Box::new(GlScene {
        _vertices: vertices,
        renderer,
    })))
}

fn start_vk(window: &Window, size: RenderSize, cfg: &AppConfig) -> Result<ActiveBackend> {
    let settings = ContextSettings {
        app_name: cfg.app.name.clone(),
        app_version: cfg.app.version,
    };
    let target = WindowTarget::new(window, window);
    let context = Arc::new(GraphicsContext::new(&settings, &target).context("vk context")?);
    let backend = VkBackend::new(context, target, size).context("vk surface")?;
    Ok(ActiveBackend::Vk(Box::new(backend)))
}

struct App {
    choice: BackendChoice,
    cfg: AppConfig,
    // Declared before the window so the surface goes first.
    backend: Option<ActiveBackend>,
    window: Option<Window>,
}

impl App {
    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = create_window(event_loop, &self.cfg.window)?;
        let size = framebuffer_size(&window);

        let mut backend = match self.choice {
            BackendChoice::Gl => start_gl(&window, size)?,
            BackendChoice::Vk => match start_vk(&window, size, &self.cfg) {
                Ok(b) => b,
                Err(e) => {
                    error!("vk init failed: {e:#}; falling back to gl");
                    start_gl(&window, size)?
                }
            },
        };
        backend.get().set_clear_color(self.cfg.render.clear_color);
        info!("backend = {}", backend.get().name());

        window.request_redraw();
        self.backend = Some(backend);
        self.window = Some(window);
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.backend = None;
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        event_loop.set_control_flow(ControlFlow::Wait);
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            error!("startup failed: {e:#}");
            self.shutdown(event_loop);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().is_some_and(|w| w.id() != window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::Resized(new_size) => {
                let size = RenderSize::new(new_size.width, new_size.height);
                info!("Resized → {}x{}", size.width, size.height);
                if let Some(backend) = &mut self.backend {
                    if let Err(e) = backend.get().resize(size) {
                        error!("resize failed: {e:#}");
                        self.shutdown(event_loop);
                        return;
                    }
                }
                if let Some(w) = &self.window {
                    w.request_redraw();
                }
            }

            WindowEvent::RedrawRequested => {
                if let Some(backend) = &mut self.backend {
                    if let Err(e) = backend.get().redraw() {
                        error!("redraw failed: {e:#}");
                        self.shutdown(event_loop);
                    }
                }
            }

            _ => {}
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = AppConfig::load(&args.config);
    info!("{} v{}", cfg.app.name, cfg.app.version);

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App {
        choice: args.backend,
        cfg,
        backend: None,
        window: None,
    };

    event_loop.run_app(&mut app)?;
    Ok(())
}
