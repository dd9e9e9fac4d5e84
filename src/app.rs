//! A small winit viewer for transparent scenes.
//!
//! The viewer exists so a transparency setup is three closures away from
//! a window: register meshes during setup, queue draws during the frame,
//! and the app runs the renderer into the swapchain.
//!
//! ```no_run
//! use phalanx::*;
//!
//! fn main() {
//!     run(AppConfig::new().title("Glass"), |ctx| {
//!         let pane = ctx.plane(2.0);
//!
//!         move |frame| {
//!             frame.draw(pane, Transform::new(), Color::RED.with_alpha(0.4));
//!             frame.draw(
//!                 pane,
//!                 Transform::from_position(glam::Vec3::new(0.3, 0.2, -1.0)),
//!                 Color::BLUE.with_alpha(0.4),
//!             );
//!         }
//!     });
//! }
//! ```

use std::sync::{Arc, Once};
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::camera::Camera;
use crate::color::Color;
use crate::gather::DrawCall;
use crate::gpu::GpuContext;
use crate::lists::RendererConfig;
use crate::mesh::{Mesh, Transform};
use crate::renderer::Renderer;

/// How often the viewer polls overflow diagnostics (in frames). The
/// readback blocks, so it stays off the per-frame path.
const STATS_INTERVAL: u64 = 300;

/// Viewer configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Initial background; frames can override it.
    pub background: Color,
    pub renderer: RendererConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "phalanx".to_string(),
            width: 1280,
            height: 720,
            background: Color::rgb(0.03, 0.03, 0.05),
            renderer: RendererConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    /// Overrides the fragment-list depth the pool is sized for.
    pub fn max_nodes_per_pixel(mut self, depth: u32) -> Self {
        self.renderer.max_nodes_per_pixel = depth;
        self
    }
}

/// Handle to a mesh registered during setup.
///
/// Frame closures queue draws by handle, so they never borrow the meshes
/// themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshHandle(usize);

/// Context provided during app setup.
pub struct SetupContext<'a> {
    pub gpu: &'a GpuContext,
    pub camera: &'a mut Camera,
    meshes: &'a mut Vec<Mesh>,
}

impl SetupContext<'_> {
    /// Registers a mesh and returns its handle.
    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshHandle {
        self.meshes.push(mesh);
        MeshHandle(self.meshes.len() - 1)
    }

    /// Registers a unit cube.
    pub fn cube(&mut self) -> MeshHandle {
        let mesh = Mesh::cube(self.gpu);
        self.add_mesh(mesh)
    }

    /// Registers a sphere.
    pub fn sphere(&mut self) -> MeshHandle {
        let mesh = Mesh::sphere(self.gpu, 32, 16);
        self.add_mesh(mesh)
    }

    /// Registers a plane of the given size.
    pub fn plane(&mut self, size: f32) -> MeshHandle {
        let mesh = Mesh::plane(self.gpu, size);
        self.add_mesh(mesh)
    }
}

struct QueuedDraw {
    mesh: MeshHandle,
    transform: Transform,
    color: Color,
}

/// Per-frame context handed to the frame closure.
pub struct Frame<'a> {
    pub camera: &'a mut Camera,
    /// Seconds since the app started.
    pub time: f32,
    /// Seconds since the previous frame.
    pub dt: f32,
    background: &'a mut Color,
    queue: &'a mut Vec<QueuedDraw>,
}

impl Frame<'_> {
    /// Queues one transparent draw.
    pub fn draw(&mut self, mesh: MeshHandle, transform: Transform, color: Color) {
        self.queue.push(QueuedDraw {
            mesh,
            transform,
            color,
        });
    }

    /// Sets the background color resolved behind all transparency.
    pub fn background(&mut self, color: Color) {
        *self.background = color;
    }
}

type FrameFn = Box<dyn FnMut(&mut Frame)>;
type SetupFn = Box<dyn FnOnce(&mut SetupContext) -> FrameFn>;

static LOG_INIT: Once = Once::new();

fn init_logging() {
    LOG_INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    });
}

/// Runs the viewer: opens a window, brings up the GPU, calls `setup`
/// once, then calls the returned frame closure every frame.
///
/// Exits (with an error log) if the adapter cannot support fragment-stage
/// storage atomics — the one fatal condition of the pipeline.
pub fn run<S, F>(config: AppConfig, setup: S)
where
    S: FnOnce(&mut SetupContext) -> F + 'static,
    F: FnMut(&mut Frame) + 'static,
{
    init_logging();

    let event_loop = EventLoop::new().unwrap();
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::Pending {
        config,
        setup: Some(Box::new(move |ctx: &mut SetupContext| {
            Box::new(setup(ctx)) as FrameFn
        })),
    };
    event_loop.run_app(&mut app).unwrap();
}

enum App {
    Pending {
        config: AppConfig,
        setup: Option<SetupFn>,
    },
    Running {
        window: Arc<Window>,
        gpu: GpuContext,
        renderer: Renderer,
        meshes: Vec<Mesh>,
        camera: Camera,
        background: Color,
        frame_fn: FrameFn,
        queue: Vec<QueuedDraw>,
        start_time: Instant,
        last_frame: Instant,
        frame_count: u64,
    },
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let App::Pending { config, setup } = self else {
            return;
        };
        let background = config.background;
        let renderer_config = config.renderer;

        let window_attrs = WindowAttributes::default()
            .with_title(&config.title)
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));
        let window = Arc::new(event_loop.create_window(window_attrs).unwrap());

        let gpu = match GpuContext::new(window.clone()) {
            Ok(gpu) => gpu,
            Err(e) => {
                log::error!("failed to initialize GPU: {}", e);
                event_loop.exit();
                return;
            }
        };

        let renderer = Renderer::new(&gpu, renderer_config);
        let mut meshes = Vec::new();
        let mut camera = Camera::new();

        let setup_fn = setup.take().unwrap();
        let frame_fn = setup_fn(&mut SetupContext {
            gpu: &gpu,
            camera: &mut camera,
            meshes: &mut meshes,
        });

        *self = App::Running {
            window,
            gpu,
            renderer,
            meshes,
            camera,
            background,
            frame_fn,
            queue: Vec::new(),
            start_time: Instant::now(),
            last_frame: Instant::now(),
            frame_count: 0,
        };
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let App::Running {
            window,
            gpu,
            renderer,
            meshes,
            camera,
            background,
            frame_fn,
            queue,
            start_time,
            last_frame,
            frame_count,
        } = self
        else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                gpu.resize(size.width, size.height);
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let time = start_time.elapsed().as_secs_f32();
                let dt = now.duration_since(*last_frame).as_secs_f32();
                *last_frame = now;

                queue.clear();
                frame_fn(&mut Frame {
                    camera,
                    time,
                    dt,
                    background,
                    queue,
                });

                let draws: Vec<DrawCall> = queue
                    .iter()
                    .map(|q| DrawCall {
                        mesh: &meshes[q.mesh.0],
                        transform: q.transform,
                        color: q.color,
                    })
                    .collect();

                let output = match gpu.surface.get_current_texture() {
                    Ok(output) => output,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        gpu.resize(gpu.width(), gpu.height());
                        window.request_redraw();
                        return;
                    }
                    Err(e) => {
                        log::error!("surface error: {}", e);
                        event_loop.exit();
                        return;
                    }
                };
                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());

                let mut encoder = gpu
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("Frame Encoder"),
                    });
                renderer.render(gpu, &mut encoder, &view, camera, *background, &draws);
                gpu.queue.submit(std::iter::once(encoder.finish()));
                output.present();

                *frame_count += 1;
                if *frame_count % STATS_INTERVAL == 0 {
                    if let Some(stats) = renderer.stats(gpu) {
                        if stats.dropped() > 0 {
                            log::warn!(
                                "fragment pool overflow: {} of {} attempted allocations dropped; \
                                 consider raising max_nodes_per_pixel",
                                stats.dropped(),
                                stats.attempted,
                            );
                        }
                    }
                }

                window.request_redraw();
            }
            _ => {}
        }
    }
}
