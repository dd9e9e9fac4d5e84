//! The transparency renderer: reset, gather, resolve, in that order,
//! every frame.

use crate::camera::Camera;
use crate::color::Color;
use crate::gather::{DrawCall, GatherPass};
use crate::gpu::GpuContext;
use crate::lists::{FragmentLists, ListStats, RendererConfig};
use crate::resolve::ResolvePass;

/// Order-independent transparency renderer.
///
/// Owns the fragment-list buffers and the two passes, and encodes one
/// frame of transparency into a caller-provided target view. The frame
/// sequence is fixed:
///
/// 1. **Reset** — head pointers and allocation counter zero-fill.
/// 2. **Gather** — transparent draws build the per-pixel lists; the
///    target is cleared to the background color but not otherwise
///    written.
/// 3. **Resolve** — a fullscreen pass sorts and composites each list
///    over the background.
///
/// All three are encoded on one command encoder; wgpu's usage tracking
/// serializes the buffer hazards between them, so the gather pass never
/// sees a stale head and the resolve pass never sees a half-built list.
///
/// # Example
///
/// ```no_run
/// use phalanx::{Camera, Color, DrawCall, GpuContext, Renderer, RendererConfig, Transform, Mesh};
/// # fn demo(gpu: &GpuContext, mesh: &Mesh, view: &wgpu::TextureView) {
/// let mut renderer = Renderer::new(gpu, RendererConfig::default());
///
/// let mut encoder = gpu.device.create_command_encoder(&Default::default());
/// renderer.render(
///     gpu,
///     &mut encoder,
///     view,
///     &Camera::new().at(0.0, 0.0, 6.0),
///     Color::rgb(0.05, 0.05, 0.08),
///     &[DrawCall { mesh, transform: Transform::new(), color: Color::RED.with_alpha(0.5) }],
/// );
/// gpu.queue.submit(std::iter::once(encoder.finish()));
/// # }
/// ```
pub struct Renderer {
    lists: FragmentLists,
    gather: GatherPass,
    resolve: ResolvePass,
    config: RendererConfig,
}

impl Renderer {
    /// Builds the list buffers and both passes for the current surface
    /// size.
    ///
    /// A list depth of zero would make the resolve shader's local arrays
    /// ill-formed, so `max_nodes_per_pixel` is clamped to at least 1.
    pub fn new(gpu: &GpuContext, mut config: RendererConfig) -> Self {
        config.max_nodes_per_pixel = config.max_nodes_per_pixel.max(1);
        let lists = FragmentLists::new(gpu, config.max_nodes_per_pixel);
        let gather = GatherPass::new(gpu, &lists);
        let resolve = ResolvePass::new(gpu, &lists, config.max_nodes_per_pixel);
        Self {
            lists,
            gather,
            resolve,
            config,
        }
    }

    /// Encodes one frame of transparency into `target`.
    ///
    /// Handles resize first: if the surface size changed since the last
    /// frame, the list buffers are torn down and reallocated before any
    /// encoding — capacity is pixel-count-dependent. Callers must route
    /// resizes through [`GpuContext::resize`] between frames.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        camera: &Camera,
        background: Color,
        draws: &[DrawCall],
    ) {
        self.lists.ensure_size(gpu);
        self.lists.reset(encoder);

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Gather Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(background.into()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.gather
                .render(gpu, &mut pass, camera, draws, &self.lists);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Resolve Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.resolve.render(&mut pass, &self.lists);
        }
    }

    /// Reads back last frame's allocation counter. Blocking; diagnostics
    /// only. See [`ListStats`].
    pub fn stats(&self, gpu: &GpuContext) -> Option<ListStats> {
        self.lists.stats(gpu)
    }

    /// The configuration this renderer was built with.
    pub fn config(&self) -> RendererConfig {
        self.config
    }
}
