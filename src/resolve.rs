//! The resolve pass: one fullscreen triangle that turns each pixel's
//! fragment list into its final color.
//!
//! The fragment shader walks the list from the head pointer into a
//! function-local array (hard-capped at the configured depth), insertion-
//! sorts by view-space depth, and accumulates front to back. Output is
//! premultiplied and blended over whatever the gather pass's clear left
//! in the target, so an empty list shows the caller's background.

use crate::gpu::GpuContext;
use crate::lists::FragmentLists;

/// The list-resolve render pass.
pub struct ResolvePass {
    pipeline: wgpu::RenderPipeline,
}

impl ResolvePass {
    /// Creates the fullscreen resolve pipeline.
    ///
    /// `max_nodes_per_pixel` is spliced into the shader source as a
    /// compile-time constant — function-local array sizes must be
    /// creation-time constants in WGSL, and baking the bound here keeps
    /// the traversal cap and the pool depth in lockstep.
    pub fn new(gpu: &GpuContext, lists: &FragmentLists, max_nodes_per_pixel: u32) -> Self {
        let device = &gpu.device;

        let source = include_str!("shaders/resolve.wgsl").replace(
            "const MAX_NODES_PER_PIXEL: u32 = 20u;",
            &format!("const MAX_NODES_PER_PIXEL: u32 = {}u;", max_nodes_per_pixel),
        );
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Resolve Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Resolve Pipeline Layout"),
            bind_group_layouts: &[lists.resolve_layout()],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Resolve Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    // Premultiplied over: src + dst * (1 - src.a).
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self { pipeline }
    }

    /// Records the fullscreen resolve draw.
    ///
    /// The render pass must load (not clear) the target the gather pass
    /// cleared, and must begin after the gather pass ends — the pass
    /// boundary is what makes every list write visible to this read.
    pub fn render(&self, render_pass: &mut wgpu::RenderPass, lists: &FragmentLists) {
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, lists.resolve_bind_group(), &[]);
        render_pass.draw(0..3, 0..1);
    }
}
