//! The list-building pass for transparent geometry.
//!
//! This pass rasterizes every transparent draw with color writes masked
//! off: its real output is the side effects in the fragment-list buffers.
//! Each fragment that survives rasterization atomically allocates a node,
//! fills it with packed color and view-space depth, and exchanges itself
//! into its pixel's head pointer (see `shaders/gather.wgsl`).
//!
//! # Bind groups
//!
//! - **Group 0**: camera uniforms (view-projection and view matrices)
//! - **Group 1**: model uniforms (model matrix, normal matrix, color),
//!   one dynamic-offset slice per draw call
//! - **Group 2**: the fragment lists (read-write)
//!
//! # No depth attachment
//!
//! The pass carries no depth buffer: in a fully transparent scene every
//! fragment contributes, and occlusion by opaque geometry is the calling
//! renderer's concern. Culling is disabled for the same reason — both
//! faces of a transparent surface are visible.

use crate::camera::Camera;
use crate::color::Color;
use crate::gpu::GpuContext;
use crate::lists::FragmentLists;
use crate::mesh::{Mesh, Transform, Vertex};

/// Camera uniforms for the gather pass.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniforms {
    /// Combined view-projection matrix.
    view_proj: [[f32; 4]; 4],
    /// View matrix; the fragment depth key is measured in view space.
    view: [[f32; 4]; 4],
}

/// Per-draw model uniforms.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ModelUniforms {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    color: [f32; 4],
}

/// A transparent draw: one mesh, one transform, one constant color.
///
/// This is the entire per-draw parameter block of the pipeline — no
/// textures, no per-vertex color.
pub struct DrawCall<'a> {
    pub mesh: &'a Mesh,
    pub transform: Transform,
    pub color: Color,
}

/// The list-building render pass.
pub struct GatherPass {
    pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_capacity: usize,
    model_stride: u32,
}

impl GatherPass {
    /// Creates the pipeline and uniform resources.
    ///
    /// The pipeline targets the surface format so it can share a render
    /// pass attachment with the resolve pass, but writes no color:
    /// `ColorWrites::empty()` masks the target off entirely.
    pub fn new(gpu: &GpuContext, lists: &FragmentLists) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Gather Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/gather.wgsl").into()),
        });

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Gather Camera Uniforms"),
            size: std::mem::size_of::<CameraUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Gather Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Gather Camera Bind Group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        // Model uniforms use one buffer with a dynamic offset per draw,
        // so a frame's worth of transforms uploads in a single write.
        let align = device.limits().min_uniform_buffer_offset_alignment;
        let model_stride =
            (std::mem::size_of::<ModelUniforms>() as u32).next_multiple_of(align.max(1));

        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Gather Model Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: std::num::NonZeroU64::new(
                        std::mem::size_of::<ModelUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let model_capacity = 64;
        let (model_buffer, model_bind_group) =
            Self::create_model_buffer(device, &model_layout, model_stride, model_capacity);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Gather Pipeline Layout"),
            bind_group_layouts: &[&camera_layout, &model_layout, lists.gather_layout()],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Gather Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[Vertex::LAYOUT],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: gpu.config.format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::empty(),
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                front_face: wgpu::FrontFace::Ccw,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            camera_buffer,
            camera_bind_group,
            model_layout,
            model_buffer,
            model_bind_group,
            model_capacity,
            model_stride,
        }
    }

    fn create_model_buffer(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u32,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Gather Model Uniforms"),
            size: stride as u64 * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Gather Model Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: std::num::NonZeroU64::new(std::mem::size_of::<ModelUniforms>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    fn ensure_model_capacity(&mut self, device: &wgpu::Device, required: usize) {
        if required <= self.model_capacity {
            return;
        }
        self.model_capacity = required.next_power_of_two();
        let (buffer, bind_group) =
            Self::create_model_buffer(device, &self.model_layout, self.model_stride, self.model_capacity);
        self.model_buffer = buffer;
        self.model_bind_group = bind_group;
    }

    /// Records the list-building draws into an active render pass.
    ///
    /// The pass's color attachment should be the frame target with its
    /// clear color set to the desired background; nothing is written to
    /// it here. Must be encoded after [`FragmentLists::reset`] and before
    /// the resolve pass on the same encoder.
    pub fn render(
        &mut self,
        gpu: &GpuContext,
        render_pass: &mut wgpu::RenderPass,
        camera: &Camera,
        draws: &[DrawCall],
        lists: &FragmentLists,
    ) {
        if draws.is_empty() {
            return;
        }

        let view = camera.view_matrix();
        let proj = camera.projection_matrix(gpu.aspect(), 0.1, 1000.0);
        let camera_uniforms = CameraUniforms {
            view_proj: (proj * view).to_cols_array_2d(),
            view: view.to_cols_array_2d(),
        };
        gpu.queue.write_buffer(
            &self.camera_buffer,
            0,
            bytemuck::cast_slice(&[camera_uniforms]),
        );

        self.ensure_model_capacity(&gpu.device, draws.len());

        // All model uniforms for the frame in one upload.
        let mut staging = vec![0u8; self.model_stride as usize * draws.len()];
        for (i, call) in draws.iter().enumerate() {
            let model_matrix = call.transform.matrix();
            let uniforms = ModelUniforms {
                model: model_matrix.to_cols_array_2d(),
                normal_matrix: model_matrix.inverse().transpose().to_cols_array_2d(),
                color: call.color.to_array(),
            };
            let offset = i * self.model_stride as usize;
            staging[offset..offset + std::mem::size_of::<ModelUniforms>()]
                .copy_from_slice(bytemuck::bytes_of(&uniforms));
        }
        gpu.queue.write_buffer(&self.model_buffer, 0, &staging);

        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_bind_group(2, lists.gather_bind_group(), &[]);

        for (i, call) in draws.iter().enumerate() {
            let offset = i as u32 * self.model_stride;
            render_pass.set_bind_group(1, &self.model_bind_group, &[offset]);
            render_pass.set_vertex_buffer(0, call.mesh.vertex_buffer.slice(..));
            render_pass
                .set_index_buffer(call.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..call.mesh.index_count, 0, 0..1);
        }
    }
}
