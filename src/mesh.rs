//! Mesh primitives and spatial transforms for transparent geometry.
//!
//! This module provides the building blocks the gather pass consumes:
//!
//! - [`Vertex`] — position + normal, the only attributes transparency needs
//! - [`Mesh`] — GPU-resident geometry with vertex and index buffers
//! - [`Transform`] — position, rotation, and scale for placing meshes
//!
//! Meshes carry no UVs and no per-vertex color: a transparent draw is a
//! mesh, a transform, and one constant [`Color`](crate::Color), which is
//! the whole per-draw parameter block of the pipeline.
//!
//! # Creating Meshes
//!
//! ```no_run
//! use phalanx::{GpuContext, Mesh};
//! # fn demo(gpu: &GpuContext) {
//! let cube = Mesh::cube(gpu);
//! let sphere = Mesh::sphere(gpu, 32, 16);
//! let pane = Mesh::plane(gpu, 2.0);
//! # }
//! ```

use crate::gpu::GpuContext;
use glam::{Mat4, Quat, Vec3};

/// A vertex with position and normal.
///
/// `#[repr(C)]` for a predictable 24-byte GPU layout:
///
/// | Attribute | Format    | Offset | Shader Location |
/// |-----------|-----------|--------|-----------------|
/// | position  | Float32x3 | 0      | 0               |
/// | normal    | Float32x3 | 12     | 1               |
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position in model space.
    pub position: [f32; 3],
    /// Surface normal (normalized; used for the fixed Lambert term).
    pub normal: [f32; 3],
}

impl Vertex {
    /// The wgpu vertex buffer layout for this vertex type.
    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: 12,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
        ],
    };

    pub fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position, normal }
    }
}

/// GPU-resident geometry with vertex and index buffers.
///
/// Immutable after creation; to render different geometry, create a new
/// mesh. All built-in primitives use counter-clockwise winding, though the
/// gather pass does not cull — both faces of transparent geometry
/// contribute fragments.
#[derive(Debug)]
pub struct Mesh {
    pub(crate) vertex_buffer: wgpu::Buffer,
    pub(crate) index_buffer: wgpu::Buffer,
    pub(crate) index_count: u32,
}

impl Mesh {
    /// Creates a mesh from raw vertex and index data.
    pub fn new(gpu: &GpuContext, vertices: &[Vertex], indices: &[u32]) -> Self {
        use wgpu::util::DeviceExt;

        let vertex_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });

        let index_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }

    /// Creates a unit cube centered at the origin.
    ///
    /// Spans -0.5 to 0.5 on all axes. Each face has its own vertices so
    /// normals stay flat.
    pub fn cube(gpu: &GpuContext) -> Self {
        let (vertices, indices) = cube_geometry();
        Self::new(gpu, &vertices, &indices)
    }

    /// Creates a UV sphere of radius 0.5 centered at the origin.
    ///
    /// `segments` is the longitudinal resolution (minimum 3), `rings` the
    /// latitudinal resolution (minimum 2).
    pub fn sphere(gpu: &GpuContext, segments: u32, rings: u32) -> Self {
        let (vertices, indices) = sphere_geometry(segments, rings);
        Self::new(gpu, &vertices, &indices)
    }

    /// Creates a `size`×`size` plane in the XY plane, facing +Z.
    ///
    /// A plane is the canonical transparency test object: stack a few with
    /// different colors and depths and the resolve order becomes obvious.
    pub fn plane(gpu: &GpuContext, size: f32) -> Self {
        let (vertices, indices) = plane_geometry(size);
        Self::new(gpu, &vertices, &indices)
    }
}

pub(crate) fn cube_geometry() -> (Vec<Vertex>, Vec<u32>) {
    // One quad per face so each face keeps its own normal.
    const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        // (normal, tangent u, tangent v)
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (face, &(n, u, v)) in FACES.iter().enumerate() {
        let n3 = Vec3::from(n);
        let u3 = Vec3::from(u);
        let v3 = Vec3::from(v);
        let center = n3 * 0.5;
        for &(su, sv) in &[(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let p = center + u3 * su + v3 * sv;
            vertices.push(Vertex::new(p.into(), n));
        }
        let base = (face * 4) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    (vertices, indices)
}

pub(crate) fn sphere_geometry(segments: u32, rings: u32) -> (Vec<Vertex>, Vec<u32>) {
    let segments = segments.max(3);
    let rings = rings.max(2);

    let mut vertices = Vec::with_capacity(((rings + 1) * (segments + 1)) as usize);
    let mut indices = Vec::new();

    for ring in 0..=rings {
        let phi = std::f32::consts::PI * ring as f32 / rings as f32;
        let (sin_phi, cos_phi) = phi.sin_cos();
        for seg in 0..=segments {
            let theta = std::f32::consts::TAU * seg as f32 / segments as f32;
            let (sin_theta, cos_theta) = theta.sin_cos();
            // Unit normal; position is the normal scaled to radius 0.5.
            let n = [sin_phi * cos_theta, cos_phi, sin_phi * sin_theta];
            let p = [n[0] * 0.5, n[1] * 0.5, n[2] * 0.5];
            vertices.push(Vertex::new(p, n));
        }
    }

    let stride = segments + 1;
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }

    (vertices, indices)
}

pub(crate) fn plane_geometry(size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let h = size * 0.5;
    let n = [0.0, 0.0, 1.0];
    let vertices = vec![
        Vertex::new([-h, -h, 0.0], n),
        Vertex::new([h, -h, 0.0], n),
        Vertex::new([h, h, 0.0], n),
        Vertex::new([-h, h, 0.0], n),
    ];
    let indices = vec![0, 1, 2, 2, 3, 0];
    (vertices, indices)
}

/// Position, rotation, and scale for placing a mesh in world space.
///
/// Builder-style:
///
/// ```
/// use phalanx::Transform;
/// use glam::{Quat, Vec3};
///
/// let t = Transform::new()
///     .position(Vec3::new(0.0, 1.0, -4.0))
///     .rotation(Quat::from_rotation_y(0.7))
///     .uniform_scale(2.0);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::splat(scale);
        self
    }

    /// The model matrix (object-to-world).
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_has_one_quad_per_face() {
        let (vertices, indices) = cube_geometry();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        // Every vertex sits on the surface of the unit cube.
        for v in &vertices {
            let m = v.position
                .iter()
                .fold(0.0f32, |acc, c| acc.max(c.abs()));
            assert!((m - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn sphere_vertices_sit_on_radius() {
        let (vertices, indices) = sphere_geometry(16, 8);
        assert!(!indices.is_empty());
        for v in &vertices {
            let r = Vec3::from(v.position).length();
            assert!((r - 0.5).abs() < 1e-5);
            // Normal points straight out of the sphere.
            let n = Vec3::from(v.normal);
            assert!((n.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn sphere_clamps_degenerate_resolution() {
        let (vertices, indices) = sphere_geometry(1, 1);
        assert!(!vertices.is_empty());
        assert_eq!(indices.len() % 3, 0);
    }

    #[test]
    fn transform_composes_scale_then_translation() {
        let t = Transform::new()
            .position(Vec3::new(1.0, 0.0, 0.0))
            .uniform_scale(2.0);
        let p = t.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-6);
    }
}
