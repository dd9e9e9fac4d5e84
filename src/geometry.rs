//! Geometry loading for the transparent-model viewer.
//!
//! Transparency only gets interesting with real geometry behind it, so the
//! viewer can load STL models and render them as tinted glass. The loader
//! is a small builder: load, optionally recenter/normalize/smooth, upload.
//!
//! ```no_run
//! use phalanx::{GeometryLoader, GpuContext};
//! # fn demo(gpu: &GpuContext) {
//! let mesh = GeometryLoader::from_file("dragon.stl")
//!     .centered()
//!     .normalized()
//!     .smooth_normals()
//!     .upload(gpu)
//!     .unwrap();
//! # }
//! ```

use crate::gpu::GpuContext;
use crate::mesh::{Mesh, Vertex};
use glam::Vec3;
use std::path::Path;

/// Errors that can occur when loading geometry.
#[derive(Debug)]
pub enum GeometryError {
    /// File could not be read.
    Io(std::io::Error),
    /// File format could not be determined from extension.
    UnknownFormat(String),
    /// The geometry data was invalid or corrupt.
    ParseError(String),
}

impl std::fmt::Display for GeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryError::Io(e) => write!(f, "IO error: {}", e),
            GeometryError::UnknownFormat(ext) => {
                write!(f, "Unknown geometry format: '{}'", ext)
            }
            GeometryError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for GeometryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GeometryError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for GeometryError {
    fn from(e: std::io::Error) -> Self {
        GeometryError::Io(e)
    }
}

/// Raw geometry data before GPU upload.
///
/// Intermediate representation so transformations (centering, scaling)
/// can run before the final mesh is created.
#[derive(Clone, Debug)]
pub struct RawGeometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl RawGeometry {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Axis-aligned bounding box as `(min, max)`.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for v in &self.vertices {
            let p = Vec3::from(v.position);
            min = min.min(p);
            max = max.max(p);
        }
        (min, max)
    }

    pub fn center(&self) -> Vec3 {
        let (min, max) = self.bounds();
        (min + max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        let (min, max) = self.bounds();
        max - min
    }

    pub fn translate(&mut self, offset: Vec3) {
        for v in &mut self.vertices {
            v.position[0] += offset.x;
            v.position[1] += offset.y;
            v.position[2] += offset.z;
        }
    }

    pub fn scale(&mut self, factor: f32) {
        for v in &mut self.vertices {
            v.position[0] *= factor;
            v.position[1] *= factor;
            v.position[2] *= factor;
        }
    }

    /// Centers the geometry at the origin.
    pub fn recenter(&mut self) {
        let center = self.center();
        self.translate(-center);
    }

    /// Scales the geometry to fit within a unit cube.
    pub fn normalize(&mut self) {
        let size = self.size();
        let max_dim = size.x.max(size.y).max(size.z);
        if max_dim > 0.0 {
            self.scale(1.0 / max_dim);
        }
    }

    /// Recalculates smooth vertex normals by area-weighted averaging of
    /// face normals. STL files carry only face normals, which makes
    /// tinted-glass shading look faceted.
    pub fn recalculate_normals(&mut self) {
        for v in &mut self.vertices {
            v.normal = [0.0, 0.0, 0.0];
        }

        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let p0 = Vec3::from(self.vertices[i0].position);
            let p1 = Vec3::from(self.vertices[i1].position);
            let p2 = Vec3::from(self.vertices[i2].position);
            let face_normal = (p1 - p0).cross(p2 - p0);
            for &i in &[i0, i1, i2] {
                self.vertices[i].normal[0] += face_normal.x;
                self.vertices[i].normal[1] += face_normal.y;
                self.vertices[i].normal[2] += face_normal.z;
            }
        }

        for v in &mut self.vertices {
            v.normal = Vec3::from(v.normal).normalize_or_zero().into();
        }
    }

    /// Uploads this geometry to the GPU as a [`Mesh`].
    pub fn upload(&self, gpu: &GpuContext) -> Mesh {
        Mesh::new(gpu, &self.vertices, &self.indices)
    }
}

/// A builder for loading and transforming geometry before upload.
pub struct GeometryLoader {
    result: Result<RawGeometry, GeometryError>,
    center: bool,
    normalize: bool,
    smooth_normals: bool,
    scale_factor: Option<f32>,
}

impl GeometryLoader {
    fn from_result(result: Result<RawGeometry, GeometryError>) -> Self {
        Self {
            result,
            center: false,
            normalize: false,
            smooth_normals: false,
            scale_factor: None,
        }
    }

    /// Loads geometry from a file, detecting the format from its extension.
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
            .unwrap_or_default();
        let result = match ext.as_str() {
            "stl" => load_stl_file(path),
            _ => Err(GeometryError::UnknownFormat(ext)),
        };
        Self::from_result(result)
    }

    /// Loads STL geometry from raw bytes (e.g. `include_bytes!`).
    pub fn from_stl_bytes(bytes: &[u8]) -> Self {
        let mut cursor = std::io::Cursor::new(bytes);
        Self::from_result(parse_stl(&mut cursor))
    }

    /// Creates a loader from existing raw geometry.
    pub fn from_raw(geometry: RawGeometry) -> Self {
        Self::from_result(Ok(geometry))
    }

    /// Centers the geometry at the origin.
    pub fn centered(mut self) -> Self {
        self.center = true;
        self
    }

    /// Scales the geometry to fit within a unit cube.
    pub fn normalized(mut self) -> Self {
        self.normalize = true;
        self
    }

    /// Recalculates smooth vertex normals.
    pub fn smooth_normals(mut self) -> Self {
        self.smooth_normals = true;
        self
    }

    /// Applies a uniform scale factor after centering/normalization.
    pub fn scaled(mut self, factor: f32) -> Self {
        self.scale_factor = Some(factor);
        self
    }

    /// Applies the requested transformations and uploads to the GPU.
    pub fn upload(self, gpu: &GpuContext) -> Result<Mesh, GeometryError> {
        let mut geometry = self.result?;
        if self.center {
            geometry.recenter();
        }
        if self.normalize {
            geometry.normalize();
        }
        if let Some(factor) = self.scale_factor {
            geometry.scale(factor);
        }
        if self.smooth_normals {
            geometry.recalculate_normals();
        }
        Ok(geometry.upload(gpu))
    }
}

fn load_stl_file(path: &Path) -> Result<RawGeometry, GeometryError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    parse_stl(&mut reader)
}

fn parse_stl<R: std::io::Read + std::io::Seek>(reader: &mut R) -> Result<RawGeometry, GeometryError> {
    let stl = stl_io::read_stl(reader)
        .map_err(|e| GeometryError::ParseError(format!("STL parse error: {}", e)))?;

    let mut vertices = Vec::with_capacity(stl.faces.len() * 3);
    let mut indices = Vec::with_capacity(stl.faces.len() * 3);

    for (i, face) in stl.faces.iter().enumerate() {
        let normal: [f32; 3] = face.normal.into();
        for &vertex_idx in &face.vertices {
            let position: [f32; 3] = stl.vertices[vertex_idx].into();
            vertices.push(Vertex::new(position, normal));
        }
        let base = (i * 3) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2]);
    }

    Ok(RawGeometry::new(vertices, indices))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetra() -> RawGeometry {
        let vertices = vec![
            Vertex::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            Vertex::new([2.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            Vertex::new([0.0, 4.0, 0.0], [0.0, 1.0, 0.0]),
            Vertex::new([0.0, 0.0, 6.0], [0.0, 1.0, 0.0]),
        ];
        let indices = vec![0, 1, 2, 0, 2, 3, 0, 3, 1, 1, 3, 2];
        RawGeometry::new(vertices, indices)
    }

    #[test]
    fn bounds_span_all_vertices() {
        let geom = tetra();
        let (min, max) = geom.bounds();
        assert_eq!(min, Vec3::ZERO);
        assert_eq!(max, Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn recenter_moves_bounding_box_center_to_origin() {
        let mut geom = tetra();
        geom.recenter();
        assert!(geom.center().length() < 1e-5);
    }

    #[test]
    fn normalize_fits_unit_cube() {
        let mut geom = tetra();
        geom.normalize();
        let size = geom.size();
        assert!(size.x <= 1.0 + 1e-5 && size.y <= 1.0 + 1e-5 && size.z <= 1.0 + 1e-5);
        // Largest axis spans exactly the unit interval.
        assert!((size.max_element() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn recalculated_normals_are_unit_length() {
        let mut geom = tetra();
        geom.recalculate_normals();
        for v in &geom.vertices {
            assert!((Vec3::from(v.normal).length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let loader = GeometryLoader::from_file("model.obj");
        assert!(matches!(
            loader.result,
            Err(GeometryError::UnknownFormat(_))
        ));
    }
}
