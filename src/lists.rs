//! GPU storage for the per-pixel fragment lists.
//!
//! Three buffers back the whole transparency pipeline:
//!
//! - **Node pool** — a flat array of 12-byte fragment records, sized
//!   `max_nodes_per_pixel × width × height`.
//! - **Head pointers** — one `u32` per pixel holding the index of the most
//!   recently linked node for that pixel.
//! - **Allocation counter** — a single `atomic<u32>` that hands out pool
//!   slots via fetch-and-increment.
//!
//! # Indexing scheme
//!
//! Node indices are **one-based** and `0` is the list terminator. A zeroed
//! head-pointer buffer therefore reads as "every list is empty", which
//! makes the per-frame reset exactly two `clear_buffer` zero-fills — the
//! previous frame's nodes are logically freed without touching their
//! storage. The pool buffer holds one extra record so one-based indices
//! address it directly; slot 0 is never written.
//!
//! # Lifetime
//!
//! All three buffers are frame-transient in content: [`FragmentLists::reset`]
//! must be encoded before the gather pass of every frame, and
//! [`FragmentLists::ensure_size`] reallocates everything when the output
//! size changes. Nothing persists across frames.

use crate::gpu::GpuContext;

/// Default list depth: how many fragments per pixel the pool is sized for.
pub const DEFAULT_MAX_NODES_PER_PIXEL: u32 = 20;

/// Configuration for [`Renderer`](crate::Renderer).
#[derive(Clone, Copy, Debug)]
pub struct RendererConfig {
    /// Pool depth in fragments per pixel. Also the hard cap on resolve
    /// traversal length, baked into the resolve shader at creation.
    pub max_nodes_per_pixel: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_nodes_per_pixel: DEFAULT_MAX_NODES_PER_PIXEL,
        }
    }
}

/// One fragment record as laid out in the node pool.
///
/// Mirrors the WGSL `Node` struct: 12 bytes, tightly packed. The color is
/// linear RGBA packed as 8-bit unorm (`pack4x8unorm`); `depth` is the
/// view-space distance used as the sort key; `next` is the one-based index
/// of the previously linked node for the same pixel, or 0.
///
/// The host never writes node records (the fragment shader does); this
/// type exists so buffer sizing and tests agree with the shader layout.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct GpuNode {
    pub color: u32,
    pub depth: f32,
    pub next: u32,
}

/// List parameters bound alongside the buffers, recreated on resize.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct ListParams {
    pub width: u32,
    pub height: u32,
    pub capacity: u32,
    pub max_nodes_per_pixel: u32,
}

/// Allocation counter snapshot, read back on demand for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListStats {
    /// Fragments that attempted an allocation this frame. The counter
    /// keeps incrementing past capacity, so this can exceed it.
    pub attempted: u32,
    /// Usable pool slots (`max_nodes_per_pixel × width × height`).
    pub capacity: u32,
}

impl ListStats {
    /// Fragments dropped because the pool was exhausted.
    pub fn dropped(&self) -> u32 {
        self.attempted.saturating_sub(self.capacity)
    }
}

/// Usable pool slots for a given output size and list depth.
pub(crate) fn pool_capacity(width: u32, height: u32, max_nodes_per_pixel: u32) -> u32 {
    max_nodes_per_pixel * width * height
}

/// The node pool, head-pointer and counter buffers plus their bind groups.
///
/// Two bind group layouts exist over the same buffers: the gather pass
/// binds everything read-write (it allocates and splices), the resolve
/// pass binds heads and nodes read-only and does not see the counter.
pub struct FragmentLists {
    params_buffer: wgpu::Buffer,
    heads: wgpu::Buffer,
    nodes: wgpu::Buffer,
    counter: wgpu::Buffer,
    readback: wgpu::Buffer,
    gather_layout: wgpu::BindGroupLayout,
    resolve_layout: wgpu::BindGroupLayout,
    gather_bind_group: wgpu::BindGroup,
    resolve_bind_group: wgpu::BindGroup,
    size: (u32, u32),
    max_nodes_per_pixel: u32,
}

impl FragmentLists {
    /// Allocates buffers and bind groups for the current surface size.
    pub fn new(gpu: &GpuContext, max_nodes_per_pixel: u32) -> Self {
        let (width, height) = (gpu.width(), gpu.height());
        let capacity = pool_capacity(width, height, max_nodes_per_pixel);
        let device = &gpu.device;

        // One extra record: indices are one-based, slot 0 stays unused.
        let node_bytes = (capacity as u64 + 1) * std::mem::size_of::<GpuNode>() as u64;
        let head_bytes = (width as u64 * height as u64) * 4;

        log::debug!(
            "fragment lists: {}x{} pixels, {} nodes ({} MiB pool)",
            width,
            height,
            capacity,
            node_bytes / (1024 * 1024),
        );

        let params = ListParams {
            width,
            height,
            capacity,
            max_nodes_per_pixel,
        };
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("List Params"),
            size: std::mem::size_of::<ListParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue
            .write_buffer(&params_buffer, 0, bytemuck::cast_slice(&[params]));

        let heads = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("List Heads"),
            size: head_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let nodes = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("List Node Pool"),
            size: node_bytes,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let counter = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("List Allocation Counter"),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("List Counter Readback"),
            size: 4,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let gather_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("List Gather Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, false),
                storage_entry(2, false),
                storage_entry(3, false),
            ],
        });

        let resolve_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("List Resolve Bind Group Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, true),
            ],
        });

        let gather_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("List Gather Bind Group"),
            layout: &gather_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: heads.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: nodes.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: counter.as_entire_binding(),
                },
            ],
        });

        let resolve_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("List Resolve Bind Group"),
            layout: &resolve_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: heads.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: nodes.as_entire_binding(),
                },
            ],
        });

        Self {
            params_buffer,
            heads,
            nodes,
            counter,
            readback,
            gather_layout,
            resolve_layout,
            gather_bind_group,
            resolve_bind_group,
            size: (width, height),
            max_nodes_per_pixel,
        }
    }

    /// Checks the surface size and reallocates everything if it changed.
    ///
    /// Must be called between frames, never while a frame is encoded:
    /// capacity depends on the pixel count, so a resize tears down and
    /// recreates all buffers and bind groups.
    pub fn ensure_size(&mut self, gpu: &GpuContext) {
        if self.size != (gpu.width(), gpu.height()) {
            *self = Self::new(gpu, self.max_nodes_per_pixel);
        }
    }

    /// Encodes the per-frame reset: every head pointer becomes the
    /// sentinel and the allocation counter returns to zero.
    ///
    /// Both buffers zero-fill (the sentinel is 0), and wgpu orders these
    /// clear writes before the storage access of any later pass on the
    /// same encoder — the gather pass never observes a stale head.
    pub fn reset(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(&self.heads, 0, None);
        encoder.clear_buffer(&self.counter, 0, None);
    }

    /// Reads back the allocation counter from the last submitted frame.
    ///
    /// Blocks on the GPU, so this is a diagnostic tool, not a per-frame
    /// fast path. Returns `None` if the readback mapping fails.
    pub fn stats(&self, gpu: &GpuContext) -> Option<ListStats> {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("List Stats Readback"),
            });
        encoder.copy_buffer_to_buffer(&self.counter, 0, &self.readback, 0, 4);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = self.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = gpu.device.poll(wgpu::PollType::wait_indefinitely());

        match rx.recv() {
            Ok(Ok(())) => {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&slice.get_mapped_range()[..4]);
                self.readback.unmap();
                Some(ListStats {
                    attempted: u32::from_le_bytes(bytes),
                    capacity: self.capacity(),
                })
            }
            _ => {
                log::warn!("counter readback failed");
                None
            }
        }
    }

    /// Usable pool slots at the current size.
    pub fn capacity(&self) -> u32 {
        pool_capacity(self.size.0, self.size.1, self.max_nodes_per_pixel)
    }

    pub(crate) fn gather_layout(&self) -> &wgpu::BindGroupLayout {
        &self.gather_layout
    }

    pub(crate) fn resolve_layout(&self) -> &wgpu::BindGroupLayout {
        &self.resolve_layout
    }

    pub(crate) fn gather_bind_group(&self) -> &wgpu::BindGroup {
        &self.gather_bind_group
    }

    pub(crate) fn resolve_bind_group(&self) -> &wgpu::BindGroup {
        &self.resolve_bind_group
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_record_matches_wgsl_stride() {
        // The WGSL Node struct is three tightly packed 4-byte fields.
        assert_eq!(std::mem::size_of::<GpuNode>(), 12);
    }

    #[test]
    fn params_are_a_single_uniform_vec() {
        assert_eq!(std::mem::size_of::<ListParams>(), 16);
    }

    #[test]
    fn capacity_scales_with_pixels_and_depth() {
        assert_eq!(pool_capacity(4, 3, 20), 240);
        assert_eq!(pool_capacity(1, 1, 1), 1);
        assert_eq!(pool_capacity(0, 100, 20), 0);
    }

    #[test]
    fn dropped_is_zero_until_capacity_exceeded() {
        let stats = ListStats {
            attempted: 10,
            capacity: 10,
        };
        assert_eq!(stats.dropped(), 0);
        let stats = ListStats {
            attempted: 15,
            capacity: 10,
        };
        assert_eq!(stats.dropped(), 5);
    }
}
