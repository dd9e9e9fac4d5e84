//! # Phalanx
//!
//! **Per-pixel linked-list order-independent transparency for wgpu.**
//!
//! Draw transparent geometry in any order; phalanx sorts it per pixel on
//! the GPU. Every fragment is recorded into a pool-backed linked list
//! during a gather pass, then a fullscreen resolve pass depth-sorts and
//! composites each pixel's list — no depth peeling, no CPU sorting, no
//! geometry order dependence.
//!
//! ## Quick Start
//!
//! ```no_run
//! use phalanx::*;
//! use glam::Vec3;
//!
//! fn main() {
//!     run(AppConfig::new().title("Glass"), |ctx| {
//!         let sphere = ctx.sphere();
//!         let cube = ctx.cube();
//!
//!         move |frame| {
//!             frame.draw(
//!                 sphere,
//!                 Transform::new().uniform_scale(2.0),
//!                 Color::rgb(0.9, 0.3, 0.2).with_alpha(0.5),
//!             );
//!             frame.draw(
//!                 cube,
//!                 Transform::from_position(Vec3::new(0.5, 0.0, -0.5)),
//!                 Color::rgb(0.2, 0.6, 0.9).with_alpha(0.4),
//!             );
//!         }
//!     });
//! }
//! ```
//!
//! ## How it works
//!
//! Each frame runs a fixed three-step sequence ([`Renderer::render`]):
//!
//! 1. **Reset** — the per-pixel head pointers and the allocation counter
//!    zero-fill; last frame's nodes are logically freed in O(1).
//! 2. **Gather** — transparent draws rasterize with color writes masked
//!    off. Every fragment atomically allocates a pool slot and exchanges
//!    itself into its pixel's list head.
//! 3. **Resolve** — a fullscreen pass walks each list (hard-capped),
//!    sorts by view-space depth, and composites front to back over the
//!    background.
//!
//! The pool holds [`RendererConfig::max_nodes_per_pixel`] nodes per pixel
//! (20 by default); when a frame demands more, the excess fragments are
//! dropped rather than crashing, and [`Renderer::stats`] reports how many.
//!
//! Fragment-stage storage atomics are a hard hardware requirement;
//! [`GpuContext::new`] refuses to initialize on adapters without them.
//!
//! ## Escape hatches
//!
//! Use [`run`] for a window in three lines, or drive [`Renderer`]
//! directly with your own encoder and target view. The algorithm itself
//! is also available on the CPU as [`soft::SoftLists`] for headless use
//! and testing.

mod app;
mod camera;
mod color;
mod gather;
mod geometry;
mod gpu;
mod lists;
mod mesh;
mod renderer;
mod resolve;
pub mod soft;

pub use app::{AppConfig, Frame, MeshHandle, SetupContext, run};
pub use camera::Camera;
pub use color::Color;
pub use gather::{DrawCall, GatherPass};
pub use geometry::{GeometryError, GeometryLoader, RawGeometry};
pub use gpu::{GpuContext, InitError};
pub use lists::{DEFAULT_MAX_NODES_PER_PIXEL, FragmentLists, ListStats, RendererConfig};
pub use mesh::{Mesh, Transform, Vertex};
pub use renderer::Renderer;
pub use resolve::ResolvePass;

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
