//! Core GPU context and device management.
//!
//! This module provides [`GpuContext`], the struct that holds the wgpu
//! resources shared by every pass: device, queue, surface, and surface
//! configuration.
//!
//! Unlike a general-purpose renderer, this crate has a hard hardware
//! requirement: the fragment stage must be able to perform atomic
//! read-modify-write operations on storage buffers, because list building
//! splices nodes with `atomicExchange` from fragment shaders. Adapters that
//! cannot do this (for example WebGL2-class downlevel targets) are rejected
//! at startup — see [`InitError::FragmentStorageUnsupported`].

use std::sync::Arc;
use winit::window::Window;

/// The number of fragment-stage storage buffers list building binds
/// (head pointers, node pool, allocation counter).
const REQUIRED_FRAGMENT_STORAGE_BUFFERS: u32 = 3;

/// Errors raised while bringing up the GPU.
///
/// All of these are fatal: they are reported before any frame is rendered
/// and the subsystem refuses to initialize.
#[derive(Debug)]
pub enum InitError {
    /// No suitable GPU adapter was found.
    NoAdapter,
    /// The adapter cannot write storage buffers from the fragment stage,
    /// or exposes too few fragment-stage storage buffer bindings.
    FragmentStorageUnsupported,
    /// The surface could not be created for the window.
    Surface(wgpu::CreateSurfaceError),
    /// Device creation failed.
    Device(wgpu::RequestDeviceError),
}

impl std::fmt::Display for InitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitError::NoAdapter => write!(f, "no suitable GPU adapter found"),
            InitError::FragmentStorageUnsupported => write!(
                f,
                "adapter cannot write storage buffers from the fragment stage \
                 (required for per-pixel list building)"
            ),
            InitError::Surface(e) => write!(f, "surface creation failed: {}", e),
            InitError::Device(e) => write!(f, "device creation failed: {}", e),
        }
    }
}

impl std::error::Error for InitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InitError::Surface(e) => Some(e),
            InitError::Device(e) => Some(e),
            _ => None,
        }
    }
}

/// Core GPU context holding wgpu resources.
///
/// Created once at startup and passed by reference to all passes. All
/// fields are public to allow direct access to wgpu APIs when needed.
pub struct GpuContext {
    /// The surface for presenting rendered frames to the window.
    pub surface: wgpu::Surface<'static>,
    /// The logical GPU device for creating resources and pipelines.
    pub device: wgpu::Device,
    /// The command queue for submitting work to the GPU.
    pub queue: wgpu::Queue,
    /// Current surface configuration (format, size, present mode).
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Create a new GPU context from a winit window.
    ///
    /// Performs the usual wgpu bring-up (instance, surface, adapter,
    /// device, surface configuration), then verifies the adapter can
    /// service fragment-stage storage atomics. Returns an error rather
    /// than a context if it cannot; callers should treat every variant
    /// as fatal.
    pub fn new(window: Arc<Window>) -> Result<Self, InitError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window).map_err(InitError::Surface)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|_| InitError::NoAdapter)?;

        let info = adapter.get_info();
        log::info!("using adapter: {} ({:?})", info.name, info.backend);

        let downlevel = adapter.get_downlevel_capabilities();
        let adapter_limits = adapter.limits();
        if !downlevel
            .flags
            .contains(wgpu::DownlevelFlags::FRAGMENT_WRITABLE_STORAGE)
            || adapter_limits.max_storage_buffers_per_shader_stage
                < REQUIRED_FRAGMENT_STORAGE_BUFFERS
        {
            return Err(InitError::FragmentStorageUnsupported);
        }

        // The node pool scales with resolution and can outgrow the default
        // 256 MiB buffer ceiling, so take the adapter's real limits for
        // buffer sizes and keep defaults for everything else.
        let limits = wgpu::Limits {
            max_buffer_size: adapter_limits.max_buffer_size,
            max_storage_buffer_binding_size: adapter_limits.max_storage_buffer_binding_size,
            ..wgpu::Limits::default()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Phalanx Device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits,
            memory_hints: Default::default(),
            trace: Default::default(),
            experimental_features: Default::default(),
        }))
        .map_err(InitError::Device)?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
        })
    }

    /// Resize the surface to new dimensions.
    ///
    /// Call this when the window is resized. Ignores zero-sized dimensions
    /// to avoid wgpu validation errors during window minimize. The list
    /// buffers are not touched here; they are reallocated lazily at the
    /// start of the next frame, never while one is in flight.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    /// Returns the current surface width in pixels.
    pub fn width(&self) -> u32 {
        self.config.width
    }

    /// Returns the current surface height in pixels.
    pub fn height(&self) -> u32 {
        self.config.height
    }

    /// Returns the current aspect ratio (width / height).
    pub fn aspect(&self) -> f32 {
        self.config.width as f32 / self.config.height as f32
    }
}
