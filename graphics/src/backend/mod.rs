//! Device backend abstraction layer.
//!
//! Every backend implements the narrow [`Device`] capability interface.
//! [`Backend`] is the closed set of available variants, chosen at startup
//! from a [`BackendKind`] value.
//!
//! # Available Backends
//!
//! - `Dummy` (default): no-op device for testing and headless runs
//! - `Software`: CPU reference device that keeps texture memory, a
//!   framebuffer and a pipeline cache
//!
//! Device hooks are only ever called from the render thread that owns the
//! [`Backend`].

pub mod dummy;
pub mod software;
mod stats;

use std::sync::Arc;

use vesper_core::{Color, CpuImage, Mat4, PixelFormat, Rect};

use crate::error::GraphicsError;
use crate::state::{AddressMode, BlendMode, ColorMode, PipelineKey, Primitive, TextureFilter};
use crate::vertex::Vertices;

pub use dummy::DummyDevice;
pub use software::SoftwareDevice;
pub use stats::{DeviceStats, Hook, HookCounts};

/// Backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    #[default]
    Dummy,
    Software,
}

/// Opaque handle to a device texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceTexture(u64);

impl DeviceTexture {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Parameters of a device texture allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub render_target: bool,
}

impl TextureDescriptor {
    pub fn byte_size(&self) -> usize {
        CpuImage::byte_size(self.width, self.height, self.format)
    }
}

/// Texture bound for sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    pub handle: DeviceTexture,
    pub filter: TextureFilter,
    pub address_mode: AddressMode,
}

/// The capability interface every backend implements.
///
/// Hooks report [`GraphicsError::DeviceLost`] when the device must be reset,
/// and [`GraphicsError::OutOfMemory`] when an allocation failed.
pub trait Device: Send {
    fn name(&self) -> &'static str;

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<DeviceTexture, GraphicsError>;
    fn destroy_texture(&mut self, handle: DeviceTexture);
    /// The one full upload of a texture's pixels.
    fn upload_texture(&mut self, handle: DeviceTexture, image: &CpuImage)
        -> Result<(), GraphicsError>;
    /// Partial re-upload of modified CPU pixels at `(x, y)`.
    fn update_texture(
        &mut self,
        handle: DeviceTexture,
        x: u32,
        y: u32,
        image: &CpuImage,
    ) -> Result<(), GraphicsError>;
    fn read_texture(&mut self, handle: DeviceTexture) -> Result<CpuImage, GraphicsError>;

    fn set_viewport(&mut self, viewport: Rect) -> Result<(), GraphicsError>;
    fn set_modelview_matrix(&mut self, matrix: &Mat4) -> Result<(), GraphicsError>;
    fn set_projection_matrix(&mut self, matrix: &Mat4) -> Result<(), GraphicsError>;
    fn set_depth_buffer(&mut self, enabled: bool, write: bool) -> Result<(), GraphicsError>;
    fn set_texture(&mut self, binding: Option<TextureBinding>) -> Result<(), GraphicsError>;
    fn set_blend_mode(&mut self, mode: BlendMode) -> Result<(), GraphicsError>;
    fn set_color_mode(&mut self, mode: ColorMode, factor: f32) -> Result<(), GraphicsError>;
    fn set_render_target(&mut self, target: Option<DeviceTexture>) -> Result<(), GraphicsError>;

    fn clear(&mut self, color: Color, depth: bool) -> Result<(), GraphicsError>;
    fn draw(
        &mut self,
        primitive: Primitive,
        vertices: &Vertices,
        key: PipelineKey,
        system_color: Color,
    ) -> Result<(), GraphicsError>;
    fn present(&mut self) -> Result<(), GraphicsError>;
    fn read_framebuffer(&mut self) -> Result<CpuImage, GraphicsError>;

    /// Recreate the device after a loss. All handles become invalid.
    fn reset(&mut self) -> Result<(), GraphicsError>;
}

/// The available device backends.
#[derive(Debug)]
pub enum Backend {
    Dummy(DummyDevice),
    Software(SoftwareDevice),
}

impl Backend {
    /// Create the backend selected by `kind`.
    pub fn new(
        kind: BackendKind,
        width: u32,
        height: u32,
        memory_budget: Option<usize>,
        stats: Arc<DeviceStats>,
    ) -> Self {
        log::info!("Creating {:?} backend ({}x{})", kind, width, height);
        match kind {
            BackendKind::Dummy => Self::Dummy(DummyDevice::new(stats)),
            BackendKind::Software => {
                Self::Software(SoftwareDevice::new(width, height, memory_budget, stats))
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Dummy(_) => BackendKind::Dummy,
            Self::Software(_) => BackendKind::Software,
        }
    }

    /// The active variant as the capability interface.
    pub fn device(&mut self) -> &mut dyn Device {
        match self {
            Self::Dummy(device) => device,
            Self::Software(device) => device,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Dummy(device) => device.name(),
            Self::Software(device) => device.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::dummy(BackendKind::Dummy, "Dummy")]
    #[case::software(BackendKind::Software, "Software")]
    fn backend_selection(#[case] kind: BackendKind, #[case] name: &str) {
        let mut backend = Backend::new(kind, 8, 8, None, Arc::new(DeviceStats::new()));
        assert_eq!(backend.kind(), kind);
        assert_eq!(backend.name(), name);
        assert_eq!(backend.device().name(), name);
    }

    #[rstest]
    #[case::dummy(BackendKind::Dummy)]
    #[case::software(BackendKind::Software)]
    fn texture_lifecycle_is_counted(#[case] kind: BackendKind) {
        let stats = Arc::new(DeviceStats::new());
        let mut backend = Backend::new(kind, 8, 8, None, stats.clone());
        let device = backend.device();
        let desc = TextureDescriptor {
            label: "t".into(),
            width: 2,
            height: 2,
            format: PixelFormat::Rgba8,
            render_target: false,
        };
        let handle = device.create_texture(&desc).unwrap();
        device
            .upload_texture(handle, &CpuImage::new(2, 2, PixelFormat::Rgba8))
            .unwrap();
        device.destroy_texture(handle);

        assert_eq!(stats.count(Hook::CreateTexture), 1);
        assert_eq!(stats.count(Hook::UploadTexture), 1);
        assert_eq!(stats.count(Hook::DestroyTexture), 1);
    }

    #[rstest]
    #[case::dummy(BackendKind::Dummy)]
    #[case::software(BackendKind::Software)]
    fn injected_allocation_failure(#[case] kind: BackendKind) {
        let stats = Arc::new(DeviceStats::new());
        let mut backend = Backend::new(kind, 8, 8, None, stats.clone());
        stats.fail_allocations(1);
        let desc = TextureDescriptor {
            label: "t".into(),
            width: 1,
            height: 1,
            format: PixelFormat::Rgba8,
            render_target: false,
        };
        assert!(matches!(
            backend.device().create_texture(&desc),
            Err(GraphicsError::OutOfMemory)
        ));
        assert!(backend.device().create_texture(&desc).is_ok());
    }
}
