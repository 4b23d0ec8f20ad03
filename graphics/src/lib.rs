//! # Vesper Graphics
//!
//! Deferred 2D/3D renderer with streamed textures.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`RenderSystem`] - Application-facing renderer that records commands
//!   into per-frame queues executed by a single render thread
//! - [`Texture`] - Textures that decode in the background and upload under
//!   a per-frame budget
//! - [`Backend`] - Closed set of device variants behind the [`Device`]
//!   capability interface: Dummy (counts hooks, injects faults) and Software
//!
//! ## Threading
//!
//! The application thread owns the [`RenderSystem`] and mutates the logical
//! [`RenderState`]. Exactly one thread executes commands and touches the
//! device. A small pool of loader threads decodes image files.
//!
//! ## Example
//!
//! ```ignore
//! use vesper_graphics::{RenderSystem, RenderSystemOptions};
//!
//! let mut renderer = RenderSystem::new(RenderSystemOptions::default())?;
//! renderer.clear_color(Color::BLACK, true);
//! renderer.draw_filled_rect(RectF::new(10.0, 10.0, 100.0, 50.0), Color::RED);
//! renderer.present_frame();
//! ```

pub mod backend;
pub mod command;
mod context;
pub mod error;
pub mod options;
pub mod state;
pub mod stats;
mod system;
pub mod texture;
pub mod vertex;

pub use backend::{Backend, BackendKind, Device, DeviceStats, DeviceTexture, Hook, HookCounts};
pub use command::{AsyncCommand, AsyncCommandQueue, FnCommand};
pub use context::DeviceContext;
pub use error::GraphicsError;
pub use options::{RenderSystemOptions, ThreadingMode};
pub use state::{
    AddressMode, BlendMode, ColorMode, PipelineKey, Primitive, PrimitiveClass, RenderState,
    StateChanges, TextureFilter,
};
pub use stats::RenderStatistics;
pub use system::RenderSystem;
pub use texture::{LoadMode, LoadState, Texture, TextureData, TextureId, TextureKind};
pub use vertex::{ColoredTexturedVertex, ColoredVertex, PlainVertex, TexturedVertex, Vertex, Vertices};

static_assertions::assert_impl_all!(Texture: Send, Sync);
static_assertions::assert_impl_all!(DeviceContext: Send);
static_assertions::assert_impl_all!(DeviceStats: Send, Sync);

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the crate version once the logger is up.
pub fn init() {
    log::info!("Vesper Graphics v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
