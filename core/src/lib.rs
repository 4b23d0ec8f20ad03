//! # Vesper Core
//!
//! Leaf data types shared by the rendering and windowing crates:
//! colors, rectangles, platform-agnostic input codes and CPU-side images.

pub mod color;
pub mod error;
pub mod input;
pub mod math;
pub mod texture;

pub use color::Color;
pub use error::CoreError;
pub use math::{Mat4, Rect, RectF, Vec2, Vec3};
pub use texture::{CpuImage, PixelFormat};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the crate version once the logger is up.
pub fn init() {
    log::info!("Vesper Core v{} initialized", VERSION);
}
