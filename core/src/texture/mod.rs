//! CPU-side image types.
//!
//! Provides [`CpuImage`] for holding raw pixel data with its pixel
//! operations, the [`PixelFormat`] enum shared between CPU and device code,
//! and decoding through the `image` crate.

mod cpu;
mod decode;
mod format;

pub use cpu::CpuImage;
pub use decode::{load, load_as, load_from_memory, probe, ImageInfo};
pub use format::PixelFormat;
