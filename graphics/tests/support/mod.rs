//! Shared helpers for the render system integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use vesper_graphics::{BackendKind, RenderSystem, RenderSystemOptions, ThreadingMode};

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn options(backend: BackendKind, threading: ThreadingMode) -> RenderSystemOptions {
    RenderSystemOptions::new()
        .with_backend(backend)
        .with_threading(threading)
        .with_size(16, 16)
        .with_loader_threads(2)
}

pub fn render_system(backend: BackendKind, threading: ThreadingMode) -> RenderSystem {
    init_logging();
    RenderSystem::new(options(backend, threading)).expect("render system")
}

/// Write a PNG whose pixel `(x, y)` is `(x * 16, y * 16, 200, 255)` and
/// return its path.
pub fn write_test_png(name: &str, width: u32, height: u32) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let dir = std::env::temp_dir().join(format!(
        "vesper-tests-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    std::fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join(format!("{name}.png"));
    let image = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x * 16) as u8, (y * 16) as u8, 200, 255])
    });
    image.save(&path).expect("write png");
    path
}

/// Expected color of [`write_test_png`] at `(x, y)`.
pub fn test_png_pixel(x: u32, y: u32) -> vesper_core::Color {
    vesper_core::Color::new((x * 16) as u8, (y * 16) as u8, 200, 255)
}
