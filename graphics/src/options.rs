//! Render system configuration.

use std::time::Duration;

use crate::backend::BackendKind;

/// Where queued commands are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ThreadingMode {
    /// A dedicated render thread owns the device and drains the queue.
    #[default]
    Dedicated,
    /// Queued commands run on the calling thread at flush points.
    Inline,
}

/// Options for [`crate::RenderSystem::new`].
///
/// # Example
///
/// ```ignore
/// let options = RenderSystemOptions::new()
///     .with_backend(BackendKind::Software)
///     .with_max_async_uploads_per_frame(2)
///     .with_max_waiting_async_textures(8);
/// let render_system = RenderSystem::new(options)?;
/// ```
#[derive(Debug, Clone)]
pub struct RenderSystemOptions {
    pub backend: BackendKind,
    pub threading: ThreadingMode,
    /// Initial viewport and framebuffer size.
    pub width: u32,
    pub height: u32,
    /// Async texture uploads performed per frame. 0 means unlimited.
    pub max_async_uploads_per_frame: usize,
    /// Decoded-but-not-uploaded textures allowed at once. 0 means unlimited.
    pub max_waiting_async_textures: usize,
    /// Background decoder threads. 0 picks a count from the CPU count.
    pub loader_threads: usize,
    /// Extensions tried, in order, when a texture name has no matching file.
    pub texture_extensions: Vec<String>,
    /// Closed frames allowed to wait for the render thread before
    /// `flush_frame` blocks.
    pub max_pending_frames: usize,
    /// How long pixel access waits for an in-flight async load.
    pub async_load_timeout: Duration,
    /// Unload file-backed textures that were not bound for this long.
    pub idle_texture_unload_time: Option<Duration>,
    /// Device memory budget of the software backend, in bytes.
    pub memory_budget: Option<usize>,
}

impl Default for RenderSystemOptions {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            threading: ThreadingMode::default(),
            width: 1024,
            height: 768,
            max_async_uploads_per_frame: 8,
            max_waiting_async_textures: 32,
            loader_threads: 0,
            texture_extensions: vec![".png".into(), ".jpg".into(), ".jpeg".into(), ".bmp".into()],
            max_pending_frames: 2,
            async_load_timeout: Duration::from_secs(5),
            idle_texture_unload_time: None,
            memory_budget: None,
        }
    }
}

impl RenderSystemOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_threading(mut self, threading: ThreadingMode) -> Self {
        self.threading = threading;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_max_async_uploads_per_frame(mut self, count: usize) -> Self {
        self.max_async_uploads_per_frame = count;
        self
    }

    pub fn with_max_waiting_async_textures(mut self, count: usize) -> Self {
        self.max_waiting_async_textures = count;
        self
    }

    pub fn with_loader_threads(mut self, count: usize) -> Self {
        self.loader_threads = count;
        self
    }

    pub fn with_texture_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.texture_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_pending_frames(mut self, count: usize) -> Self {
        self.max_pending_frames = count;
        self
    }

    pub fn with_async_load_timeout(mut self, timeout: Duration) -> Self {
        self.async_load_timeout = timeout;
        self
    }

    pub fn with_idle_texture_unload_time(mut self, time: Option<Duration>) -> Self {
        self.idle_texture_unload_time = time;
        self
    }

    pub fn with_memory_budget(mut self, bytes: Option<usize>) -> Self {
        self.memory_budget = bytes;
        self
    }

    /// Loader thread count after resolving the automatic setting.
    pub fn resolved_loader_threads(&self) -> usize {
        if self.loader_threads > 0 {
            return self.loader_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let options = RenderSystemOptions::new()
            .with_backend(BackendKind::Software)
            .with_threading(ThreadingMode::Inline)
            .with_texture_extensions([".webp"])
            .with_loader_threads(3);
        assert_eq!(options.backend, BackendKind::Software);
        assert_eq!(options.threading, ThreadingMode::Inline);
        assert_eq!(options.texture_extensions, vec![".webp".to_string()]);
        assert_eq!(options.resolved_loader_threads(), 3);
    }

    #[test]
    fn automatic_loader_threads_is_bounded() {
        let n = RenderSystemOptions::default().resolved_loader_threads();
        assert!((1..=4).contains(&n));
    }
}
