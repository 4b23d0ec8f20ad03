//! Command line arguments trait and default implementation.
//!
//! Uses clap for CLI parsing on native targets with:
//! - Help text (`--help`)
//! - Validation and clear error messages

use vesper_graphics::{BackendKind, RenderSystemOptions, ThreadingMode};

use crate::options::WindowOptions;

/// Trait for application settings that may come from the command line.
///
/// Every method but `parse` has a default, so custom implementations only
/// override the options they need. `render_options` and `window_options`
/// assemble the option structs the app runner uses.
///
/// # Example
///
/// ```ignore
/// use vesper_app::AppArgs;
/// use vesper_graphics::BackendKind;
///
/// struct HeadlessArgs;
///
/// impl AppArgs for HeadlessArgs {
///     fn parse() -> Self {
///         Self
///     }
///
///     fn max_frames(&self) -> Option<u64> {
///         Some(10)
///     }
/// }
/// ```
pub trait AppArgs: Sized {
    /// Parse command line arguments.
    fn parse() -> Self;

    /// Default: `BackendKind::Software`
    fn backend(&self) -> BackendKind {
        BackendKind::Software
    }

    /// Default: `ThreadingMode::Dedicated`
    fn threading(&self) -> ThreadingMode {
        ThreadingMode::Dedicated
    }

    /// Default: false
    fn fullscreen(&self) -> bool {
        false
    }

    /// Default: 1280
    fn window_width(&self) -> u32 {
        1280
    }

    /// Default: 720
    fn window_height(&self) -> u32 {
        720
    }

    /// Default: "Vesper App"
    fn window_title(&self) -> &str {
        "Vesper App"
    }

    /// Frames to render before exiting on its own.
    ///
    /// Default: `None` (run until closed)
    fn max_frames(&self) -> Option<u64> {
        None
    }

    /// Texture decode threads, 0 picks a count from the CPU.
    fn loader_threads(&self) -> usize {
        0
    }

    /// Default: 8
    fn max_async_uploads_per_frame(&self) -> usize {
        8
    }

    /// Default: 1024
    fn event_capacity(&self) -> usize {
        1024
    }

    fn render_options(&self) -> RenderSystemOptions {
        RenderSystemOptions::default()
            .with_backend(self.backend())
            .with_threading(self.threading())
            .with_size(self.window_width(), self.window_height())
            .with_loader_threads(self.loader_threads())
            .with_max_async_uploads_per_frame(self.max_async_uploads_per_frame())
    }

    fn window_options(&self) -> WindowOptions {
        WindowOptions::default()
            .with_title(self.window_title())
            .with_size(self.window_width(), self.window_height())
            .with_fullscreen(self.fullscreen())
            .with_event_capacity(self.event_capacity())
    }
}

// ============================================================================
// CLI Enums
// ============================================================================

/// Renderer backend selection for CLI.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliBackend {
    /// CPU reference renderer.
    #[default]
    Software,
    /// No-op backend for testing and CI environments.
    Dummy,
}

#[cfg(not(target_arch = "wasm32"))]
impl From<CliBackend> for BackendKind {
    fn from(cli: CliBackend) -> Self {
        match cli {
            CliBackend::Software => BackendKind::Software,
            CliBackend::Dummy => BackendKind::Dummy,
        }
    }
}

/// Where render commands execute.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CliThreading {
    /// A dedicated render thread.
    #[default]
    Dedicated,
    /// On the main thread at frame boundaries.
    Inline,
}

#[cfg(not(target_arch = "wasm32"))]
impl From<CliThreading> for ThreadingMode {
    fn from(cli: CliThreading) -> Self {
        match cli {
            CliThreading::Dedicated => ThreadingMode::Dedicated,
            CliThreading::Inline => ThreadingMode::Inline,
        }
    }
}

// ============================================================================
// Default App Args
// ============================================================================

/// Default command line arguments implementation.
///
/// # Examples
///
/// ```bash
/// # Show help
/// ./my_app --help
///
/// # Render on the main thread with the dummy backend for 10 frames
/// ./my_app --backend dummy --threading inline --max-frames 10
/// ```
#[derive(Debug, Clone)]
pub struct DefaultAppArgs {
    backend: BackendKind,
    threading: ThreadingMode,
    fullscreen: bool,
    width: u32,
    height: u32,
    title: String,
    max_frames: Option<u64>,
    loader_threads: usize,
    max_async_uploads_per_frame: usize,
}

impl Default for DefaultAppArgs {
    fn default() -> Self {
        Self {
            backend: BackendKind::Software,
            threading: ThreadingMode::Dedicated,
            fullscreen: false,
            width: 1280,
            height: 720,
            title: "Vesper App".to_string(),
            max_frames: None,
            loader_threads: 0,
            max_async_uploads_per_frame: 8,
        }
    }
}

impl DefaultAppArgs {
    /// Create default args with a custom title.
    pub fn with_title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_threading(mut self, threading: ThreadingMode) -> Self {
        self.threading = threading;
        self
    }

    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use super::*;
    use clap::Parser;

    /// Vesper application arguments.
    #[derive(Parser, Debug)]
    #[command(
        name = "Vesper App",
        about = "Vesper rendering application",
        long_about = "A windowed application rendering through Vesper.\n\n\
            EXAMPLES:\n\
              # Software renderer on a dedicated render thread (default)\n\
              ./app\n\
            \n\
              # Run headless test\n\
              ./app --backend dummy --max-frames 10",
        version
    )]
    pub(super) struct ClapArgs {
        /// Renderer backend to use.
        #[arg(long, default_value = "software", value_enum)]
        pub backend: CliBackend,

        /// Where render commands execute.
        #[arg(long, default_value = "dedicated", value_enum)]
        pub threading: CliThreading,

        /// Run in borderless fullscreen mode.
        #[arg(long)]
        pub fullscreen: bool,

        /// Initial window width in pixels.
        #[arg(long, default_value = "1280")]
        pub width: u32,

        /// Initial window height in pixels.
        #[arg(long, default_value = "720")]
        pub height: u32,

        /// Exit after rendering N frames (useful for testing).
        #[arg(long)]
        pub max_frames: Option<u64>,

        /// Texture decode threads (0 = automatic).
        #[arg(long, default_value = "0")]
        pub loader_threads: usize,

        /// Decoded textures uploaded per frame (0 = unlimited).
        #[arg(long, default_value = "8")]
        pub max_async_uploads: usize,
    }

    impl From<ClapArgs> for DefaultAppArgs {
        fn from(args: ClapArgs) -> Self {
            Self {
                backend: args.backend.into(),
                threading: args.threading.into(),
                fullscreen: args.fullscreen,
                width: args.width,
                height: args.height,
                title: "Vesper App".to_string(),
                max_frames: args.max_frames,
                loader_threads: args.loader_threads,
                max_async_uploads_per_frame: args.max_async_uploads,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parses_flags() {
            let args = ClapArgs::try_parse_from([
                "app",
                "--backend",
                "dummy",
                "--threading",
                "inline",
                "--max-frames",
                "3",
                "--width",
                "320",
            ])
            .unwrap();
            let args = DefaultAppArgs::from(args);
            assert_eq!(args.backend(), BackendKind::Dummy);
            assert_eq!(args.threading(), ThreadingMode::Inline);
            assert_eq!(args.max_frames(), Some(3));

            let render = args.render_options();
            assert_eq!((render.width, render.height), (320, 720));
            assert_eq!(args.window_options().width, 320);
        }

        #[test]
        fn rejects_unknown_backend() {
            assert!(ClapArgs::try_parse_from(["app", "--backend", "vulkan"]).is_err());
        }
    }
}

impl AppArgs for DefaultAppArgs {
    fn parse() -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        {
            use clap::Parser;
            native::ClapArgs::parse().into()
        }

        #[cfg(target_arch = "wasm32")]
        {
            Self::default()
        }
    }

    fn backend(&self) -> BackendKind {
        self.backend
    }

    fn threading(&self) -> ThreadingMode {
        self.threading
    }

    fn fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn window_width(&self) -> u32 {
        self.width
    }

    fn window_height(&self) -> u32 {
        self.height
    }

    fn window_title(&self) -> &str {
        &self.title
    }

    fn max_frames(&self) -> Option<u64> {
        self.max_frames
    }

    fn loader_threads(&self) -> usize {
        self.loader_threads
    }

    fn max_async_uploads_per_frame(&self) -> usize {
        self.max_async_uploads_per_frame
    }
}
