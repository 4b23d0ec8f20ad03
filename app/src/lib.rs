//! # Vesper App
//!
//! Window event queue and application runner for Vesper.
//!
//! ## Overview
//!
//! - [`Window`] - Collects events from platform threads and replays them
//!   once per frame, merging redundant ones and emulating a mouse from
//!   single touches
//! - [`EventSender`] - Cloneable, non-blocking producer handle
//! - [`WindowHandler`] / [`AppHandler`] - Callbacks for events and frames
//! - [`App`] - winit event loop driving a window and a
//!   [`RenderSystem`](vesper_graphics::RenderSystem)
//! - [`AppArgs`] - Command line options mapped onto the option structs
//!
//! ## Example
//!
//! ```ignore
//! use vesper_app::{Window, WindowHandler, WindowOptions};
//!
//! struct Logger;
//!
//! impl WindowHandler for Logger {
//!     fn on_event(&mut self, event: &WindowEvent) {
//!         log::info!("{:?}", event);
//!     }
//! }
//!
//! let mut window = Window::new(WindowOptions::default());
//! let sender = window.sender();
//! std::thread::spawn(move || sender.queue_focus_change(false));
//! window.update(0.016, &mut Logger);
//! ```

mod app;
mod args;
mod clock;
mod error;
pub mod event;
mod handler;
mod logging;
mod options;
pub mod platform;
mod queue;
mod window;

pub use app::App;
pub use args::{AppArgs, DefaultAppArgs};
pub use clock::FrameClock;
pub use error::AppError;
pub use event::{
    ControllerEvent, ControllerEventKind, GenericEvent, KeyEvent, KeyEventKind, MotionEvent,
    MotionEventKind, MouseEvent, MouseEventKind, TouchEvent, TouchEventKind, WindowEvent,
};
pub use handler::{AppHandler, WindowHandler};
pub use logging::init_logging;
pub use options::WindowOptions;
pub use queue::EventSender;
pub use window::{Window, WindowState};

static_assertions::assert_impl_all!(Window: Send);

/// App library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the crate version once the logger is up.
pub fn init() {
    log::info!("Vesper App v{} initialized", VERSION);
}
