//! Application handler traits.

use vesper_graphics::RenderSystem;

use crate::event::WindowEvent;
use crate::window::Window;

/// Receives the events a [`Window`] dispatches during
/// [`Window::update`].
///
/// Every method has a default, so implementors only override what they
/// care about.
pub trait WindowHandler {
    /// Called once per dispatched event, after the window updated its own
    /// state from it.
    fn on_event(&mut self, _event: &WindowEvent) {}

    /// Called for each quit request. Returning `true` accepts it and stops
    /// the window. A request with `can_reject == false` stops the window
    /// whatever this returns.
    fn on_quit_request(&mut self, _can_reject: bool) -> bool {
        true
    }

    /// Called once per update after all events were dispatched.
    /// Returning `false` stops the window.
    fn on_update(&mut self, _time_delta: f32) -> bool {
        true
    }
}

/// A windowed application driven by [`App`](crate::App).
///
/// # Lifecycle
///
/// 1. `on_init` - once, after the window and renderer exist
/// 2. per frame: window events and `on_update` (from [`WindowHandler`]),
///    then `on_draw`
/// 3. `on_shutdown` - once, before the renderer shuts down
///
/// # Example
///
/// ```ignore
/// use vesper_app::{App, AppHandler, DefaultAppArgs, Window, WindowHandler};
/// use vesper_graphics::RenderSystem;
///
/// struct Demo;
///
/// impl WindowHandler for Demo {}
///
/// impl AppHandler for Demo {
///     fn on_draw(&mut self, renderer: &mut RenderSystem, window: &Window) {
///         renderer.clear_color(Color::BLACK, false);
///     }
/// }
/// ```
pub trait AppHandler: WindowHandler {
    fn on_init(&mut self, _renderer: &mut RenderSystem, _window: &Window) {}

    /// Record the frame's draw calls. The app presents afterwards.
    fn on_draw(&mut self, renderer: &mut RenderSystem, window: &Window);

    fn on_shutdown(&mut self, _renderer: &mut RenderSystem) {}
}
