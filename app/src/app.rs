//! Main application struct and event loop.

use winit::application::ApplicationHandler;
use winit::event::WindowEvent as PlatformEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::window::WindowId;

use vesper_core::Rect;
use vesper_graphics::RenderSystem;

use crate::args::AppArgs;
use crate::clock::FrameClock;
use crate::error::AppError;
use crate::handler::AppHandler;
use crate::platform::PlatformInput;
use crate::window::Window;

/// Runs an [`AppHandler`] inside a winit event loop.
///
/// The OS window feeds events into a [`Window`]; every redraw updates the
/// window, lets the handler record a frame through the [`RenderSystem`]
/// and presents it.
///
/// # Example
///
/// ```ignore
/// use vesper_app::{App, AppArgs, DefaultAppArgs};
///
/// fn main() -> Result<(), vesper_app::AppError> {
///     App::run(MyApp::default(), DefaultAppArgs::parse())
/// }
/// ```
pub struct App<H, A>
where
    H: AppHandler,
    A: AppArgs,
{
    handler: H,
    args: A,
    window: Window,
    input: PlatformInput,
    os_window: Option<winit::window::Window>,
    renderer: Option<RenderSystem>,
    clock: FrameClock,
    frames: u64,
    error: Option<AppError>,
}

impl<H, A> App<H, A>
where
    H: AppHandler + 'static,
    A: AppArgs + 'static,
{
    pub fn new(handler: H, args: A) -> Self {
        let options = args.window_options();
        let fullscreen = options.fullscreen;
        let window = Window::new(options);
        let input = PlatformInput::new(window.sender(), fullscreen);
        Self {
            handler,
            args,
            window,
            input,
            os_window: None,
            renderer: None,
            clock: FrameClock::new(),
            frames: 0,
            error: None,
        }
    }

    /// Create the event loop and run until the window closes.
    pub fn run(handler: H, args: A) -> Result<(), AppError> {
        crate::init_logging();
        vesper_core::init();
        vesper_graphics::init();
        crate::init();

        let event_loop = EventLoop::new()?;
        let mut app = Self::new(handler, args);
        event_loop.run_app(&mut app)?;
        match app.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn init_renderer(&mut self, width: u32, height: u32) -> Result<(), AppError> {
        let options = self.args.render_options().with_size(width, height);
        let mut renderer = RenderSystem::new(options)?;

        let sender = self.window.sender();
        renderer.set_low_memory_callback(move || {
            sender.queue_low_memory_warning();
        });

        log::info!(
            "Renderer initialized: {} backend ({}x{})",
            renderer.backend_name(),
            width,
            height
        );
        self.handler.on_init(&mut renderer, &self.window);
        self.renderer = Some(renderer);
        Ok(())
    }

    /// Update the window and draw one frame. Returns `false` to quit.
    fn render_frame(&mut self) -> bool {
        let Some(renderer) = self.renderer.as_mut() else {
            return true;
        };
        let delta_time = self.clock.tick();

        if !self.window.update(delta_time, &mut self.handler) {
            return false;
        }
        renderer.update(delta_time);

        let (width, height) = self.window.size();
        let viewport = Rect::from_size(width, height);
        if width > 0 && height > 0 && renderer.state().viewport != viewport {
            renderer.set_viewport(viewport);
        }

        self.handler.on_draw(renderer, &self.window);
        self.window.deliver_screenshot(renderer);
        renderer.present_frame();
        self.frames += 1;

        if let Some(max_frames) = self.args.max_frames() {
            if self.frames >= max_frames {
                log::info!("Reached max frames limit ({}), exiting", max_frames);
                return false;
            }
        }
        true
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut renderer) = self.renderer.take() {
            self.handler.on_shutdown(&mut renderer);
            renderer.shutdown();
            log::info!(
                "Shut down after {} frames ({} events dropped)",
                self.frames,
                self.window.dropped_events()
            );
        }
        event_loop.exit();
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: AppError) {
        log::error!("{}", err);
        self.error = Some(err);
        event_loop.exit();
    }
}

impl<H, A> ApplicationHandler for App<H, A>
where
    H: AppHandler + 'static,
    A: AppArgs + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        self.window.sender().queue_activity_change(true);
        if self.os_window.is_some() {
            return;
        }

        let options = self.window.options().clone();
        let mut attributes = winit::window::Window::default_attributes()
            .with_title(options.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(options.width, options.height));
        if options.fullscreen {
            attributes =
                attributes.with_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
        }

        let os_window = match event_loop.create_window(attributes) {
            Ok(window) => window,
            Err(err) => {
                self.fail(event_loop, AppError::WindowCreation(err.to_string()));
                return;
            }
        };
        let size = os_window.inner_size();
        log::info!("Window created ({}x{} physical)", size.width, size.height);
        self.window
            .sender()
            .queue_size_change(size.width, size.height, options.fullscreen);
        self.os_window = Some(os_window);

        if let Err(err) = self.init_renderer(size.width.max(1), size.height.max(1)) {
            self.fail(event_loop, err);
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.window.sender().queue_activity_change(false);
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: PlatformEvent) {
        self.input.translate(&event);

        match event {
            PlatformEvent::RedrawRequested => {
                if !self.render_frame() {
                    self.shutdown(event_loop);
                } else if let Some(window) = &self.os_window {
                    window.request_redraw();
                }
            }
            PlatformEvent::Destroyed => self.shutdown(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.os_window {
            window.request_redraw();
        }
    }
}
