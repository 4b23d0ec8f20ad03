//! The window's event loop side.
//!
//! [`Window::update`] runs once per frame on the application thread. It
//! drains the event channel into per-type buffers, then dispatches outside
//! any shared state in the order generic, mouse, key, touch, touches,
//! controller, motion. Within a type, events keep their arrival order
//! except for these merges:
//!
//! - consecutive mouse `Scroll` events are summed into one
//! - consecutive `Move` events of the same pointer collapse to the last
//! - all `SizeChange` events of a frame dispatch once, with the last size
//! - all `LowMemoryWarning` events of a frame dispatch once
//!
//! A single touch is also reported as a left-button mouse. When a second
//! finger goes down the emulated mouse gets a `Cancel` and from then on only
//! full touch lists are dispatched, until every finger is lifted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;

use vesper_core::input::{InputMode, MouseButton};
use vesper_core::Vec2;
use vesper_graphics::RenderSystem;

use crate::event::{
    ControllerEvent, GenericEvent, KeyEvent, MotionEvent, MouseEvent, MouseEventKind, TouchEvent,
    TouchEventKind, WindowEvent,
};
use crate::handler::WindowHandler;
use crate::options::WindowOptions;
use crate::queue::{self, EventBuffers, EventSender};

/// State the window tracks from the events it dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowState {
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
    pub focused: bool,
    pub active: bool,
    pub cursor: Vec2,
    pub input_mode: InputMode,
    pub virtual_keyboard_visible: bool,
    pub virtual_keyboard_height_ratio: f32,
}

/// Consumer side of a window's event queue.
pub struct Window {
    options: WindowOptions,
    sender: EventSender,
    receiver: Receiver<WindowEvent>,
    buffers: EventBuffers,
    state: WindowState,
    touches: Vec<(u64, Vec2)>,
    multi_touch: bool,
    running: bool,
    screenshot_requested: AtomicBool,
}

impl Window {
    pub fn new(options: WindowOptions) -> Self {
        let (sender, receiver) = queue::channel(options.event_capacity);
        let state = WindowState {
            width: options.width,
            height: options.height,
            fullscreen: options.fullscreen,
            focused: true,
            active: true,
            cursor: Vec2::ZERO,
            input_mode: InputMode::Mouse,
            virtual_keyboard_visible: false,
            virtual_keyboard_height_ratio: 0.0,
        };
        log::debug!(
            "Window '{}' created ({}x{}, event capacity {})",
            options.title,
            options.width,
            options.height,
            options.event_capacity
        );
        Self {
            options,
            sender,
            receiver,
            buffers: EventBuffers::default(),
            state,
            touches: Vec::new(),
            multi_touch: false,
            running: true,
            screenshot_requested: AtomicBool::new(false),
        }
    }

    /// A producer handle for platform callbacks.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    pub fn options(&self) -> &WindowOptions {
        &self.options
    }

    pub fn title(&self) -> &str {
        &self.options.title
    }

    pub fn state(&self) -> &WindowState {
        &self.state
    }

    pub fn size(&self) -> (u32, u32) {
        (self.state.width, self.state.height)
    }

    pub fn input_mode(&self) -> InputMode {
        self.state.input_mode
    }

    /// Positions of the fingers currently down, in the order they touched.
    pub fn active_touches(&self) -> Vec<Vec2> {
        self.touches.iter().map(|(_, p)| *p).collect()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop the window. The next [`update`](Self::update) returns `false`.
    pub fn close(&mut self) {
        self.running = false;
    }

    /// Ask for a copy of the next drawn frame. It arrives as a
    /// [`GenericEvent::Screenshot`] on a following update.
    pub fn request_screenshot(&self) {
        self.screenshot_requested.store(true, Ordering::Release);
    }

    /// Capture a requested screenshot from `renderer` and queue it.
    ///
    /// Returns whether an image was queued.
    pub fn deliver_screenshot(&self, renderer: &RenderSystem) -> bool {
        if !self.screenshot_requested.swap(false, Ordering::AcqRel) {
            return false;
        }
        match renderer.take_screenshot() {
            Some(image) => self.sender.queue_screenshot(image),
            None => false,
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.sender.dropped_events()
    }

    /// Dispatch this frame's events, then call the handler's `on_update`.
    ///
    /// Returns whether the window is still running.
    pub fn update(&mut self, time_delta: f32, handler: &mut impl WindowHandler) -> bool {
        if !self.running {
            return false;
        }
        let mut frame = std::mem::take(&mut self.buffers);
        frame.drain(&self.receiver, self.options.event_capacity);

        self.dispatch_generic(&mut frame.generic, handler);
        self.dispatch_mouse(&mut frame.mouse, handler);
        self.dispatch_keys(&mut frame.key, handler);
        self.dispatch_touch(&mut frame.touch, handler);
        for touches in frame.touches.drain(..) {
            self.set_input_mode(InputMode::Touch, handler);
            handler.on_event(&WindowEvent::Touches(touches));
        }
        self.dispatch_controller(&mut frame.controller, handler);
        self.dispatch_motion(&mut frame.motion, handler);
        self.buffers = frame;

        if self.running && !handler.on_update(time_delta) {
            log::info!("Window '{}' closed by handler", self.options.title);
            self.running = false;
        }
        self.running
    }

    fn dispatch_generic(&mut self, events: &mut Vec<GenericEvent>, handler: &mut impl WindowHandler) {
        let last_size = events.iter().rev().find_map(|e| match e {
            GenericEvent::SizeChange { .. } => Some(e.clone()),
            _ => None,
        });
        let mut size_sent = false;
        let mut low_memory_sent = false;

        for event in events.drain(..) {
            let event = match event {
                GenericEvent::SizeChange { .. } => {
                    if size_sent {
                        continue;
                    }
                    size_sent = true;
                    match &last_size {
                        Some(last) => last.clone(),
                        None => continue,
                    }
                }
                GenericEvent::LowMemoryWarning => {
                    if low_memory_sent {
                        continue;
                    }
                    low_memory_sent = true;
                    event
                }
                GenericEvent::QuitRequest { can_reject } => {
                    let accepted = handler.on_quit_request(can_reject);
                    if accepted || !can_reject {
                        log::info!("Window '{}' quitting", self.options.title);
                        self.running = false;
                    }
                    continue;
                }
                other => other,
            };

            match &event {
                GenericEvent::SizeChange {
                    width,
                    height,
                    fullscreen,
                } => {
                    self.state.width = *width;
                    self.state.height = *height;
                    self.state.fullscreen = *fullscreen;
                }
                GenericEvent::FocusChange(focused) => self.state.focused = *focused,
                GenericEvent::ActivityChange(active) => self.state.active = *active,
                GenericEvent::InputModeChange(mode) => {
                    if self.state.input_mode == *mode {
                        continue;
                    }
                    self.state.input_mode = *mode;
                }
                GenericEvent::VirtualKeyboardChange {
                    visible,
                    height_ratio,
                } => {
                    self.state.virtual_keyboard_visible = *visible;
                    self.state.virtual_keyboard_height_ratio = *height_ratio;
                }
                GenericEvent::LowMemoryWarning
                | GenericEvent::Screenshot(_)
                | GenericEvent::QuitRequest { .. } => {}
            }
            handler.on_event(&WindowEvent::Generic(event));
        }
    }

    fn dispatch_mouse(&mut self, events: &mut Vec<MouseEvent>, handler: &mut impl WindowHandler) {
        for event in merge_mouse(events.drain(..)) {
            self.set_input_mode(InputMode::Mouse, handler);
            self.emit_mouse(event, handler);
        }
    }

    fn emit_mouse(&mut self, event: MouseEvent, handler: &mut impl WindowHandler) {
        self.state.cursor = event.position;
        handler.on_event(&WindowEvent::Mouse(event));
    }

    fn dispatch_keys(&mut self, events: &mut Vec<KeyEvent>, handler: &mut impl WindowHandler) {
        for event in events.drain(..) {
            handler.on_event(&WindowEvent::Key(event));
        }
    }

    fn dispatch_touch(&mut self, events: &mut Vec<TouchEvent>, handler: &mut impl WindowHandler) {
        for event in merge_touch(events.drain(..)) {
            self.set_input_mode(InputMode::Touch, handler);
            handler.on_event(&WindowEvent::Touch(event));
            self.emulate(event, handler);
        }
    }

    /// Track active touches and emit the mouse or multi-touch view of them.
    fn emulate(&mut self, event: TouchEvent, handler: &mut impl WindowHandler) {
        let known = self.touches.iter().position(|(i, _)| *i == event.index);
        match event.kind {
            TouchEventKind::Down => match known {
                Some(slot) => self.touches[slot].1 = event.position,
                None => self.touches.push((event.index, event.position)),
            },
            TouchEventKind::Move => match known {
                Some(slot) => self.touches[slot].1 = event.position,
                None => return,
            },
            TouchEventKind::Up | TouchEventKind::Cancel => match known {
                Some(slot) => {
                    self.touches.remove(slot);
                }
                None => return,
            },
        }

        if !self.multi_touch && self.touches.len() > 1 {
            self.multi_touch = true;
            log::debug!("Switching to multi-touch");
            let cancel = MouseEvent::new(MouseEventKind::Cancel, self.state.cursor, MouseButton::Left);
            self.emit_mouse(cancel, handler);
        }

        if self.multi_touch {
            handler.on_event(&WindowEvent::Touches(self.active_touches()));
            if self.touches.is_empty() {
                self.multi_touch = false;
            }
            return;
        }

        let kind = match event.kind {
            TouchEventKind::Down => MouseEventKind::Down,
            TouchEventKind::Up => MouseEventKind::Up,
            TouchEventKind::Cancel => MouseEventKind::Cancel,
            TouchEventKind::Move => MouseEventKind::Move,
        };
        self.emit_mouse(MouseEvent::new(kind, event.position, MouseButton::Left), handler);
    }

    fn dispatch_controller(
        &mut self,
        events: &mut Vec<ControllerEvent>,
        handler: &mut impl WindowHandler,
    ) {
        for event in events.drain(..) {
            self.set_input_mode(InputMode::Controller, handler);
            handler.on_event(&WindowEvent::Controller(event));
        }
    }

    fn dispatch_motion(&mut self, events: &mut Vec<MotionEvent>, handler: &mut impl WindowHandler) {
        for event in events.drain(..) {
            handler.on_event(&WindowEvent::Motion(event));
        }
    }

    fn set_input_mode(&mut self, mode: InputMode, handler: &mut impl WindowHandler) {
        if self.state.input_mode != mode {
            log::debug!("Input mode {:?} -> {:?}", self.state.input_mode, mode);
            self.state.input_mode = mode;
            handler.on_event(&WindowEvent::Generic(GenericEvent::InputModeChange(mode)));
        }
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("title", &self.options.title)
            .field("state", &self.state)
            .field("running", &self.running)
            .finish()
    }
}

/// Sum consecutive scrolls and keep only the last of consecutive moves.
fn merge_mouse(events: impl Iterator<Item = MouseEvent>) -> Vec<MouseEvent> {
    let mut merged: Vec<MouseEvent> = Vec::new();
    for event in events {
        if let Some(last) = merged.last_mut() {
            match (last.kind, event.kind) {
                (MouseEventKind::Scroll, MouseEventKind::Scroll) => {
                    last.delta += event.delta;
                    last.position = event.position;
                    continue;
                }
                (MouseEventKind::Move, MouseEventKind::Move) => {
                    *last = event;
                    continue;
                }
                _ => {}
            }
        }
        merged.push(event);
    }
    merged
}

/// Keep only the last of consecutive moves of the same finger.
fn merge_touch(events: impl Iterator<Item = TouchEvent>) -> Vec<TouchEvent> {
    let mut merged: Vec<TouchEvent> = Vec::new();
    for event in events {
        if let Some(last) = merged.last_mut() {
            if last.kind == TouchEventKind::Move
                && event.kind == TouchEventKind::Move
                && last.index == event.index
            {
                *last = event;
                continue;
            }
        }
        merged.push(event);
    }
    merged
}
