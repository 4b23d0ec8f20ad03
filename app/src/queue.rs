//! Cross-thread event channel.
//!
//! Platform callbacks run on whatever thread the OS picks. They push events
//! through a cloneable [`EventSender`] into a bounded channel; the window
//! drains it once per frame into per-type buffers and dispatches from those
//! without holding anything the producers need.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;

use vesper_core::input::{ControllerAxis, ControllerButton, Key, MouseButton};
use vesper_core::{CpuImage, Vec2, Vec3};

use crate::event::{
    ControllerEvent, ControllerEventKind, GenericEvent, KeyEvent, KeyEventKind, MotionEvent,
    MotionEventKind, MouseEvent, MouseEventKind, TouchEvent, TouchEventKind, WindowEvent,
};

/// Create a bounded event channel holding up to `capacity` events.
pub(crate) fn channel(capacity: usize) -> (EventSender, Receiver<WindowEvent>) {
    let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
    let sender = EventSender {
        sender,
        dropped: Arc::new(AtomicU64::new(0)),
    };
    (sender, receiver)
}

/// Producer handle for window events. Cheap to clone, usable from any thread.
///
/// Queueing never blocks: when the channel is full the event is dropped,
/// logged and counted.
#[derive(Clone)]
pub struct EventSender {
    sender: SyncSender<WindowEvent>,
    dropped: Arc<AtomicU64>,
}

static_assertions::assert_impl_all!(EventSender: Send, Sync);

impl EventSender {
    /// Queue any event. Returns `false` if it was dropped.
    pub fn queue(&self, event: WindowEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::warn!("Event queue full, dropping {:?} ({} dropped so far)", kind_of(&event), dropped);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Window is gone, event ignored");
                false
            }
        }
    }

    /// Number of events lost to a full channel.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn queue_mouse_input(&self, kind: MouseEventKind, position: Vec2, button: MouseButton) -> bool {
        self.queue(WindowEvent::Mouse(MouseEvent::new(kind, position, button)))
    }

    pub fn queue_mouse_scroll(&self, position: Vec2, delta: Vec2) -> bool {
        self.queue(WindowEvent::Mouse(MouseEvent::scroll(position, delta)))
    }

    pub fn queue_key_input(&self, kind: KeyEventKind, key: Key) -> bool {
        self.queue(WindowEvent::Key(KeyEvent::new(kind, key)))
    }

    pub fn queue_text_input(&self, character: char) -> bool {
        self.queue(WindowEvent::Key(KeyEvent::text(character)))
    }

    pub fn queue_touch_input(&self, kind: TouchEventKind, index: u64, position: Vec2) -> bool {
        self.queue(WindowEvent::Touch(TouchEvent {
            kind,
            index,
            position,
        }))
    }

    pub fn queue_controller_input(
        &self,
        kind: ControllerEventKind,
        index: u32,
        button: ControllerButton,
    ) -> bool {
        self.queue(WindowEvent::Controller(ControllerEvent::button(kind, index, button)))
    }

    pub fn queue_controller_axis(&self, index: u32, axis: ControllerAxis, value: f32) -> bool {
        self.queue(WindowEvent::Controller(ControllerEvent::axis(index, axis, value)))
    }

    pub fn queue_controller_connection(&self, index: u32, connected: bool) -> bool {
        self.queue(WindowEvent::Controller(ControllerEvent::connection(index, connected)))
    }

    pub fn queue_motion_input(&self, kind: MotionEventKind, value: Vec3) -> bool {
        self.queue(WindowEvent::Motion(MotionEvent { kind, value }))
    }

    pub fn queue_size_change(&self, width: u32, height: u32, fullscreen: bool) -> bool {
        self.queue(WindowEvent::Generic(GenericEvent::SizeChange {
            width,
            height,
            fullscreen,
        }))
    }

    pub fn queue_focus_change(&self, focused: bool) -> bool {
        self.queue(WindowEvent::Generic(GenericEvent::FocusChange(focused)))
    }

    pub fn queue_activity_change(&self, active: bool) -> bool {
        self.queue(WindowEvent::Generic(GenericEvent::ActivityChange(active)))
    }

    pub fn queue_quit_request(&self, can_reject: bool) -> bool {
        self.queue(WindowEvent::Generic(GenericEvent::QuitRequest { can_reject }))
    }

    pub fn queue_virtual_keyboard_change(&self, visible: bool, height_ratio: f32) -> bool {
        self.queue(WindowEvent::Generic(GenericEvent::VirtualKeyboardChange {
            visible,
            height_ratio,
        }))
    }

    pub fn queue_low_memory_warning(&self) -> bool {
        self.queue(WindowEvent::Generic(GenericEvent::LowMemoryWarning))
    }

    pub fn queue_screenshot(&self, image: CpuImage) -> bool {
        self.queue(WindowEvent::Generic(GenericEvent::Screenshot(image)))
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("dropped", &self.dropped_events())
            .finish()
    }
}

fn kind_of(event: &WindowEvent) -> &'static str {
    match event {
        WindowEvent::Generic(_) => "generic event",
        WindowEvent::Mouse(_) => "mouse event",
        WindowEvent::Key(_) => "key event",
        WindowEvent::Touch(_) => "touch event",
        WindowEvent::Touches(_) => "touches event",
        WindowEvent::Controller(_) => "controller event",
        WindowEvent::Motion(_) => "motion event",
    }
}

/// One frame's worth of events, split by type in arrival order.
#[derive(Debug, Default)]
pub(crate) struct EventBuffers {
    pub generic: Vec<GenericEvent>,
    pub mouse: Vec<MouseEvent>,
    pub key: Vec<KeyEvent>,
    pub touch: Vec<TouchEvent>,
    pub touches: Vec<Vec<Vec2>>,
    pub controller: Vec<ControllerEvent>,
    pub motion: Vec<MotionEvent>,
}

impl EventBuffers {
    /// Move up to `limit` events from the channel into the buffers. Events
    /// sent while draining beyond that stay queued for the next frame.
    ///
    /// Returns `false` once every sender is gone and the channel is empty.
    pub fn drain(&mut self, receiver: &Receiver<WindowEvent>, limit: usize) -> bool {
        for _ in 0..limit {
            match receiver.try_recv() {
                Ok(event) => self.push(event),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
        true
    }

    fn push(&mut self, event: WindowEvent) {
        match event {
            WindowEvent::Generic(e) => self.generic.push(e),
            WindowEvent::Mouse(e) => self.mouse.push(e),
            WindowEvent::Key(e) => self.key.push(e),
            WindowEvent::Touch(e) => self.touch.push(e),
            WindowEvent::Touches(e) => self.touches.push(e),
            WindowEvent::Controller(e) => self.controller.push(e),
            WindowEvent::Motion(e) => self.motion.push(e),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.generic.is_empty()
            && self.mouse.is_empty()
            && self.key.is_empty()
            && self.touch.is_empty()
            && self.touches.is_empty()
            && self.controller.is_empty()
            && self.motion.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_channel_drops_and_counts() {
        let (sender, receiver) = channel(2);
        assert!(sender.queue_focus_change(true));
        assert!(sender.queue_focus_change(false));
        assert!(!sender.queue_low_memory_warning());
        assert_eq!(sender.dropped_events(), 1);

        let mut buffers = EventBuffers::default();
        assert!(buffers.drain(&receiver, 2));
        assert_eq!(
            buffers.generic,
            vec![GenericEvent::FocusChange(true), GenericEvent::FocusChange(false)]
        );
    }

    #[test]
    fn drain_splits_by_type_in_order() {
        let (sender, receiver) = channel(16);
        sender.queue_key_input(KeyEventKind::Down, Key::A);
        sender.queue_mouse_input(MouseEventKind::Move, Vec2::new(1.0, 2.0), MouseButton::None);
        sender.queue_key_input(KeyEventKind::Up, Key::A);
        sender.queue_text_input('a');

        let mut buffers = EventBuffers::default();
        buffers.drain(&receiver, 16);
        assert_eq!(buffers.mouse.len(), 1);
        assert_eq!(
            buffers.key,
            vec![
                KeyEvent::new(KeyEventKind::Down, Key::A),
                KeyEvent::new(KeyEventKind::Up, Key::A),
                KeyEvent::text('a'),
            ]
        );
    }

    #[test]
    fn producers_on_other_threads() {
        let (sender, receiver) = channel(256);
        let workers: Vec<_> = (0..4)
            .map(|i| {
                let sender = sender.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        sender.queue_controller_connection(i, true);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        let mut buffers = EventBuffers::default();
        buffers.drain(&receiver, 256);
        assert_eq!(buffers.controller.len(), 40);
    }

    #[test]
    fn drain_reports_disconnect() {
        let (sender, receiver) = channel(4);
        sender.queue_low_memory_warning();
        drop(sender);
        let mut buffers = EventBuffers::default();
        assert!(!buffers.drain(&receiver, 4));
        assert_eq!(buffers.generic, vec![GenericEvent::LowMemoryWarning]);
    }

    #[test]
    fn drain_takes_at_most_limit() {
        let (sender, receiver) = channel(8);
        for index in 0..5 {
            sender.queue_controller_connection(index, true);
        }
        let mut buffers = EventBuffers::default();
        assert!(buffers.drain(&receiver, 3));
        assert_eq!(buffers.controller.len(), 3);

        // A producer refilling the channel cannot extend the drain.
        for index in 5..8 {
            sender.queue_controller_connection(index, true);
        }
        let mut next = EventBuffers::default();
        assert!(next.drain(&receiver, 3));
        assert_eq!(
            next.controller.iter().map(|e| e.index).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
    }
}
