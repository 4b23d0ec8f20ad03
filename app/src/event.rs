//! Window event types.
//!
//! Producers on platform callback threads build these values and hand them
//! to the window through an [`EventSender`](crate::EventSender). Every
//! variant is plain data so events can cross threads freely.

use vesper_core::input::{ControllerAxis, ControllerButton, InputMode, Key, MouseButton};
use vesper_core::{CpuImage, Vec2, Vec3};

/// Any event the window can receive.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    Generic(GenericEvent),
    Mouse(MouseEvent),
    Key(KeyEvent),
    Touch(TouchEvent),
    /// Positions of all active touches while more than one finger is down.
    Touches(Vec<Vec2>),
    Controller(ControllerEvent),
    Motion(MotionEvent),
}

/// Window and system level notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum GenericEvent {
    /// The user or the OS asked the application to quit.
    QuitRequest { can_reject: bool },
    FocusChange(bool),
    /// The application was suspended or resumed.
    ActivityChange(bool),
    SizeChange {
        width: u32,
        height: u32,
        fullscreen: bool,
    },
    InputModeChange(InputMode),
    VirtualKeyboardChange { visible: bool, height_ratio: f32 },
    LowMemoryWarning,
    Screenshot(CpuImage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseEventKind {
    Down,
    Up,
    Cancel,
    Move,
    Scroll,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub position: Vec2,
    pub button: MouseButton,
    /// Scroll amount; zero for everything but `Scroll`.
    pub delta: Vec2,
}

impl MouseEvent {
    pub fn new(kind: MouseEventKind, position: Vec2, button: MouseButton) -> Self {
        Self {
            kind,
            position,
            button,
            delta: Vec2::ZERO,
        }
    }

    pub fn scroll(position: Vec2, delta: Vec2) -> Self {
        Self {
            kind: MouseEventKind::Scroll,
            position,
            button: MouseButton::None,
            delta,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEventKind {
    Down,
    Up,
}

/// Keyboard event. Text input arrives as `Down` with `key == Key::None`
/// and `character` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub kind: KeyEventKind,
    pub key: Key,
    pub character: Option<char>,
}

impl KeyEvent {
    pub fn new(kind: KeyEventKind, key: Key) -> Self {
        Self {
            kind,
            key,
            character: None,
        }
    }

    pub fn text(character: char) -> Self {
        Self {
            kind: KeyEventKind::Down,
            key: Key::None,
            character: Some(character),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TouchEventKind {
    Down,
    Up,
    Cancel,
    Move,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub kind: TouchEventKind,
    /// Finger identifier, stable while the finger is down.
    pub index: u64,
    pub position: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerEventKind {
    Down,
    Up,
    Axis,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerEvent {
    pub kind: ControllerEventKind,
    pub index: u32,
    pub button: ControllerButton,
    pub axis: Option<ControllerAxis>,
    pub value: f32,
}

impl ControllerEvent {
    pub fn button(kind: ControllerEventKind, index: u32, button: ControllerButton) -> Self {
        Self {
            kind,
            index,
            button,
            axis: None,
            value: 0.0,
        }
    }

    pub fn axis(index: u32, axis: ControllerAxis, value: f32) -> Self {
        Self {
            kind: ControllerEventKind::Axis,
            index,
            button: ControllerButton::None,
            axis: Some(axis),
            value,
        }
    }

    pub fn connection(index: u32, connected: bool) -> Self {
        Self {
            kind: if connected {
                ControllerEventKind::Connected
            } else {
                ControllerEventKind::Disconnected
            },
            index,
            button: ControllerButton::None,
            axis: None,
            value: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotionEventKind {
    Accelerometer,
    LinearAccelerometer,
    Gravity,
    Rotation,
    Gyroscope,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEvent {
    pub kind: MotionEventKind,
    pub value: Vec3,
}
