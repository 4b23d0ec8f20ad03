//! winit glue.
//!
//! Translates winit window events into queued [`WindowEvent`](crate::WindowEvent)s
//! and maps winit key codes to platform-agnostic [`Key`] values.

use vesper_core::input::{Key, MouseButton};
use vesper_core::Vec2;
use winit::event::{ElementState, MouseScrollDelta, TouchPhase};
use winit::keyboard::{self, PhysicalKey};

use crate::event::{KeyEventKind, MouseEventKind, TouchEventKind};
use crate::queue::EventSender;

/// Lines are converted to pixels with this factor so both scroll sources
/// add up in the same unit.
const PIXELS_PER_LINE: f32 = 20.0;

/// Convert a winit [`keyboard::KeyCode`] to a [`Key`], if a mapping exists.
pub fn map_winit_key(key: keyboard::KeyCode) -> Option<Key> {
    use keyboard::KeyCode as K;
    Some(match key {
        // Letters
        K::KeyA => Key::A,
        K::KeyB => Key::B,
        K::KeyC => Key::C,
        K::KeyD => Key::D,
        K::KeyE => Key::E,
        K::KeyF => Key::F,
        K::KeyG => Key::G,
        K::KeyH => Key::H,
        K::KeyI => Key::I,
        K::KeyJ => Key::J,
        K::KeyK => Key::K,
        K::KeyL => Key::L,
        K::KeyM => Key::M,
        K::KeyN => Key::N,
        K::KeyO => Key::O,
        K::KeyP => Key::P,
        K::KeyQ => Key::Q,
        K::KeyR => Key::R,
        K::KeyS => Key::S,
        K::KeyT => Key::T,
        K::KeyU => Key::U,
        K::KeyV => Key::V,
        K::KeyW => Key::W,
        K::KeyX => Key::X,
        K::KeyY => Key::Y,
        K::KeyZ => Key::Z,

        // Digits
        K::Digit0 => Key::Num0,
        K::Digit1 => Key::Num1,
        K::Digit2 => Key::Num2,
        K::Digit3 => Key::Num3,
        K::Digit4 => Key::Num4,
        K::Digit5 => Key::Num5,
        K::Digit6 => Key::Num6,
        K::Digit7 => Key::Num7,
        K::Digit8 => Key::Num8,
        K::Digit9 => Key::Num9,

        // Numpad
        K::Numpad0 => Key::Numpad0,
        K::Numpad1 => Key::Numpad1,
        K::Numpad2 => Key::Numpad2,
        K::Numpad3 => Key::Numpad3,
        K::Numpad4 => Key::Numpad4,
        K::Numpad5 => Key::Numpad5,
        K::Numpad6 => Key::Numpad6,
        K::Numpad7 => Key::Numpad7,
        K::Numpad8 => Key::Numpad8,
        K::Numpad9 => Key::Numpad9,
        K::NumpadAdd => Key::NumpadAdd,
        K::NumpadSubtract => Key::NumpadSubtract,
        K::NumpadMultiply => Key::NumpadMultiply,
        K::NumpadDivide => Key::NumpadDivide,
        K::NumpadDecimal => Key::NumpadDecimal,
        K::NumpadEnter => Key::NumpadEnter,

        // Function keys
        K::F1 => Key::F1,
        K::F2 => Key::F2,
        K::F3 => Key::F3,
        K::F4 => Key::F4,
        K::F5 => Key::F5,
        K::F6 => Key::F6,
        K::F7 => Key::F7,
        K::F8 => Key::F8,
        K::F9 => Key::F9,
        K::F10 => Key::F10,
        K::F11 => Key::F11,
        K::F12 => Key::F12,

        // Modifiers, both sides report the same key
        K::ShiftLeft | K::ShiftRight => Key::Shift,
        K::ControlLeft | K::ControlRight => Key::Control,
        K::AltLeft | K::AltRight => Key::Alt,
        K::SuperLeft | K::SuperRight => Key::Super,

        // Navigation
        K::ArrowUp => Key::Up,
        K::ArrowDown => Key::Down,
        K::ArrowLeft => Key::Left,
        K::ArrowRight => Key::Right,
        K::Home => Key::Home,
        K::End => Key::End,
        K::PageUp => Key::PageUp,
        K::PageDown => Key::PageDown,
        K::Insert => Key::Insert,
        K::Delete => Key::Delete,

        // Editing and control
        K::Space => Key::Space,
        K::Enter => Key::Return,
        K::Escape => Key::Escape,
        K::Tab => Key::Tab,
        K::Backspace => Key::Backspace,
        K::CapsLock => Key::CapsLock,
        K::Pause => Key::Pause,
        K::PrintScreen => Key::PrintScreen,

        // Symbols
        K::Minus => Key::Minus,
        K::Equal => Key::Equal,
        K::BracketLeft => Key::BracketLeft,
        K::BracketRight => Key::BracketRight,
        K::Backslash => Key::Backslash,
        K::Semicolon => Key::Semicolon,
        K::Quote => Key::Quote,
        K::Backquote => Key::Backquote,
        K::Comma => Key::Comma,
        K::Period => Key::Period,
        K::Slash => Key::Slash,

        K::BrowserBack => Key::Back,
        K::ContextMenu => Key::Menu,

        _ => return None,
    })
}

pub fn map_winit_button(button: winit::event::MouseButton) -> MouseButton {
    match button {
        winit::event::MouseButton::Left => MouseButton::Left,
        winit::event::MouseButton::Right => MouseButton::Right,
        winit::event::MouseButton::Middle => MouseButton::Middle,
        winit::event::MouseButton::Back => MouseButton::Back,
        winit::event::MouseButton::Forward => MouseButton::Forward,
        winit::event::MouseButton::Other(_) => MouseButton::None,
    }
}

/// Forwards winit events to a window's event queue.
///
/// winit reports button presses without a position, so the last cursor
/// position is remembered here.
#[derive(Debug)]
pub struct PlatformInput {
    sender: EventSender,
    cursor: Vec2,
    fullscreen: bool,
}

impl PlatformInput {
    pub fn new(sender: EventSender, fullscreen: bool) -> Self {
        Self {
            sender,
            cursor: Vec2::ZERO,
            fullscreen,
        }
    }

    /// Queue the event if it has a counterpart. Returns whether it did.
    pub fn translate(&mut self, event: &winit::event::WindowEvent) -> bool {
        use winit::event::WindowEvent as W;
        match event {
            W::CloseRequested => self.sender.queue_quit_request(true),
            W::Resized(size) => self
                .sender
                .queue_size_change(size.width, size.height, self.fullscreen),
            W::Focused(focused) => self.sender.queue_focus_change(*focused),
            W::Occluded(occluded) => self.sender.queue_activity_change(!occluded),
            W::KeyboardInput { event, .. } => {
                let kind = match event.state {
                    ElementState::Pressed => KeyEventKind::Down,
                    ElementState::Released => KeyEventKind::Up,
                };
                let mut queued = false;
                if let PhysicalKey::Code(code) = event.physical_key {
                    if let Some(key) = map_winit_key(code) {
                        queued = self.sender.queue_key_input(kind, key);
                    }
                }
                if kind == KeyEventKind::Down {
                    if let Some(text) = &event.text {
                        for character in text.chars().filter(|c| !c.is_control()) {
                            queued |= self.sender.queue_text_input(character);
                        }
                    }
                }
                queued
            }
            W::CursorMoved { position, .. } => {
                self.cursor = Vec2::new(position.x as f32, position.y as f32);
                self.sender
                    .queue_mouse_input(MouseEventKind::Move, self.cursor, MouseButton::None)
            }
            W::MouseInput { state, button, .. } => {
                let kind = match state {
                    ElementState::Pressed => MouseEventKind::Down,
                    ElementState::Released => MouseEventKind::Up,
                };
                self.sender
                    .queue_mouse_input(kind, self.cursor, map_winit_button(*button))
            }
            W::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(x, y) => Vec2::new(*x, *y) * PIXELS_PER_LINE,
                    MouseScrollDelta::PixelDelta(pos) => Vec2::new(pos.x as f32, pos.y as f32),
                };
                self.sender.queue_mouse_scroll(self.cursor, delta)
            }
            W::Touch(touch) => {
                let kind = match touch.phase {
                    TouchPhase::Started => TouchEventKind::Down,
                    TouchPhase::Moved => TouchEventKind::Move,
                    TouchPhase::Ended => TouchEventKind::Up,
                    TouchPhase::Cancelled => TouchEventKind::Cancel,
                };
                let position = Vec2::new(touch.location.x as f32, touch.location.y as f32);
                self.sender.queue_touch_input(kind, touch.id, position)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_common_keys() {
        assert_eq!(map_winit_key(keyboard::KeyCode::KeyA), Some(Key::A));
        assert_eq!(map_winit_key(keyboard::KeyCode::Enter), Some(Key::Return));
        assert_eq!(map_winit_key(keyboard::KeyCode::ShiftRight), Some(Key::Shift));
        assert_eq!(map_winit_key(keyboard::KeyCode::Digit7), Some(Key::Num7));
        assert_eq!(map_winit_key(keyboard::KeyCode::F24), None);
    }

    #[test]
    fn maps_mouse_buttons() {
        assert_eq!(map_winit_button(winit::event::MouseButton::Left), MouseButton::Left);
        assert_eq!(map_winit_button(winit::event::MouseButton::Other(7)), MouseButton::None);
    }
}
