//! Window event queue tests: merge rules, touch emulation and lifecycle.

use rstest::rstest;
use vesper_app::{
    GenericEvent, KeyEventKind, MouseEvent, MouseEventKind, TouchEventKind, Window, WindowEvent,
    WindowHandler, WindowOptions,
};
use vesper_core::input::{ControllerButton, InputMode, Key, MouseButton};
use vesper_core::{Color, PixelFormat, Vec2};
use vesper_graphics::{
    BackendKind, RenderSystem, RenderSystemOptions, TextureData, TextureKind, ThreadingMode,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct Recorder {
    events: Vec<WindowEvent>,
    accept_quit: bool,
    quit_requests: usize,
    keep_running: bool,
    updates: usize,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            accept_quit: true,
            quit_requests: 0,
            keep_running: true,
            updates: 0,
        }
    }
}

impl Recorder {
    fn mouse(&self) -> Vec<MouseEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WindowEvent::Mouse(m) => Some(*m),
                _ => None,
            })
            .collect()
    }

    fn generic(&self) -> Vec<GenericEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WindowEvent::Generic(g) => Some(g.clone()),
                _ => None,
            })
            .collect()
    }

    fn touch_lists(&self) -> Vec<Vec<Vec2>> {
        self.events
            .iter()
            .filter_map(|e| match e {
                WindowEvent::Touches(t) => Some(t.clone()),
                _ => None,
            })
            .collect()
    }
}

impl WindowHandler for Recorder {
    fn on_event(&mut self, event: &WindowEvent) {
        self.events.push(event.clone());
    }

    fn on_quit_request(&mut self, _can_reject: bool) -> bool {
        self.quit_requests += 1;
        self.accept_quit
    }

    fn on_update(&mut self, _time_delta: f32) -> bool {
        self.updates += 1;
        self.keep_running
    }
}

fn window() -> Window {
    init_logging();
    Window::new(WindowOptions::default().with_size(320, 240))
}

fn at(x: f32, y: f32) -> Vec2 {
    Vec2::new(x, y)
}

// ============================================================================
// Merge Rules
// ============================================================================

#[test]
fn consecutive_scrolls_are_summed() {
    let mut window = window();
    let sender = window.sender();
    sender.queue_mouse_scroll(at(5.0, 5.0), at(0.0, 1.0));
    sender.queue_mouse_scroll(at(5.0, 5.0), at(0.0, 2.0));
    sender.queue_mouse_scroll(at(6.0, 5.0), at(1.0, 3.0));

    let mut recorder = Recorder::default();
    assert!(window.update(0.016, &mut recorder));

    let mouse = recorder.mouse();
    assert_eq!(mouse.len(), 1);
    assert_eq!(mouse[0].kind, MouseEventKind::Scroll);
    assert_eq!(mouse[0].delta, at(1.0, 6.0));
}

#[test]
fn consecutive_moves_collapse_to_last() {
    let mut window = window();
    let sender = window.sender();
    for x in 0..5 {
        sender.queue_mouse_input(MouseEventKind::Move, at(x as f32, 1.0), MouseButton::None);
    }
    sender.queue_mouse_input(MouseEventKind::Down, at(4.0, 1.0), MouseButton::Left);

    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);

    let kinds: Vec<_> = recorder.mouse().iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![MouseEventKind::Move, MouseEventKind::Down]);
    assert_eq!(recorder.mouse()[0].position, at(4.0, 1.0));
    assert_eq!(window.state().cursor, at(4.0, 1.0));
}

#[test]
fn size_changes_dispatch_once_with_last_size() {
    let mut window = window();
    let sender = window.sender();
    sender.queue_size_change(100, 100, false);
    sender.queue_focus_change(false);
    sender.queue_size_change(200, 150, false);
    sender.queue_size_change(640, 480, true);

    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);

    assert_eq!(
        recorder.generic(),
        vec![
            GenericEvent::SizeChange {
                width: 640,
                height: 480,
                fullscreen: true
            },
            GenericEvent::FocusChange(false),
        ]
    );
    assert_eq!(window.size(), (640, 480));
    assert!(window.state().fullscreen);
    assert!(!window.state().focused);
}

#[test]
fn low_memory_warnings_dispatch_once_per_frame() {
    let mut window = window();
    let sender = window.sender();
    for _ in 0..3 {
        sender.queue_low_memory_warning();
    }
    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);
    assert_eq!(recorder.generic(), vec![GenericEvent::LowMemoryWarning]);

    sender.queue_low_memory_warning();
    window.update(0.016, &mut recorder);
    assert_eq!(recorder.generic().len(), 2);
}

#[test]
fn other_events_dispatch_per_occurrence() {
    let mut window = window();
    let sender = window.sender();
    sender.queue_key_input(KeyEventKind::Down, Key::A);
    sender.queue_key_input(KeyEventKind::Down, Key::A);
    sender.queue_text_input('a');
    sender.queue_mouse_input(MouseEventKind::Down, at(1.0, 1.0), MouseButton::Left);
    sender.queue_mouse_input(MouseEventKind::Down, at(1.0, 1.0), MouseButton::Left);

    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);

    let keys = recorder
        .events
        .iter()
        .filter(|e| matches!(e, WindowEvent::Key(_)))
        .count();
    assert_eq!(keys, 3);
    assert_eq!(recorder.mouse().len(), 2);
}

#[test]
fn dispatch_order_is_fixed_by_type() {
    let mut window = window();
    let sender = window.sender();
    sender.queue_key_input(KeyEventKind::Up, Key::Escape);
    sender.queue_mouse_input(MouseEventKind::Move, at(1.0, 1.0), MouseButton::None);
    sender.queue_focus_change(true);

    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);

    assert!(matches!(recorder.events[0], WindowEvent::Generic(_)));
    assert!(matches!(recorder.events[1], WindowEvent::Mouse(_)));
    assert!(matches!(recorder.events[2], WindowEvent::Key(_)));
}

// ============================================================================
// Touch Emulation
// ============================================================================

#[test]
fn single_touch_is_reported_as_mouse() {
    let mut window = window();
    let sender = window.sender();
    sender.queue_touch_input(TouchEventKind::Down, 7, at(10.0, 10.0));
    sender.queue_touch_input(TouchEventKind::Move, 7, at(11.0, 10.0));
    sender.queue_touch_input(TouchEventKind::Move, 7, at(12.0, 10.0));
    sender.queue_touch_input(TouchEventKind::Up, 7, at(12.0, 10.0));

    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);

    let mouse = recorder.mouse();
    let kinds: Vec<_> = mouse.iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![MouseEventKind::Down, MouseEventKind::Move, MouseEventKind::Up]
    );
    assert!(mouse.iter().all(|m| m.button == MouseButton::Left));
    assert_eq!(mouse[1].position, at(12.0, 10.0));
    assert!(recorder.touch_lists().is_empty());
    assert_eq!(window.input_mode(), InputMode::Touch);
}

#[test]
fn second_finger_cancels_emulated_mouse() {
    let mut window = window();
    let sender = window.sender();
    sender.queue_touch_input(TouchEventKind::Down, 0, at(1.0, 1.0));
    sender.queue_touch_input(TouchEventKind::Down, 1, at(9.0, 9.0));
    sender.queue_touch_input(TouchEventKind::Move, 1, at(8.0, 8.0));

    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);

    let kinds: Vec<_> = recorder.mouse().iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![MouseEventKind::Down, MouseEventKind::Cancel]);
    assert_eq!(
        recorder.touch_lists(),
        vec![vec![at(1.0, 1.0), at(9.0, 9.0)], vec![at(1.0, 1.0), at(8.0, 8.0)]]
    );

    // Lifting every finger leaves multi-touch; the next touch is a mouse again.
    sender.queue_touch_input(TouchEventKind::Up, 1, at(8.0, 8.0));
    sender.queue_touch_input(TouchEventKind::Up, 0, at(1.0, 1.0));
    sender.queue_touch_input(TouchEventKind::Down, 2, at(3.0, 3.0));
    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);

    assert_eq!(
        recorder.touch_lists(),
        vec![vec![at(1.0, 1.0)], Vec::new()]
    );
    let kinds: Vec<_> = recorder.mouse().iter().map(|m| m.kind).collect();
    assert_eq!(kinds, vec![MouseEventKind::Down]);
    assert_eq!(window.active_touches(), vec![at(3.0, 3.0)]);
}

// ============================================================================
// Input Mode
// ============================================================================

#[test]
fn input_mode_follows_last_device() {
    let mut window = window();
    let sender = window.sender();
    sender.queue_controller_input(
        vesper_app::ControllerEventKind::Down,
        0,
        ControllerButton::A,
    );
    sender.queue_controller_input(vesper_app::ControllerEventKind::Up, 0, ControllerButton::A);

    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);
    assert_eq!(
        recorder.generic(),
        vec![GenericEvent::InputModeChange(InputMode::Controller)]
    );

    sender.queue_mouse_input(MouseEventKind::Move, at(0.0, 0.0), MouseButton::None);
    window.update(0.016, &mut recorder);
    assert_eq!(window.input_mode(), InputMode::Mouse);
    assert_eq!(recorder.generic().len(), 2);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[rstest]
#[case::accepted(true, true, false)]
#[case::rejected(true, false, true)]
#[case::not_rejectable(false, false, false)]
fn quit_requests(#[case] can_reject: bool, #[case] accept: bool, #[case] still_running: bool) {
    let mut window = window();
    window.sender().queue_quit_request(can_reject);

    let mut recorder = Recorder {
        accept_quit: accept,
        ..Recorder::default()
    };
    assert_eq!(window.update(0.016, &mut recorder), still_running);
    assert_eq!(recorder.quit_requests, 1);
    assert_eq!(recorder.updates, usize::from(still_running));
}

#[test]
fn handler_can_stop_the_window() {
    let mut window = window();
    let mut recorder = Recorder {
        keep_running: false,
        ..Recorder::default()
    };
    assert!(!window.update(0.016, &mut recorder));
    assert!(!window.update(0.016, &mut recorder));
    assert_eq!(recorder.updates, 1);
}

#[test]
fn events_from_other_threads_arrive_next_update() {
    let mut window = window();
    let producers: Vec<_> = (0..4)
        .map(|i| {
            let sender = window.sender();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    sender.queue_key_input(KeyEventKind::Down, Key::Space);
                }
                sender.queue_focus_change(i % 2 == 0)
            })
        })
        .collect();
    for producer in producers {
        assert!(producer.join().unwrap());
    }

    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);
    let keys = recorder
        .events
        .iter()
        .filter(|e| matches!(e, WindowEvent::Key(_)))
        .count();
    assert_eq!(keys, 100);
    assert_eq!(recorder.generic().len(), 4);
}

#[test]
fn full_queue_drops_events() {
    init_logging();
    let mut window = Window::new(WindowOptions::default().with_event_capacity(2));
    let sender = window.sender();
    assert!(sender.queue_focus_change(true));
    assert!(sender.queue_focus_change(false));
    assert!(!sender.queue_focus_change(true));
    assert_eq!(window.dropped_events(), 1);

    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);
    assert_eq!(recorder.generic().len(), 2);
    assert!(sender.queue_focus_change(true));
}

#[test]
fn renderer_low_memory_reaches_the_window() {
    let mut window = window();
    let renderer = RenderSystem::new(
        RenderSystemOptions::default()
            .with_backend(BackendKind::Dummy)
            .with_threading(ThreadingMode::Inline)
            .with_size(16, 16),
    )
    .unwrap();
    let sender = window.sender();
    renderer.set_low_memory_callback(move || {
        sender.queue_low_memory_warning();
    });

    renderer.device_stats().fail_allocations(1);
    let texture = renderer
        .create_texture(2, 2, TextureData::Color(Color::RED), PixelFormat::Rgba8, TextureKind::Managed)
        .unwrap();
    renderer.wait_for_all(true);
    assert!(texture.is_loaded());

    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);
    assert_eq!(recorder.generic(), vec![GenericEvent::LowMemoryWarning]);
}

#[test]
fn requested_screenshot_arrives_as_event() {
    let mut window = window();
    let mut renderer = RenderSystem::new(
        RenderSystemOptions::default()
            .with_backend(BackendKind::Software)
            .with_threading(ThreadingMode::Inline)
            .with_size(16, 8),
    )
    .unwrap();
    assert!(!window.deliver_screenshot(&renderer));

    window.request_screenshot();
    renderer.clear_color(Color::RED, false);
    assert!(window.deliver_screenshot(&renderer));
    assert!(!window.deliver_screenshot(&renderer));

    let mut recorder = Recorder::default();
    window.update(0.016, &mut recorder);
    match recorder.generic().as_slice() {
        [GenericEvent::Screenshot(image)] => {
            assert_eq!((image.width(), image.height()), (16, 8));
            assert_eq!(image.get_pixel(0, 0), Some(Color::RED));
        }
        other => panic!("expected one screenshot, got {other:?}"),
    }
}
