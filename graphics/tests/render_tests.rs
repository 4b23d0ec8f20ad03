//! Render system integration tests.
//!
//! Run against the dummy backend, which counts every device hook, and the
//! software backend where pixel output matters. Both threading modes share
//! one executor, so ordering tests are parameterized over them.

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rstest::rstest;
use vesper_core::{Color, PixelFormat, RectF};
use vesper_graphics::{
    BackendKind, BlendMode, ColorMode, DeviceContext, FnCommand, Hook, PlainVertex, Primitive,
    TextureData, TextureKind, ThreadingMode,
};

use support::render_system;

// ============================================================================
// Command Queue
// ============================================================================

#[rstest]
#[case::inline(ThreadingMode::Inline)]
#[case::dedicated(ThreadingMode::Dedicated)]
fn commands_execute_in_enqueue_order(#[case] threading: ThreadingMode) {
    let mut rs = render_system(BackendKind::Dummy, threading);
    let sink = Arc::new(Mutex::new(Vec::new()));

    for frame in 0..4 {
        for i in 0..50 {
            let sink = sink.clone();
            let value = frame * 50 + i;
            rs.enqueue(Box::new(FnCommand::new("Record", move |_: &mut DeviceContext| {
                sink.lock().push(value)
            })));
        }
        rs.flush_frame(false);
    }
    rs.wait_for_all(false);

    let executed = sink.lock().clone();
    assert_eq!(executed, (0..200).collect::<Vec<_>>());
}

#[rstest]
#[case::inline(ThreadingMode::Inline)]
#[case::dedicated(ThreadingMode::Dedicated)]
fn forced_wait_on_empty_queue_returns_immediately(#[case] threading: ThreadingMode) {
    let rs = render_system(BackendKind::Dummy, threading);
    let before = rs.device_stats().snapshot();

    let start = Instant::now();
    rs.wait_for_all(true);
    rs.wait_for_all(false);

    assert!(start.elapsed() < Duration::from_secs(1));
    assert_eq!(rs.device_stats().snapshot(), before);
}

#[test]
fn forced_wait_submits_the_open_queue() {
    let mut rs = render_system(BackendKind::Dummy, ThreadingMode::Dedicated);
    rs.draw_filled_rect(RectF::new(0.0, 0.0, 4.0, 4.0), Color::RED);

    rs.wait_for_all(false);
    assert_eq!(rs.device_stats().count(Hook::Draw), 0);

    rs.wait_for_all(true);
    assert_eq!(rs.device_stats().count(Hook::Draw), 1);
}

// ============================================================================
// State Synchronization
// ============================================================================

#[rstest]
#[case::inline(ThreadingMode::Inline)]
#[case::dedicated(ThreadingMode::Dedicated)]
fn blend_change_issues_exactly_one_state_hook(#[case] threading: ThreadingMode) {
    let mut rs = render_system(BackendKind::Dummy, threading);
    rs.draw_filled_rect(RectF::new(0.0, 0.0, 4.0, 4.0), Color::RED);
    rs.flush_frame(false);
    rs.wait_for_all(false);
    let before = rs.device_stats().snapshot();

    rs.set_blend_mode(BlendMode::Add);
    rs.draw_filled_rect(RectF::new(0.0, 0.0, 4.0, 4.0), Color::RED);
    rs.flush_frame(false);
    rs.wait_for_all(false);

    let delta = rs.device_stats().snapshot().since(&before);
    assert_eq!(delta.state_hooks(), 1);
    assert_eq!(delta.get(Hook::SetBlendMode), 1);
    assert_eq!(delta.get(Hook::Draw), 1);
}

#[test]
fn unchanged_state_issues_no_hooks() {
    let mut rs = render_system(BackendKind::Dummy, ThreadingMode::Inline);
    rs.draw_filled_rect(RectF::new(0.0, 0.0, 4.0, 4.0), Color::RED);
    rs.flush_frame(false);
    let before = rs.device_stats().snapshot();

    // System color travels with the draw, not as device state.
    rs.draw_filled_rect(RectF::new(1.0, 1.0, 4.0, 4.0), Color::BLUE);
    rs.flush_frame(false);

    let delta = rs.device_stats().snapshot().since(&before);
    assert_eq!(delta.state_hooks(), 0);
    assert_eq!(delta.get(Hook::Draw), 1);
}

#[test]
fn texture_is_bound_before_blend_and_color_mode() {
    let mut rs = render_system(BackendKind::Dummy, ThreadingMode::Inline);
    let texture = rs
        .create_texture(2, 2, TextureData::Color(Color::WHITE), PixelFormat::Rgba8, TextureKind::Managed)
        .unwrap();
    rs.flush_frame(false);

    rs.device_stats().set_recording(true);
    rs.set_texture(Some(&texture));
    rs.set_blend_mode(BlendMode::Overwrite);
    rs.set_color_mode(ColorMode::Lerp, 0.5);
    rs.draw_textured_rect(RectF::new(0.0, 0.0, 4.0, 4.0), RectF::UNIT);
    rs.flush_frame(false);

    let log = rs.device_stats().take_log();
    let position = |hook| log.iter().position(|h| *h == hook).unwrap();
    assert!(position(Hook::SetTexture) < position(Hook::SetBlendMode));
    assert!(position(Hook::SetTexture) < position(Hook::SetColorMode));
    assert!(position(Hook::SetColorMode) < position(Hook::Draw));
}

// ============================================================================
// Failure Handling
// ============================================================================

#[test]
fn allocation_failure_notifies_and_retries_once() {
    let rs = render_system(BackendKind::Dummy, ThreadingMode::Inline);
    let notified = Arc::new(AtomicUsize::new(0));
    {
        let notified = notified.clone();
        rs.set_low_memory_callback(move || {
            notified.fetch_add(1, Ordering::SeqCst);
        });
    }

    rs.device_stats().fail_allocations(1);
    let recovered = rs
        .create_texture(4, 4, TextureData::Color(Color::RED), PixelFormat::Rgba8, TextureKind::Managed)
        .unwrap();
    rs.wait_for_all(true);
    assert!(recovered.is_loaded());
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    rs.device_stats().fail_allocations(2);
    let failed = rs
        .create_texture(4, 4, TextureData::Color(Color::RED), PixelFormat::Rgba8, TextureKind::Managed)
        .unwrap();
    rs.wait_for_all(true);
    assert!(!failed.is_loaded());
    assert!(failed.is_load_failed());
    assert_eq!(notified.load(Ordering::SeqCst), 2);
}

#[test]
fn software_budget_exhaustion_fails_texture_only() {
    let mut rs = vesper_graphics::RenderSystem::new(
        support::options(BackendKind::Software, ThreadingMode::Inline).with_memory_budget(Some(64)),
    )
    .unwrap();
    let big = rs
        .create_texture(8, 8, TextureData::Color(Color::RED), PixelFormat::Rgba8, TextureKind::Managed)
        .unwrap();
    rs.clear_color(Color::BLUE, false);
    rs.present_frame();

    assert!(big.is_load_failed());
    assert_eq!(rs.statistics().frame, 1);
    let shot = rs.take_screenshot().unwrap();
    assert_eq!(shot.get_pixel(0, 0), Some(Color::BLUE));
}

#[test]
fn device_loss_resets_and_reuploads() {
    let mut rs = render_system(BackendKind::Dummy, ThreadingMode::Inline);
    let texture = rs
        .create_texture(2, 2, TextureData::Color(Color::GREEN), PixelFormat::Rgba8, TextureKind::Managed)
        .unwrap();
    rs.set_texture(Some(&texture));
    rs.draw_textured_rect(RectF::new(0.0, 0.0, 4.0, 4.0), RectF::UNIT);
    rs.flush_frame(true);
    assert!(texture.is_loaded());

    rs.device_stats().lose_device();
    rs.draw_textured_rect(RectF::new(0.0, 0.0, 4.0, 4.0), RectF::UNIT);
    rs.flush_frame(true);
    assert_eq!(rs.device_stats().count(Hook::Reset), 1);
    assert_eq!(rs.statistics().device_resets, 1);
    assert!(!texture.is_loaded());

    let before = rs.device_stats().snapshot();
    rs.draw_textured_rect(RectF::new(0.0, 0.0, 4.0, 4.0), RectF::UNIT);
    rs.flush_frame(true);
    let delta = rs.device_stats().snapshot().since(&before);
    assert!(texture.is_loaded());
    assert_eq!(delta.get(Hook::CreateTexture), 1);
    assert_eq!(delta.get(Hook::UploadTexture), 1);
    assert_eq!(delta.get(Hook::SetBlendMode), 1, "full resync after reset");
    assert_eq!(delta.get(Hook::Draw), 1);
}

// ============================================================================
// Output
// ============================================================================

#[test]
fn software_backend_rasterizes_filled_rect() {
    let mut rs = render_system(BackendKind::Software, ThreadingMode::Dedicated);
    rs.set_ortho_projection(RectF::new(0.0, 0.0, 16.0, 16.0));
    rs.clear_color(Color::GREEN, false);
    rs.draw_filled_rect(RectF::new(0.0, 0.0, 8.0, 8.0), Color::RED);
    rs.present_frame();

    let shot = rs.take_screenshot().unwrap();
    assert_eq!(shot.get_pixel(2, 2), Some(Color::RED));
    assert_eq!(shot.get_pixel(12, 12), Some(Color::GREEN));
}

#[test]
fn statistics_are_published_per_frame() {
    let mut rs = render_system(BackendKind::Dummy, ThreadingMode::Inline);
    let line = [PlainVertex::new(0.0, 0.0, 0.0), PlainVertex::new(1.0, 1.0, 0.0)];
    rs.render(Primitive::LineList, &line);
    rs.draw_filled_rect(RectF::new(0.0, 0.0, 4.0, 4.0), Color::RED);
    rs.present_frame();

    let stats = rs.statistics();
    assert_eq!(stats.frame, 1);
    assert_eq!(stats.draw_calls, 2);
    assert_eq!(stats.vertices, 6);
    assert_eq!(stats.lines, 1);
    assert_eq!(stats.triangles, 2);

    rs.present_frame();
    let stats = rs.statistics();
    assert_eq!(stats.frame, 2);
    assert_eq!(stats.draw_calls, 0);
}

#[test]
fn render_target_receives_clear() {
    let mut rs = render_system(BackendKind::Software, ThreadingMode::Inline);
    let target = rs.create_render_target(4, 4).unwrap();
    rs.set_render_target(Some(&target));
    rs.clear_color(Color::RED, false);
    rs.set_render_target(None);
    rs.flush_frame(false);

    assert!(target.is_loaded());
    assert_eq!(target.get_pixel(1, 1), Some(Color::RED));
}

#[test]
fn shutdown_is_idempotent() {
    let mut rs = render_system(BackendKind::Dummy, ThreadingMode::Dedicated);
    rs.draw_filled_rect(RectF::new(0.0, 0.0, 4.0, 4.0), Color::RED);
    rs.shutdown();
    assert_eq!(rs.device_stats().count(Hook::Draw), 1);
    assert!(!rs.update(0.016));
    rs.shutdown();
}
