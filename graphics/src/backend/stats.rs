//! Hook counters and fault injection shared between a device and its observers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::GraphicsError;

/// Device hooks, in declaration order of [`super::Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    CreateTexture,
    DestroyTexture,
    UploadTexture,
    UpdateTexture,
    ReadTexture,
    SetViewport,
    SetModelviewMatrix,
    SetProjectionMatrix,
    SetDepthBuffer,
    SetTexture,
    SetBlendMode,
    SetColorMode,
    SetRenderTarget,
    Clear,
    Draw,
    Present,
    ReadFramebuffer,
    Reset,
}

impl Hook {
    pub const COUNT: usize = 18;

    pub const ALL: [Hook; Self::COUNT] = [
        Self::CreateTexture,
        Self::DestroyTexture,
        Self::UploadTexture,
        Self::UpdateTexture,
        Self::ReadTexture,
        Self::SetViewport,
        Self::SetModelviewMatrix,
        Self::SetProjectionMatrix,
        Self::SetDepthBuffer,
        Self::SetTexture,
        Self::SetBlendMode,
        Self::SetColorMode,
        Self::SetRenderTarget,
        Self::Clear,
        Self::Draw,
        Self::Present,
        Self::ReadFramebuffer,
        Self::Reset,
    ];

    /// Hooks issued by render state synchronization.
    pub fn is_state_hook(self) -> bool {
        matches!(
            self,
            Self::SetViewport
                | Self::SetModelviewMatrix
                | Self::SetProjectionMatrix
                | Self::SetDepthBuffer
                | Self::SetTexture
                | Self::SetBlendMode
                | Self::SetColorMode
                | Self::SetRenderTarget
        )
    }
}

/// Point-in-time copy of the hook counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookCounts([u64; Hook::COUNT]);

impl HookCounts {
    pub fn get(&self, hook: Hook) -> u64 {
        self.0[hook as usize]
    }

    /// Calls made since `earlier` was taken.
    pub fn since(&self, earlier: &HookCounts) -> HookCounts {
        let mut out = [0; Hook::COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.0[i].saturating_sub(earlier.0[i]);
        }
        HookCounts(out)
    }

    /// Sum of all render state hooks.
    pub fn state_hooks(&self) -> u64 {
        Hook::ALL
            .iter()
            .filter(|h| h.is_state_hook())
            .map(|h| self.get(*h))
            .sum()
    }
}

/// Counters for every device hook, plus fault injection for tests.
///
/// A device records each hook call here before doing any work. The
/// render system hands out the same `Arc` so tests can observe what the
/// render thread issued.
#[derive(Debug, Default)]
pub struct DeviceStats {
    counts: [AtomicU64; Hook::COUNT],
    recording: AtomicBool,
    log: Mutex<Vec<Hook>>,
    /// Full uploads per texture id since it was last unloaded.
    residencies: Mutex<HashMap<u64, u32>>,
    pending_allocation_failures: AtomicU32,
    pending_device_loss: AtomicBool,
    allocated_bytes: AtomicU64,
    pipelines_compiled: AtomicU64,
}

impl DeviceStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a hook call, failing it with [`GraphicsError::DeviceLost`] if a
    /// loss was injected.
    pub fn record(&self, hook: Hook) -> Result<(), GraphicsError> {
        self.counts[hook as usize].fetch_add(1, Ordering::Relaxed);
        if self.recording.load(Ordering::Relaxed) {
            self.log.lock().push(hook);
        }
        if hook != Hook::Reset && self.pending_device_loss.swap(false, Ordering::AcqRel) {
            return Err(GraphicsError::DeviceLost);
        }
        Ok(())
    }

    /// Consume one injected allocation failure, if any.
    pub fn take_allocation_failure(&self) -> bool {
        self.pending_allocation_failures
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Count a full upload of texture `id`.
    pub fn record_texture_upload(&self, id: u64) {
        *self.residencies.lock().entry(id).or_insert(0) += 1;
    }

    /// Texture `id` went back to unloaded; its next upload starts a new
    /// residency.
    pub fn end_texture_residency(&self, id: u64) {
        if let Some(count) = self.residencies.lock().get_mut(&id) {
            *count = 0;
        }
    }

    /// Every texture lost its device copy at once.
    pub fn end_all_residencies(&self) {
        for count in self.residencies.lock().values_mut() {
            *count = 0;
        }
    }

    pub fn forget_texture(&self, id: u64) {
        self.residencies.lock().remove(&id);
    }

    /// Textures with an upload counter.
    pub fn tracked_textures(&self) -> usize {
        self.residencies.lock().len()
    }

    pub fn count(&self, hook: Hook) -> u64 {
        self.counts[hook as usize].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> HookCounts {
        let mut out = [0; Hook::COUNT];
        for (slot, counter) in out.iter_mut().zip(self.counts.iter()) {
            *slot = counter.load(Ordering::Relaxed);
        }
        HookCounts(out)
    }

    /// Start or stop keeping an ordered log of hook calls.
    pub fn set_recording(&self, enabled: bool) {
        self.recording.store(enabled, Ordering::Relaxed);
    }

    /// Take the ordered hook log.
    pub fn take_log(&self) -> Vec<Hook> {
        std::mem::take(&mut *self.log.lock())
    }

    /// Highest number of full uploads any texture received without being
    /// unloaded in between.
    pub fn max_uploads_per_texture(&self) -> u32 {
        self.residencies.lock().values().copied().max().unwrap_or(0)
    }

    /// Make the next `count` texture allocations fail with out-of-memory.
    pub fn fail_allocations(&self, count: u32) {
        self.pending_allocation_failures
            .store(count, Ordering::Release);
    }

    /// Make the next hook call report a lost device.
    pub fn lose_device(&self) {
        self.pending_device_loss.store(true, Ordering::Release);
    }

    pub fn allocated_bytes(&self) -> u64 {
        self.allocated_bytes.load(Ordering::Relaxed)
    }

    pub fn set_allocated_bytes(&self, bytes: u64) {
        self.allocated_bytes.store(bytes, Ordering::Relaxed);
    }

    pub fn pipelines_compiled(&self) -> u64 {
        self.pipelines_compiled.load(Ordering::Relaxed)
    }

    pub fn record_pipeline_compiled(&self) {
        self.pipelines_compiled.fetch_add(1, Ordering::Relaxed);
    }
}
