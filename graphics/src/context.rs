//! The render thread side of the render system.
//!
//! [`DeviceContext`] owns the backend and the device's copy of the render
//! state. Commands receive it mutably, so device hooks are only reachable
//! from whichever thread currently drains the command queues.

use std::cell::Cell;
use std::sync::Arc;

use vesper_core::{Color, CpuImage};

use crate::backend::{Backend, BackendKind, Device, DeviceStats, DeviceTexture, TextureBinding};
use crate::error::GraphicsError;
use crate::state::{PipelineKey, Primitive, RenderState, StateChanges};
use crate::stats::RenderStatistics;
use crate::system::RenderShared;
use crate::texture::{LoadMode, LoadState, Texture, TextureId};
use crate::vertex::Vertices;

thread_local! {
    static ON_RENDER_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is executing render commands.
pub(crate) fn on_render_thread() -> bool {
    ON_RENDER_THREAD.with(Cell::get)
}

/// Marks the current thread as executing render commands until dropped.
pub(crate) struct RenderThreadGuard {
    previous: bool,
}

impl RenderThreadGuard {
    pub fn enter() -> Self {
        let previous = ON_RENDER_THREAD.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for RenderThreadGuard {
    fn drop(&mut self) {
        ON_RENDER_THREAD.with(|flag| flag.set(self.previous));
    }
}

/// Executor state used by commands on the render thread.
pub struct DeviceContext {
    backend: Backend,
    shared: Arc<RenderShared>,
    /// What the device was last told.
    device_state: RenderState,
    bound_texture: Option<TextureBinding>,
    bound_target: Option<DeviceTexture>,
    /// Issue every state hook on the next sync.
    force_sync: bool,
    frame: RenderStatistics,
    stats: Arc<DeviceStats>,
}

impl DeviceContext {
    pub(crate) fn new(
        backend: Backend,
        shared: Arc<RenderShared>,
        stats: Arc<DeviceStats>,
    ) -> Self {
        Self {
            backend,
            shared,
            device_state: RenderState::default(),
            bound_texture: None,
            bound_target: None,
            force_sync: true,
            frame: RenderStatistics::default(),
            stats,
        }
    }

    pub fn device(&mut self) -> &mut dyn Device {
        self.backend.device()
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Render state the device currently has.
    pub fn device_state(&self) -> &RenderState {
        &self.device_state
    }

    /// Statistics of the frame being executed.
    pub fn frame_statistics(&self) -> &RenderStatistics {
        &self.frame
    }

    pub(crate) fn texture(&self, id: TextureId) -> Option<Arc<Texture>> {
        self.shared.texture(id)
    }

    pub(crate) fn unregister_texture(&mut self, id: TextureId) {
        if self.device_state.texture == Some(id) {
            self.device_state.texture = None;
        }
        if self.device_state.render_target == Some(id) {
            self.device_state.render_target = None;
        }
        self.shared.unregister_texture(id);
    }

    pub(crate) fn shared(&self) -> &RenderShared {
        &self.shared
    }

    /// Handle a failed device call. Returns `true` when the call succeeded.
    pub(crate) fn check(&mut self, what: &str, result: Result<(), GraphicsError>) -> bool {
        match result {
            Ok(()) => true,
            Err(GraphicsError::DeviceLost) => {
                self.recover_device_lost();
                false
            }
            Err(err) => {
                log::warn!("{} failed: {}", what, err);
                false
            }
        }
    }

    /// Reset the device and forget every handle it gave out.
    ///
    /// Textures fall back to `Unloaded` and reload on their next use.
    pub(crate) fn recover_device_lost(&mut self) {
        log::warn!("{} device lost, resetting", self.backend.name());
        if let Err(err) = self.backend.device().reset() {
            log::error!("Device reset failed: {}", err);
        }
        for texture in self.shared.texture_list() {
            texture.invalidate_device();
        }
        self.stats.end_all_residencies();
        self.device_state = RenderState::default();
        self.bound_texture = None;
        self.bound_target = None;
        self.force_sync = true;
        self.frame.device_resets += 1;
    }

    /// The texture's device copy is gone; a later upload is a new residency.
    pub(crate) fn end_residency(&self, id: TextureId) {
        self.stats.end_texture_residency(id.raw());
    }

    pub(crate) fn forget_texture(&self, id: TextureId) {
        self.stats.forget_texture(id.raw());
    }

    pub(crate) fn notify_low_memory(&self) {
        self.shared.notify_low_memory();
    }

    /// Destroy a device texture and drop any binding that refers to it.
    pub(crate) fn destroy_device_texture(&mut self, handle: DeviceTexture) {
        self.backend.device().destroy_texture(handle);
        if self.bound_texture.is_some_and(|b| b.handle == handle) {
            self.bound_texture = None;
            self.device_state.texture = None;
        }
        if self.bound_target == Some(handle) {
            self.bound_target = None;
            self.device_state.render_target = None;
            self.force_sync = true;
        }
    }

    pub(crate) fn record_upload(&mut self, id: TextureId, asynchronous: bool) {
        self.stats.record_texture_upload(id.raw());
        self.frame.texture_uploads += 1;
        if asynchronous {
            self.frame.async_uploads += 1;
        }
    }

    /// Device handle for a texture, uploading it first if needed.
    fn resolve(&mut self, id: Option<TextureId>) -> Option<DeviceTexture> {
        let texture = self.shared.texture(id?)?;
        texture.upload(self, false)
    }

    /// Bring the device in line with `state`, issuing only the hooks whose
    /// values differ. Returns the texture bound afterwards.
    ///
    /// Hooks run in a fixed order; the texture is always bound before blend
    /// and color mode so backends can pick pipelines from the bound texture.
    pub(crate) fn sync_state(&mut self, state: &RenderState) -> Option<TextureBinding> {
        let target = self.resolve(state.render_target);
        let binding = self.resolve(state.texture).map(|handle| TextureBinding {
            handle,
            filter: state.texture_filter,
            address_mode: state.texture_address_mode,
        });

        let mut changes = if self.force_sync {
            StateChanges::all()
        } else {
            state.diff(&self.device_state)
        };
        // A reloaded texture keeps its id but gets a new handle.
        if target != self.bound_target {
            changes |= StateChanges::RENDER_TARGET;
        }
        if binding != self.bound_texture {
            changes |= StateChanges::TEXTURE;
        }
        if changes.is_empty() {
            return self.bound_texture;
        }
        self.force_sync = false;

        match self.apply_changes(changes, state, target, binding) {
            Ok(()) => self.bound_texture,
            Err(GraphicsError::DeviceLost) => {
                self.recover_device_lost();
                None
            }
            Err(err) => {
                log::warn!("Render state sync failed: {}", err);
                self.force_sync = true;
                self.bound_texture
            }
        }
    }

    fn apply_changes(
        &mut self,
        changes: StateChanges,
        state: &RenderState,
        target: Option<DeviceTexture>,
        binding: Option<TextureBinding>,
    ) -> Result<(), GraphicsError> {
        let device = self.backend.device();
        let mut issued = 0;

        if changes.contains(StateChanges::RENDER_TARGET) {
            device.set_render_target(target)?;
            self.bound_target = target;
            self.device_state.render_target = state.render_target;
            issued += 1;
        }
        if changes.contains(StateChanges::VIEWPORT) {
            device.set_viewport(state.viewport)?;
            self.device_state.viewport = state.viewport;
            issued += 1;
        }
        if changes.contains(StateChanges::MODELVIEW) {
            device.set_modelview_matrix(&state.modelview)?;
            self.device_state.modelview = state.modelview;
            issued += 1;
        }
        if changes.contains(StateChanges::PROJECTION) {
            device.set_projection_matrix(&state.projection)?;
            self.device_state.projection = state.projection;
            issued += 1;
        }
        if changes.contains(StateChanges::DEPTH) {
            device.set_depth_buffer(state.depth_buffer, state.depth_write)?;
            self.device_state.depth_buffer = state.depth_buffer;
            self.device_state.depth_write = state.depth_write;
            issued += 1;
        }
        if changes.contains(StateChanges::TEXTURE) {
            device.set_texture(binding)?;
            self.bound_texture = binding;
            self.device_state.texture = state.texture;
            self.device_state.texture_filter = state.texture_filter;
            self.device_state.texture_address_mode = state.texture_address_mode;
            self.frame.texture_switches += 1;
            issued += 1;
        }
        if changes.contains(StateChanges::BLEND_MODE) {
            device.set_blend_mode(state.blend_mode)?;
            self.device_state.blend_mode = state.blend_mode;
            issued += 1;
        }
        if changes.contains(StateChanges::COLOR_MODE) {
            device.set_color_mode(state.color_mode, state.color_mode_factor)?;
            self.device_state.color_mode = state.color_mode;
            self.device_state.color_mode_factor = state.color_mode_factor;
            issued += 1;
        }

        self.frame.state_changes += issued;
        Ok(())
    }

    pub(crate) fn render(&mut self, state: &RenderState, primitive: Primitive, vertices: &Vertices) {
        if vertices.is_empty() {
            return;
        }
        let binding = self.sync_state(state);
        let key = PipelineKey {
            use_texture: binding.is_some() && vertices.has_uv(),
            use_color: vertices.has_color(),
            color_mode: state.color_mode,
            blend_mode: state.blend_mode,
            primitive_class: primitive.class(),
            depth_enabled: state.depth_buffer,
        };
        let result = self
            .backend
            .device()
            .draw(primitive, vertices, key, state.system_color);
        if self.check("Draw", result) {
            let count = vertices.len();
            self.frame.draw_calls += 1;
            self.frame.vertices += count as u64;
            self.frame.triangles += primitive.triangle_count(count) as u64;
            self.frame.lines += primitive.line_count(count) as u64;
        }
    }

    pub(crate) fn clear(&mut self, state: &RenderState, color: Color, depth: bool) {
        self.sync_state(state);
        let result = self.backend.device().clear(color, depth);
        self.check("Clear", result);
    }

    /// Upload textures whose async decode finished, at most `limit` of them.
    pub(crate) fn upload_ready_textures(&mut self, limit: Option<usize>) -> usize {
        let mut uploaded = 0;
        for texture in self.shared.texture_list() {
            if limit.is_some_and(|limit| uploaded >= limit) {
                break;
            }
            if texture.load_mode() != LoadMode::Async
                || texture.state() != LoadState::ReadyForUpload
            {
                continue;
            }
            if texture.upload(self, true).is_some() {
                uploaded += 1;
            }
        }
        if uploaded > 0 {
            log::debug!("Uploaded {} async textures", uploaded);
        }
        uploaded
    }

    pub(crate) fn end_frame(&mut self, update_stats: bool) {
        let limit = match self.shared.options.max_async_uploads_per_frame {
            0 => None,
            n => Some(n),
        };
        self.upload_ready_textures(limit);
        if update_stats {
            self.publish_statistics();
        }
    }

    pub(crate) fn present(&mut self) {
        let result = self.backend.device().present();
        self.check("Present", result);
        self.publish_statistics();
    }

    fn publish_statistics(&mut self) {
        let frame = self.shared.publish_statistics(self.frame);
        self.frame = RenderStatistics {
            frame,
            ..RenderStatistics::default()
        };
    }

    pub(crate) fn read_framebuffer(&mut self) -> Result<CpuImage, GraphicsError> {
        match self.backend.device().read_framebuffer() {
            Err(GraphicsError::DeviceLost) => {
                self.recover_device_lost();
                Err(GraphicsError::DeviceLost)
            }
            other => other,
        }
    }

    /// Release every device texture before the backend is dropped.
    pub(crate) fn shutdown(mut self) {
        for texture in self.shared.texture_list() {
            texture.destroy_device(&mut self);
        }
        log::info!("{} device shut down", self.backend.name());
    }
}
