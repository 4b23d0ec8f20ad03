//! Streamed textures.
//!
//! A [`Texture`] moves through four [`LoadState`]s:
//!
//! ```text
//! Unloaded -> AsyncLoadQueued -> ReadyForUpload -> Uploaded
//!     ^              |                  |              |
//!     +--------------+------------------+--------------+  unload()
//! ```
//!
//! Decoding runs on the [`TextureLoader`] threads. Device uploads only
//! happen on the render thread, either capped per frame for
//! [`LoadMode::Async`] textures or on first use.
//!
//! An in-flight decode cannot be interrupted. Unloading a queued texture
//! marks its pending load as discarded instead; the loader skips discarded
//! jobs it has not started and drops the result of those it has.

mod access;
mod loader;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use vesper_core::texture::{self as image_io, ImageInfo};
use vesper_core::{Color, CoreError, CpuImage, PixelFormat, Rect};

use crate::backend::{DeviceTexture, TextureDescriptor};
use crate::command::{FlushTextureCommand, UnloadTextureCommand};
use crate::context::DeviceContext;
use crate::error::GraphicsError;
use crate::state::{AddressMode, TextureFilter};
use crate::system::RenderShared;

pub(crate) use loader::{LoadJob, TextureLoader};

/// Stable identity of a texture within its render system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Initial contents of a texture created from memory.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureData {
    /// Tightly packed pixels in the texture's format.
    Pixels(Vec<u8>),
    /// Every pixel set to one color.
    Color(Color),
}

/// How a texture's CPU copy is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureKind {
    /// CPU pixels are dropped once uploaded.
    Immutable,
    /// CPU pixels are kept alongside the device copy.
    #[default]
    Managed,
    /// Pixels are owned by something outside the render system; no pixel
    /// access.
    External,
    /// Device-only texture that can be rendered into.
    RenderTarget,
}

impl TextureKind {
    fn retains_pixels(self) -> bool {
        self == Self::Managed
    }

    fn is_device_only(self) -> bool {
        self == Self::RenderTarget
    }
}

/// When a file-backed texture is decoded and uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LoadMode {
    /// Decode in the background and upload at a frame boundary.
    #[default]
    Async,
    /// Decode in the background, upload on first use.
    AsyncDeferredUpload,
    /// Decode and upload synchronously on first use.
    OnDemand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    Unloaded,
    AsyncLoadQueued,
    ReadyForUpload,
    Uploaded,
}

/// Shared between a texture and the loader job decoding for it.
#[derive(Debug, Default)]
pub(crate) struct PendingLoad {
    discarded: AtomicBool,
    urgent: AtomicBool,
}

impl PendingLoad {
    pub fn discard(&self) {
        self.discarded.store(true, Ordering::Release);
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded.load(Ordering::Acquire)
    }

    pub fn mark_urgent(&self) {
        self.urgent.store(true, Ordering::Release);
    }

    pub fn is_urgent(&self) -> bool {
        self.urgent.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct TextureSource {
    path: PathBuf,
    format: Option<PixelFormat>,
}

impl TextureSource {
    fn decode(&self) -> Result<CpuImage, CoreError> {
        match self.format {
            Some(format) => image_io::load_as(&self.path, format),
            None => image_io::load(&self.path),
        }
    }
}

#[derive(Debug)]
struct TextureInner {
    state: LoadState,
    width: u32,
    height: u32,
    format: PixelFormat,
    filter: TextureFilter,
    address_mode: AddressMode,
    data: Option<CpuImage>,
    device: Option<DeviceTexture>,
    pending: Option<Arc<PendingLoad>>,
    /// Holds one of the loader's waiting slots.
    counted_waiting: bool,
    /// Pixels came from the loader threads.
    decoded_async: bool,
    dirty: Option<Rect>,
    flush_queued: bool,
    unload_queued: bool,
    load_failed: bool,
    idle: Duration,
}

impl TextureInner {
    fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            state: LoadState::Unloaded,
            width,
            height,
            format,
            filter: TextureFilter::default(),
            address_mode: AddressMode::default(),
            data: None,
            device: None,
            pending: None,
            counted_waiting: false,
            decoded_async: false,
            dirty: None,
            flush_queued: false,
            unload_queued: false,
            load_failed: false,
            idle: Duration::ZERO,
        }
    }
}

/// A texture owned by a [`crate::RenderSystem`].
///
/// Textures are shared as `Arc<Texture>`; every method takes `&self` and
/// may be called from any thread.
pub struct Texture {
    id: TextureId,
    name: String,
    kind: TextureKind,
    load_mode: LoadMode,
    source: Option<TextureSource>,
    inner: Mutex<TextureInner>,
    changed: Condvar,
    /// Textures whose idle timers restart whenever this one is used.
    links: Mutex<Vec<Weak<Texture>>>,
    this: Weak<Texture>,
    system: Weak<RenderShared>,
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

impl Texture {
    fn build(
        id: TextureId,
        name: String,
        kind: TextureKind,
        load_mode: LoadMode,
        source: Option<TextureSource>,
        inner: TextureInner,
        system: Weak<RenderShared>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            id,
            name,
            kind,
            load_mode,
            source,
            inner: Mutex::new(inner),
            changed: Condvar::new(),
            links: Mutex::new(Vec::new()),
            this: this.clone(),
            system,
        })
    }

    /// Texture backed by pixels already in memory.
    pub(crate) fn from_image(
        id: TextureId,
        name: String,
        image: CpuImage,
        kind: TextureKind,
        system: Weak<RenderShared>,
    ) -> Arc<Self> {
        let mut inner = TextureInner::new(image.width(), image.height(), image.format());
        inner.data = Some(image);
        inner.state = LoadState::ReadyForUpload;
        Self::build(id, name, kind, LoadMode::OnDemand, None, inner, system)
    }

    pub(crate) fn render_target(
        id: TextureId,
        name: String,
        width: u32,
        height: u32,
        system: Weak<RenderShared>,
    ) -> Arc<Self> {
        let inner = TextureInner::new(width, height, PixelFormat::Rgba8);
        Self::build(
            id,
            name,
            TextureKind::RenderTarget,
            LoadMode::OnDemand,
            None,
            inner,
            system,
        )
    }

    /// File-backed texture. `info` comes from reading the file header.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_file(
        id: TextureId,
        name: String,
        path: PathBuf,
        format: Option<PixelFormat>,
        info: Option<ImageInfo>,
        kind: TextureKind,
        load_mode: LoadMode,
        system: Weak<RenderShared>,
    ) -> Arc<Self> {
        let mut inner = match info {
            Some(info) => TextureInner::new(info.width, info.height, format.unwrap_or(info.format)),
            None => TextureInner::new(0, 0, format.unwrap_or_default()),
        };
        inner.load_failed = info.is_none();
        let source = TextureSource { path, format };
        Self::build(id, name, kind, load_mode, Some(source), inner, system)
    }

    pub fn id(&self) -> TextureId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn load_mode(&self) -> LoadMode {
        self.load_mode
    }

    /// Path of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.source.as_ref().map(|s| s.path.as_path())
    }

    pub fn state(&self) -> LoadState {
        self.inner.lock().state
    }

    pub fn width(&self) -> u32 {
        self.inner.lock().width
    }

    pub fn height(&self) -> u32 {
        self.inner.lock().height
    }

    pub fn format(&self) -> PixelFormat {
        self.inner.lock().format
    }

    pub fn filter(&self) -> TextureFilter {
        self.inner.lock().filter
    }

    /// Takes effect the next time the texture is passed to
    /// [`crate::RenderSystem::set_texture`].
    pub fn set_filter(&self, filter: TextureFilter) {
        self.inner.lock().filter = filter;
    }

    pub fn address_mode(&self) -> AddressMode {
        self.inner.lock().address_mode
    }

    pub fn set_address_mode(&self, mode: AddressMode) {
        self.inner.lock().address_mode = mode;
    }

    /// Whether the texture is on the device.
    pub fn is_loaded(&self) -> bool {
        self.state() == LoadState::Uploaded
    }

    pub fn is_async_load_queued(&self) -> bool {
        self.state() == LoadState::AsyncLoadQueued
    }

    /// Whether the last load attempt failed. Cleared by [`Texture::unload`].
    pub fn is_load_failed(&self) -> bool {
        self.inner.lock().load_failed
    }

    /// Re-read dimensions and format from the file header.
    pub fn load_meta_data(&self) -> bool {
        let Some(source) = &self.source else {
            let inner = self.inner.lock();
            return inner.width > 0 && inner.height > 0;
        };
        match image_io::probe(&source.path) {
            Ok(info) => {
                let mut inner = self.inner.lock();
                if inner.data.is_none() {
                    inner.width = info.width;
                    inner.height = info.height;
                    inner.format = source.format.unwrap_or(info.format);
                }
                if inner.state == LoadState::Unloaded {
                    inner.load_failed = false;
                }
                true
            }
            Err(err) => {
                log::warn!("Cannot read metadata of texture {}: {}", self.name, err);
                false
            }
        }
    }

    /// Queue a background decode of the backing file.
    ///
    /// Only valid from `Unloaded`; returns whether a load was queued.
    pub fn load_async(&self) -> bool {
        let Some(source) = &self.source else {
            return false;
        };
        let Some(system) = self.system.upgrade() else {
            return false;
        };
        let mut inner = self.inner.lock();
        if inner.state != LoadState::Unloaded {
            return false;
        }
        let pending = Arc::new(PendingLoad::default());
        inner.pending = Some(pending.clone());
        inner.state = LoadState::AsyncLoadQueued;
        inner.load_failed = false;
        system.loader.submit(LoadJob {
            texture: self.this.clone(),
            pending,
            name: self.name.clone(),
            path: source.path.clone(),
            format: source.format,
        });
        log::debug!("Queued async load of texture {}", self.name);
        true
    }

    /// Load and upload synchronously. Blocks until the render thread is done.
    pub fn load(&self) -> bool {
        if self.is_loaded() {
            return true;
        }
        let (Some(system), Some(texture)) = (self.system.upgrade(), self.this.upgrade()) else {
            return false;
        };
        match system.run_sync("LoadTexture", move |ctx| texture.upload(ctx, false).is_some()) {
            Ok(loaded) => loaded,
            Err(err) => {
                log::warn!("Cannot load texture {}: {}", self.name, err);
                false
            }
        }
    }

    /// Drop the texture's data back to `Unloaded`.
    ///
    /// A queued async load is discarded; the device copy of an uploaded
    /// texture is released by the render thread in queue order.
    pub fn unload(&self) {
        let mut inner = self.inner.lock();
        inner.load_failed = false;
        match inner.state {
            LoadState::AsyncLoadQueued => {
                if let Some(pending) = inner.pending.take() {
                    pending.discard();
                }
                inner.state = LoadState::Unloaded;
                log::debug!("Discarded async load of texture {}", self.name);
            }
            LoadState::ReadyForUpload => {
                self.release_waiting(&mut inner);
                if self.drops_pixels_on_unload() {
                    inner.data = None;
                }
                inner.state = LoadState::Unloaded;
            }
            LoadState::Uploaded => {
                if !inner.unload_queued {
                    if let Some(system) = self.system.upgrade() {
                        inner.unload_queued = true;
                        system.enqueue(Box::new(UnloadTextureCommand(self.id)));
                    }
                }
            }
            LoadState::Unloaded => {
                if self.source.is_some() {
                    inner.data = None;
                }
            }
        }
        self.changed.notify_all();
    }

    /// Wait for a queued async load to finish, moving it to the front of the
    /// loader queue. A zero timeout waits without bound.
    ///
    /// Returns `false` when the timeout expired first.
    pub fn wait_for_async_load(&self, timeout: Duration) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != LoadState::AsyncLoadQueued {
            return true;
        }
        if let (Some(pending), Some(system)) = (&inner.pending, self.system.upgrade()) {
            system.loader.prioritize(pending);
        }
        let deadline = (!timeout.is_zero()).then(|| Instant::now() + timeout);
        while inner.state == LoadState::AsyncLoadQueued {
            match deadline {
                None => self.changed.wait(&mut inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    self.changed.wait_for(&mut inner, deadline - now);
                }
            }
        }
        true
    }

    /// Move a queued load to the front of the loader queue.
    pub fn prioritize_load(&self) {
        let inner = self.inner.lock();
        if let (Some(pending), Some(system)) = (&inner.pending, self.system.upgrade()) {
            system.loader.prioritize(pending);
        }
    }

    /// Tie the idle timers of two textures together, so that pages of one
    /// atlas stay resident or unload as a group. Links are symmetric.
    pub fn add_dynamic_link(&self, other: &Arc<Texture>) {
        if other.id == self.id {
            return;
        }
        if self.link_one_way(&Arc::downgrade(other)) {
            other.link_one_way(&self.this);
        }
    }

    pub fn remove_dynamic_link(&self, other: &Texture) {
        self.unlink_one_way(other.id);
        other.unlink_one_way(self.id);
    }

    /// Textures currently linked to this one.
    pub fn dynamic_links(&self) -> Vec<Arc<Texture>> {
        self.links.lock().iter().filter_map(Weak::upgrade).collect()
    }

    fn link_one_way(&self, other: &Weak<Texture>) -> bool {
        let mut links = self.links.lock();
        links.retain(|link| link.strong_count() > 0);
        if links.iter().any(|link| link.ptr_eq(other)) {
            return false;
        }
        links.push(other.clone());
        true
    }

    fn unlink_one_way(&self, id: TextureId) {
        self.links
            .lock()
            .retain(|link| link.upgrade().is_some_and(|t| t.id != id));
    }

    /// Restart the idle timers of this texture and its links.
    pub(crate) fn keep_alive(&self) {
        self.inner.lock().idle = Duration::ZERO;
        self.touch_links();
    }

    /// Restart the idle timers of linked textures after this one was used.
    fn touch_links(&self) {
        for linked in self.dynamic_links() {
            linked.inner.lock().idle = Duration::ZERO;
        }
    }

    fn drops_pixels_on_unload(&self) -> bool {
        self.source.is_some() || !self.kind.retains_pixels()
    }

    fn release_waiting(&self, inner: &mut TextureInner) {
        inner.decoded_async = false;
        if inner.counted_waiting {
            inner.counted_waiting = false;
            if let Some(system) = self.system.upgrade() {
                system.loader.release_waiting();
            }
        }
    }

    /// Accept a decode result from the loader.
    ///
    /// Returns `false` when the load was discarded or superseded, in which
    /// case the caller drops the pixels.
    pub(crate) fn complete_async_load(
        &self,
        pending: &Arc<PendingLoad>,
        result: Result<CpuImage, CoreError>,
        loader: &TextureLoader,
    ) -> bool {
        let mut inner = self.inner.lock();
        let current = inner
            .pending
            .as_ref()
            .is_some_and(|p| Arc::ptr_eq(p, pending));
        if !current || pending.is_discarded() {
            return false;
        }
        inner.pending = None;
        match result {
            Ok(image) => {
                inner.width = image.width();
                inner.height = image.height();
                inner.format = image.format();
                inner.data = Some(image);
                inner.state = LoadState::ReadyForUpload;
                inner.decoded_async = true;
                // Deferred textures wait for first use, which may never come;
                // only frame-boundary uploads hold back further decodes.
                if self.load_mode == LoadMode::Async {
                    inner.counted_waiting = true;
                    loader.add_waiting();
                }
                log::debug!("Texture {} decoded, ready for upload", self.name);
            }
            Err(err) => {
                log::warn!("Failed to load texture {}: {}", self.name, err);
                inner.load_failed = true;
                inner.state = LoadState::Unloaded;
            }
        }
        self.changed.notify_all();
        true
    }

    /// Give up on a queued load that will never run.
    pub(crate) fn abort_async_load(&self, pending: &Arc<PendingLoad>) {
        let mut inner = self.inner.lock();
        if inner
            .pending
            .as_ref()
            .is_some_and(|p| Arc::ptr_eq(p, pending))
        {
            inner.pending = None;
            inner.state = LoadState::Unloaded;
            inner.load_failed = true;
            self.changed.notify_all();
        }
    }

    /// Decode the backing file on the calling thread.
    ///
    /// Leaves the texture `ReadyForUpload` on success. Returns `true` also
    /// when another thread got the texture past `Unloaded` meanwhile.
    fn decode_now(&self) -> bool {
        let Some(source) = &self.source else {
            log::warn!("Texture {} has no pixels to load", self.name);
            self.inner.lock().load_failed = true;
            return false;
        };
        let result = source.decode();
        let mut inner = self.inner.lock();
        if inner.state != LoadState::Unloaded {
            return true;
        }
        match result {
            Ok(image) => {
                inner.width = image.width();
                inner.height = image.height();
                inner.format = image.format();
                inner.data = Some(image);
                inner.state = LoadState::ReadyForUpload;
                inner.load_failed = false;
                self.changed.notify_all();
                true
            }
            Err(err) => {
                log::warn!("Failed to load texture {}: {}", self.name, err);
                inner.load_failed = true;
                false
            }
        }
    }

    fn allocate(
        &self,
        inner: &TextureInner,
        ctx: &mut DeviceContext,
    ) -> Result<DeviceTexture, GraphicsError> {
        if inner.width == 0 || inner.height == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {} has no size",
                self.name
            )));
        }
        let desc = TextureDescriptor {
            label: self.name.clone(),
            width: inner.width,
            height: inner.height,
            format: inner.format,
            render_target: self.kind.is_device_only(),
        };
        let device = ctx.device();
        let handle = device.create_texture(&desc)?;
        if let Some(image) = &inner.data {
            if let Err(err) = device.upload_texture(handle, image) {
                device.destroy_texture(handle);
                return Err(err);
            }
        }
        Ok(handle)
    }

    /// Get the texture onto the device. Render thread only.
    ///
    /// With `only_if_ready` nothing happens unless the pixels are already
    /// decoded. Otherwise a queued load is waited for and an unloaded
    /// texture is decoded synchronously. A failed allocation notifies the
    /// low-memory handler and is retried once.
    pub(crate) fn upload(
        &self,
        ctx: &mut DeviceContext,
        only_if_ready: bool,
    ) -> Option<DeviceTexture> {
        let mut retried = false;
        loop {
            let mut inner = self.inner.lock();
            match inner.state {
                LoadState::Uploaded => {
                    inner.idle = Duration::ZERO;
                    let device = inner.device;
                    drop(inner);
                    self.touch_links();
                    return device;
                }
                LoadState::ReadyForUpload => {}
                _ if only_if_ready => return None,
                LoadState::AsyncLoadQueued => {
                    drop(inner);
                    self.wait_for_async_load(Duration::ZERO);
                    continue;
                }
                LoadState::Unloaded => {
                    if inner.load_failed {
                        return None;
                    }
                    if !self.kind.is_device_only() && inner.data.is_none() {
                        drop(inner);
                        if !self.decode_now() {
                            return None;
                        }
                        continue;
                    }
                }
            }

            match self.allocate(&inner, ctx) {
                Ok(handle) => {
                    let asynchronous = inner.decoded_async;
                    inner.device = Some(handle);
                    inner.state = LoadState::Uploaded;
                    inner.dirty = None;
                    inner.idle = Duration::ZERO;
                    self.release_waiting(&mut inner);
                    if !self.kind.retains_pixels() {
                        inner.data = None;
                    }
                    ctx.record_upload(self.id, asynchronous);
                    self.changed.notify_all();
                    drop(inner);
                    self.touch_links();
                    log::trace!("Uploaded texture {} as {:?}", self.name, handle);
                    return Some(handle);
                }
                Err(GraphicsError::OutOfMemory) if !retried => {
                    drop(inner);
                    log::warn!("Out of memory uploading texture {}, retrying", self.name);
                    ctx.notify_low_memory();
                    retried = true;
                }
                Err(GraphicsError::DeviceLost) => {
                    drop(inner);
                    ctx.recover_device_lost();
                    return None;
                }
                Err(err) => {
                    log::error!("Failed to upload texture {}: {}", self.name, err);
                    inner.load_failed = true;
                    self.release_waiting(&mut inner);
                    if self.drops_pixels_on_unload() {
                        inner.data = None;
                    }
                    inner.state = LoadState::Unloaded;
                    self.changed.notify_all();
                    return None;
                }
            }
        }
    }

    /// Release the device copy after an [`Texture::unload`].
    pub(crate) fn release_device(&self, ctx: &mut DeviceContext) {
        let mut inner = self.inner.lock();
        inner.unload_queued = false;
        if inner.state != LoadState::Uploaded {
            return;
        }
        if let Some(handle) = inner.device.take() {
            ctx.destroy_device_texture(handle);
        }
        ctx.end_residency(self.id);
        if self.drops_pixels_on_unload() {
            inner.data = None;
        }
        inner.dirty = None;
        inner.state = LoadState::Unloaded;
        self.changed.notify_all();
        log::debug!("Unloaded texture {}", self.name);
    }

    /// Release everything the texture holds, whatever its state.
    pub(crate) fn destroy_device(&self, ctx: &mut DeviceContext) {
        let mut inner = self.inner.lock();
        if let Some(pending) = inner.pending.take() {
            pending.discard();
        }
        self.release_waiting(&mut inner);
        if let Some(handle) = inner.device.take() {
            ctx.destroy_device_texture(handle);
        }
        ctx.forget_texture(self.id);
        inner.data = None;
        inner.dirty = None;
        inner.state = LoadState::Unloaded;
        self.changed.notify_all();
        drop(inner);
        for linked in self.dynamic_links() {
            self.remove_dynamic_link(&linked);
        }
    }

    /// Discard a queued load ahead of destruction.
    pub(crate) fn cancel_async_load(&self) {
        let mut inner = self.inner.lock();
        if let Some(pending) = inner.pending.take() {
            pending.discard();
            inner.state = LoadState::Unloaded;
            self.changed.notify_all();
        }
    }

    /// Forget the device handle after a device reset.
    pub(crate) fn invalidate_device(&self) {
        let mut inner = self.inner.lock();
        inner.device = None;
        inner.dirty = None;
        inner.flush_queued = false;
        if inner.state == LoadState::Uploaded {
            inner.state = LoadState::Unloaded;
            if self.drops_pixels_on_unload() {
                inner.data = None;
            }
        }
    }

    /// Send modified pixels to the device.
    pub(crate) fn flush(&self, ctx: &mut DeviceContext, replacement: Option<CpuImage>) {
        let mut inner = self.inner.lock();
        inner.flush_queued = false;
        let Some(handle) = inner.device else {
            return;
        };
        let (x, y, image) = match replacement {
            Some(image) => (0, 0, image),
            None => {
                let Some(rect) = inner.dirty.take() else {
                    return;
                };
                let Some(region) = inner.data.as_ref().and_then(|d| d.region(rect)) else {
                    return;
                };
                (rect.x as u32, rect.y as u32, region)
            }
        };
        drop(inner);
        let result = ctx.device().update_texture(handle, x, y, &image);
        ctx.check("Texture update", result);
    }

    /// Copy the device pixels back to the CPU.
    pub(crate) fn read_back(&self, ctx: &mut DeviceContext) -> Result<CpuImage, GraphicsError> {
        let handle = self.inner.lock().device.ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("texture {} is not uploaded", self.name))
        })?;
        match ctx.device().read_texture(handle) {
            Err(GraphicsError::DeviceLost) => {
                ctx.recover_device_lost();
                Err(GraphicsError::DeviceLost)
            }
            other => other,
        }
    }

    /// Advance the idle timer of an uploaded, reloadable texture.
    ///
    /// Returns `true` when it has been idle for at least `limit`.
    pub(crate) fn tick_idle(&self, dt: Duration, limit: Duration) -> bool {
        if self.source.is_none() {
            return false;
        }
        let mut inner = self.inner.lock();
        if inner.state != LoadState::Uploaded {
            inner.idle = Duration::ZERO;
            return false;
        }
        inner.idle += dt;
        inner.idle >= limit
    }

    /// Record a CPU-side modification of an uploaded texture.
    fn mark_dirty(&self, inner: &mut TextureInner, rect: Rect, system: &RenderShared) {
        if inner.state != LoadState::Uploaded {
            return;
        }
        inner.dirty = Some(match inner.dirty {
            Some(dirty) => dirty.union(&rect),
            None => rect,
        });
        if !inner.flush_queued {
            inner.flush_queued = true;
            system.enqueue(Box::new(FlushTextureCommand {
                id: self.id,
                replacement: None,
            }));
        }
    }
}
