//! The render system: application-facing API and the state it shares with
//! the render thread and the texture loader.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use vesper_core::math::ortho_projection;
use vesper_core::texture as image_io;
use vesper_core::{Color, CpuImage, Mat4, PixelFormat, Rect, RectF, Vec2, Vec3};

use crate::backend::{Backend, DeviceStats};
use crate::command::{
    AsyncCommand, ClearCommand, CommandQueues, DestroyTextureCommand, EndFrameCommand, FnCommand,
    PresentCommand, RenderCommand, UploadReadyTexturesCommand, UploadTextureCommand,
};
use crate::context::{on_render_thread, DeviceContext, RenderThreadGuard};
use crate::error::GraphicsError;
use crate::options::{RenderSystemOptions, ThreadingMode};
use crate::state::{AddressMode, BlendMode, ColorMode, Primitive, RenderState, TextureFilter};
use crate::stats::RenderStatistics;
use crate::texture::{LoadMode, Texture, TextureData, TextureId, TextureKind, TextureLoader};
use crate::vertex::{PlainVertex, TexturedVertex, Vertex, Vertices};

type LowMemoryCallback = Arc<dyn Fn() + Send + Sync>;

/// State shared by the application thread, the render thread and the
/// loader threads.
pub(crate) struct RenderShared {
    pub options: RenderSystemOptions,
    pub loader: Arc<TextureLoader>,
    queues: CommandQueues,
    textures: Mutex<BTreeMap<TextureId, Arc<Texture>>>,
    next_texture_id: AtomicU64,
    statistics: Mutex<RenderStatistics>,
    low_memory: Mutex<Option<LowMemoryCallback>>,
    /// The executor when commands run on the calling thread.
    inline: Mutex<Option<DeviceContext>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl RenderShared {
    pub fn enqueue(&self, command: Box<dyn AsyncCommand>) {
        self.queues.push(command);
    }

    pub fn texture(&self, id: TextureId) -> Option<Arc<Texture>> {
        self.textures.lock().get(&id).cloned()
    }

    /// Snapshot of the registry in id order.
    pub fn texture_list(&self) -> Vec<Arc<Texture>> {
        self.textures.lock().values().cloned().collect()
    }

    pub fn unregister_texture(&self, id: TextureId) {
        self.textures.lock().remove(&id);
    }

    fn register_texture(&self, texture: Arc<Texture>) {
        self.textures.lock().insert(texture.id(), texture);
    }

    fn next_id(&self) -> TextureId {
        TextureId::new(self.next_texture_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn notify_low_memory(&self) {
        let callback = self.low_memory.lock().clone();
        match callback {
            Some(callback) => callback(),
            None => log::warn!("Low memory, no handler registered"),
        }
    }

    /// Store the statistics of a finished frame. Returns its frame number.
    pub fn publish_statistics(&self, frame: RenderStatistics) -> u64 {
        let mut published = self.statistics.lock();
        let number = published.frame + 1;
        *published = RenderStatistics {
            frame: number,
            ..frame
        };
        number
    }

    /// Run closed queues on the calling thread.
    fn drain_inline(&self) {
        let mut executor = self.inline.lock();
        let Some(ctx) = executor.as_mut() else {
            return;
        };
        let _render = RenderThreadGuard::enter();
        while let Some(queue) = self.queues.try_next() {
            queue.execute(ctx);
            self.queues.complete();
        }
    }

    fn wait_completed(&self, ticket: u64) {
        match self.options.threading {
            ThreadingMode::Inline => self.drain_inline(),
            ThreadingMode::Dedicated => self.queues.wait_completed(ticket),
        }
    }

    /// Close the open queue and apply frame back-pressure.
    fn submit(&self) {
        let ticket = self.queues.close();
        match self.options.threading {
            ThreadingMode::Inline => self.drain_inline(),
            ThreadingMode::Dedicated => {
                if self.options.max_pending_frames == 0 {
                    self.queues.wait_completed(ticket);
                } else {
                    self.queues.wait_pending_at_most(self.options.max_pending_frames);
                }
            }
        }
    }

    /// Run `f` on the render thread after everything queued so far, and
    /// wait for its result.
    ///
    /// Fails when called from the render thread itself or when the render
    /// thread is gone.
    pub fn run_sync<R, F>(&self, name: &'static str, f: F) -> Result<R, GraphicsError>
    where
        R: Send + 'static,
        F: FnOnce(&mut DeviceContext) -> R + Send + 'static,
    {
        if on_render_thread() {
            return Err(GraphicsError::Disconnected(format!(
                "{name} requested from the render thread"
            )));
        }
        let (sender, receiver) = mpsc::sync_channel(1);
        self.enqueue(Box::new(FnCommand::new(name, move |ctx: &mut DeviceContext| {
            let _ = sender.send(f(ctx));
        })));
        let ticket = self.queues.close();
        self.wait_completed(ticket);
        receiver.recv().map_err(|_| {
            GraphicsError::Disconnected(format!("render thread stopped before {name}"))
        })
    }
}

/// Body of the dedicated render thread.
fn consume(shared: Arc<RenderShared>, mut ctx: DeviceContext) {
    struct AbandonOnExit<'a>(&'a CommandQueues);

    impl Drop for AbandonOnExit<'_> {
        fn drop(&mut self) {
            self.0.abandon();
        }
    }

    let _render = RenderThreadGuard::enter();
    let _abandon = AbandonOnExit(&shared.queues);
    while let Some(queue) = shared.queues.next_blocking() {
        queue.execute(&mut ctx);
        shared.queues.complete();
    }
    ctx.shutdown();
}

/// Application-side handle of the renderer.
///
/// Setters change the logical [`RenderState`]; render calls enqueue a
/// command carrying a snapshot of it. Nothing reaches the device before
/// [`RenderSystem::flush_frame`], [`RenderSystem::present_frame`] or a
/// synchronous call closes the open command queue.
///
/// # Example
///
/// ```ignore
/// let mut renderer = RenderSystem::new(RenderSystemOptions::default())?;
/// let logo = renderer.create_texture_from_file("logo", TextureKind::Managed, LoadMode::Async)?;
/// renderer.set_ortho_projection(RectF::new(0.0, 0.0, 1024.0, 768.0));
/// renderer.clear();
/// if let Some(logo) = &logo {
///     renderer.set_texture(Some(logo));
///     renderer.draw_textured_rect(RectF::new(10.0, 10.0, 128.0, 128.0), RectF::UNIT);
/// }
/// renderer.present_frame();
/// ```
pub struct RenderSystem {
    shared: Arc<RenderShared>,
    state: RenderState,
    backend_name: &'static str,
    device_stats: Arc<DeviceStats>,
    shut_down: bool,
}

static_assertions::assert_impl_all!(RenderSystem: Send);

impl RenderSystem {
    pub fn new(options: RenderSystemOptions) -> Result<Self, GraphicsError> {
        if options.width == 0 || options.height == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "viewport size {}x{}",
                options.width, options.height
            )));
        }

        let loader = TextureLoader::start(
            options.resolved_loader_threads(),
            options.max_waiting_async_textures,
        )?;
        let device_stats = Arc::new(DeviceStats::new());
        let backend = Backend::new(
            options.backend,
            options.width,
            options.height,
            options.memory_budget,
            device_stats.clone(),
        );
        let backend_name = backend.name();
        let state = RenderState::with_viewport(options.width, options.height);
        let threading = options.threading;

        let shared = Arc::new(RenderShared {
            options,
            loader,
            queues: CommandQueues::new(),
            textures: Mutex::new(BTreeMap::new()),
            next_texture_id: AtomicU64::new(1),
            statistics: Mutex::new(RenderStatistics::default()),
            low_memory: Mutex::new(None),
            inline: Mutex::new(None),
            consumer: Mutex::new(None),
        });

        let ctx = DeviceContext::new(backend, shared.clone(), device_stats.clone());
        match threading {
            ThreadingMode::Inline => *shared.inline.lock() = Some(ctx),
            ThreadingMode::Dedicated => {
                let consumer_shared = shared.clone();
                let handle = std::thread::Builder::new()
                    .name("vesper-render".into())
                    .spawn(move || consume(consumer_shared, ctx))
                    .map_err(|e| {
                        shared.loader.shutdown();
                        GraphicsError::InitializationFailed(format!(
                            "cannot spawn render thread: {e}"
                        ))
                    })?;
                *shared.consumer.lock() = Some(handle);
            }
        }

        log::info!(
            "Render system created: {} backend, {:?} threading",
            backend_name,
            threading
        );
        Ok(Self {
            shared,
            state,
            backend_name,
            device_stats,
            shut_down: false,
        })
    }

    pub fn options(&self) -> &RenderSystemOptions {
        &self.shared.options
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    /// Hook counters and fault injection of the active device.
    pub fn device_stats(&self) -> &Arc<DeviceStats> {
        &self.device_stats
    }

    /// Statistics of the last published frame.
    pub fn statistics(&self) -> RenderStatistics {
        *self.shared.statistics.lock()
    }

    /// Called on the render thread when a device allocation failed, before
    /// it is retried once.
    pub fn set_low_memory_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.low_memory.lock() = Some(Arc::new(callback));
    }

    // Textures

    pub fn create_texture(
        &self,
        width: u32,
        height: u32,
        data: TextureData,
        format: PixelFormat,
        kind: TextureKind,
    ) -> Result<Arc<Texture>, GraphicsError> {
        if width == 0 || height == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture size {width}x{height}"
            )));
        }
        if kind == TextureKind::RenderTarget {
            return Err(GraphicsError::InvalidParameter(
                "render targets are created with create_render_target".into(),
            ));
        }
        let image = match data {
            TextureData::Pixels(bytes) => CpuImage::from_data(width, height, format, bytes)
                .map_err(|e| GraphicsError::InvalidParameter(e.to_string()))?,
            TextureData::Color(color) => CpuImage::from_color(width, height, format, color),
        };
        let id = self.shared.next_id();
        let texture = Texture::from_image(
            id,
            format!("texture-{}", id.raw()),
            image,
            kind,
            Arc::downgrade(&self.shared),
        );
        self.shared.register_texture(texture.clone());
        self.shared
            .enqueue(Box::new(UploadTextureCommand(texture.clone())));
        log::debug!("Created {:?} texture {}x{} ({:?})", kind, width, height, id);
        Ok(texture)
    }

    pub fn create_render_target(&self, width: u32, height: u32) -> Result<Arc<Texture>, GraphicsError> {
        if width == 0 || height == 0 {
            return Err(GraphicsError::InvalidParameter(format!(
                "render target size {width}x{height}"
            )));
        }
        let id = self.shared.next_id();
        let texture = Texture::render_target(
            id,
            format!("render-target-{}", id.raw()),
            width,
            height,
            Arc::downgrade(&self.shared),
        );
        self.shared.register_texture(texture.clone());
        self.shared
            .enqueue(Box::new(UploadTextureCommand(texture.clone())));
        Ok(texture)
    }

    /// File-backed texture in the file's natural format.
    ///
    /// `Ok(None)` when no file matches `name` after the extension search.
    pub fn create_texture_from_file(
        &self,
        name: &str,
        kind: TextureKind,
        load_mode: LoadMode,
    ) -> Result<Option<Arc<Texture>>, GraphicsError> {
        self.create_texture_from_file_impl(name, None, kind, load_mode)
    }

    /// File-backed texture converted to `format` when decoded.
    pub fn create_texture_from_file_as(
        &self,
        name: &str,
        format: PixelFormat,
        kind: TextureKind,
        load_mode: LoadMode,
    ) -> Result<Option<Arc<Texture>>, GraphicsError> {
        self.create_texture_from_file_impl(name, Some(format), kind, load_mode)
    }

    fn create_texture_from_file_impl(
        &self,
        name: &str,
        format: Option<PixelFormat>,
        kind: TextureKind,
        load_mode: LoadMode,
    ) -> Result<Option<Arc<Texture>>, GraphicsError> {
        if name.is_empty() {
            return Err(GraphicsError::InvalidParameter("empty texture name".into()));
        }
        if kind == TextureKind::RenderTarget {
            return Err(GraphicsError::InvalidParameter(
                "render targets cannot be loaded from files".into(),
            ));
        }
        let Some(path) = self.find_texture_file(name) else {
            log::warn!("Texture file not found: {}", name);
            return Ok(None);
        };
        let info = match image_io::probe(&path) {
            Ok(info) => Some(info),
            Err(err) => {
                log::warn!("Cannot read texture header {}: {}", path.display(), err);
                None
            }
        };

        let texture = Texture::from_file(
            self.shared.next_id(),
            name.to_string(),
            path,
            format,
            info,
            kind,
            load_mode,
            Arc::downgrade(&self.shared),
        );
        self.shared.register_texture(texture.clone());
        if info.is_some() && load_mode != LoadMode::OnDemand {
            texture.load_async();
        }
        Ok(Some(texture))
    }

    /// Resolve a texture name to a file, trying the configured extensions
    /// when `name` itself does not exist.
    pub fn find_texture_file(&self, name: &str) -> Option<PathBuf> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Some(direct.to_path_buf());
        }
        self.shared
            .options
            .texture_extensions
            .iter()
            .map(|ext| PathBuf::from(format!("{name}{ext}")))
            .find(|candidate| candidate.is_file())
    }

    /// Release a texture. Commands queued before this still see it.
    pub fn destroy_texture(&self, texture: &Arc<Texture>) {
        texture.cancel_async_load();
        self.shared
            .enqueue(Box::new(DestroyTextureCommand(texture.clone())));
    }

    pub fn textures(&self) -> Vec<Arc<Texture>> {
        self.shared.texture_list()
    }

    pub fn texture_count(&self) -> usize {
        self.shared.textures.lock().len()
    }

    /// Wait until the loader has decoded every queued texture. A zero
    /// timeout waits without bound.
    pub fn wait_for_async_textures(&self, timeout: Duration) -> bool {
        self.shared.loader.wait_idle(timeout)
    }

    // Render state

    /// The logical render state.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn reset_state(&mut self) {
        self.state = RenderState::with_viewport(self.shared.options.width, self.shared.options.height);
    }

    /// A viewport with a negative or overflowing extent is ignored.
    pub fn set_viewport(&mut self, viewport: Rect) {
        if let Err(err) = viewport.validate() {
            log::warn!("Viewport not changed: {}", err);
            return;
        }
        self.state.viewport = viewport;
    }

    pub fn set_modelview_matrix(&mut self, matrix: Mat4) {
        self.state.modelview = matrix;
    }

    pub fn set_projection_matrix(&mut self, matrix: Mat4) {
        self.state.projection = matrix;
    }

    /// Pixel-space projection with the origin at the top left of `rect`.
    pub fn set_ortho_projection(&mut self, rect: RectF) {
        self.state.projection = ortho_projection(rect);
    }

    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.state.projection = Mat4::perspective_rh(fov_y, aspect, near, far);
    }

    pub fn set_depth_buffer(&mut self, enabled: bool, write: bool) {
        self.state.depth_buffer = enabled;
        self.state.depth_write = write;
    }

    /// Bind a texture, taking its filter and address mode.
    pub fn set_texture(&mut self, texture: Option<&Texture>) {
        match texture {
            Some(texture) => {
                self.state.texture = Some(texture.id());
                self.state.texture_filter = texture.filter();
                self.state.texture_address_mode = texture.address_mode();
            }
            None => self.state.texture = None,
        }
    }

    pub fn set_texture_filter(&mut self, filter: TextureFilter) {
        self.state.texture_filter = filter;
    }

    pub fn set_texture_address_mode(&mut self, mode: AddressMode) {
        self.state.texture_address_mode = mode;
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.blend_mode = mode;
    }

    pub fn set_color_mode(&mut self, mode: ColorMode, factor: f32) {
        self.state.color_mode = mode;
        self.state.color_mode_factor = factor;
    }

    /// Render into `target` instead of the framebuffer.
    pub fn set_render_target(&mut self, target: Option<&Texture>) {
        self.state.render_target = match target {
            Some(texture) if texture.kind() == TextureKind::RenderTarget => Some(texture.id()),
            Some(texture) => {
                log::warn!("Texture {} is not a render target", texture.name());
                None
            }
            None => None,
        };
    }

    // Drawing

    pub fn clear(&mut self) {
        self.clear_color(Color::CLEAR, true);
    }

    pub fn clear_color(&mut self, color: Color, depth: bool) {
        self.shared.enqueue(Box::new(ClearCommand {
            state: self.state.clone(),
            color,
            depth,
        }));
    }

    pub fn render<V: Vertex>(&mut self, primitive: Primitive, vertices: &[V]) {
        self.render_with(primitive, V::into_vertices(vertices.to_vec()), self.state.system_color);
    }

    /// Render with a constant color for vertices without a color channel.
    pub fn render_colored<V: Vertex>(&mut self, primitive: Primitive, vertices: &[V], color: Color) {
        self.render_with(primitive, V::into_vertices(vertices.to_vec()), color);
    }

    fn render_with(&mut self, primitive: Primitive, vertices: Vertices, color: Color) {
        if vertices.is_empty() {
            return;
        }
        let mut state = self.state.clone();
        state.system_color = color;
        self.shared.enqueue(Box::new(RenderCommand {
            state,
            primitive,
            vertices,
        }));
    }

    /// Outline of `rect`.
    pub fn draw_rect(&mut self, rect: RectF, color: Color) {
        if rect.is_empty() {
            return;
        }
        let (lt, rb) = (rect.left_top(), rect.right_bottom());
        let outline = [
            PlainVertex::new(lt.x, lt.y, 0.0),
            PlainVertex::new(rb.x, lt.y, 0.0),
            PlainVertex::new(rb.x, rb.y, 0.0),
            PlainVertex::new(lt.x, rb.y, 0.0),
            PlainVertex::new(lt.x, lt.y, 0.0),
        ];
        self.render_colored(Primitive::LineStrip, &outline, color);
    }

    pub fn draw_filled_rect(&mut self, rect: RectF, color: Color) {
        if rect.is_empty() {
            return;
        }
        let (lt, rb) = (rect.left_top(), rect.right_bottom());
        let quad = [
            PlainVertex::new(lt.x, lt.y, 0.0),
            PlainVertex::new(rb.x, lt.y, 0.0),
            PlainVertex::new(lt.x, rb.y, 0.0),
            PlainVertex::new(rb.x, rb.y, 0.0),
        ];
        self.render_colored(Primitive::TriangleStrip, &quad, color);
    }

    /// `rect` filled with the `src` region (in texture coordinates) of the
    /// bound texture.
    pub fn draw_textured_rect(&mut self, rect: RectF, src: RectF) {
        if rect.is_empty() {
            return;
        }
        let (lt, rb) = (rect.left_top(), rect.right_bottom());
        let (uv_lt, uv_rb) = (src.left_top(), src.right_bottom());
        let quad = [
            TexturedVertex::new(Vec3::new(lt.x, lt.y, 0.0), uv_lt),
            TexturedVertex::new(Vec3::new(rb.x, lt.y, 0.0), Vec2::new(uv_rb.x, uv_lt.y)),
            TexturedVertex::new(Vec3::new(lt.x, rb.y, 0.0), Vec2::new(uv_lt.x, uv_rb.y)),
            TexturedVertex::new(Vec3::new(rb.x, rb.y, 0.0), uv_rb),
        ];
        self.render(Primitive::TriangleStrip, &quad);
    }

    // Frame driving

    /// Append a custom command to the open queue.
    pub fn enqueue(&self, command: Box<dyn AsyncCommand>) {
        self.shared.enqueue(command);
    }

    /// Per-frame bookkeeping. Returns `false` once shut down.
    pub fn update(&mut self, time_delta: f32) -> bool {
        if self.shut_down {
            return false;
        }
        if let Some(limit) = self.shared.options.idle_texture_unload_time {
            let dt = Duration::try_from_secs_f32(time_delta.max(0.0)).unwrap_or(Duration::ZERO);
            // The bound texture and its links count as used this frame.
            let mut in_use = Vec::new();
            if let Some(bound) = self.state.texture.and_then(|id| self.shared.texture(id)) {
                bound.keep_alive();
                in_use.push(bound.id());
                in_use.extend(bound.dynamic_links().iter().map(|t| t.id()));
            }
            for texture in self.shared.texture_list() {
                if in_use.contains(&texture.id()) {
                    continue;
                }
                if texture.tick_idle(dt, limit) {
                    log::debug!("Unloading idle texture {}", texture.name());
                    texture.unload();
                }
            }
        }
        true
    }

    /// Close the current frame's queue and hand it to the render thread.
    ///
    /// Blocks while more than `max_pending_frames` closed queues wait.
    pub fn flush_frame(&mut self, update_stats: bool) {
        self.shared
            .enqueue(Box::new(EndFrameCommand { update_stats }));
        self.shared.submit();
    }

    pub fn present_frame(&mut self) {
        self.shared
            .enqueue(Box::new(EndFrameCommand { update_stats: false }));
        self.shared.enqueue(Box::new(PresentCommand));
        self.shared.submit();
    }

    /// Block until the render thread executed every submitted queue.
    ///
    /// `forced` also submits the open queue and uploads every decoded async
    /// texture regardless of the per-frame cap. Returns at once when there
    /// is nothing to do.
    pub fn wait_for_all(&self, forced: bool) {
        if on_render_thread() {
            log::warn!("wait_for_all called from the render thread, ignoring");
            return;
        }
        let ticket = if forced {
            if self.shared.loader.waiting_count() > 0 {
                self.shared.enqueue(Box::new(UploadReadyTexturesCommand));
            }
            self.shared.queues.close()
        } else {
            self.shared.queues.submitted()
        };
        self.shared.wait_completed(ticket);
    }

    /// Copy of the framebuffer after everything queued so far.
    pub fn take_screenshot(&self) -> Option<CpuImage> {
        match self
            .shared
            .run_sync("Screenshot", |ctx: &mut DeviceContext| ctx.read_framebuffer())
        {
            Ok(Ok(image)) => Some(image),
            Ok(Err(err)) | Err(err) => {
                log::warn!("Screenshot failed: {}", err);
                None
            }
        }
    }

    /// Flush everything, stop the loader and the render thread and release
    /// all device textures. Also runs on drop.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.wait_for_all(true);
        self.shared.loader.shutdown();

        match self.shared.options.threading {
            ThreadingMode::Inline => {
                let ctx = self.shared.inline.lock().take();
                if let Some(ctx) = ctx {
                    let _render = RenderThreadGuard::enter();
                    ctx.shutdown();
                }
                self.shared.queues.stop();
            }
            ThreadingMode::Dedicated => {
                self.shared.queues.stop();
                let consumer = self.shared.consumer.lock().take();
                if let Some(handle) = consumer {
                    if handle.join().is_err() {
                        log::error!("Render thread panicked");
                    }
                }
            }
        }
        self.shared.textures.lock().clear();
        log::info!("Render system shut down");
    }
}

impl Drop for RenderSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}
