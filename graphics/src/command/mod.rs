//! Deferred render commands.
//!
//! The application thread records [`AsyncCommand`]s into the open
//! [`AsyncCommandQueue`]. Flushing closes the queue and hands it to the
//! render thread, which executes every command in FIFO order against a
//! [`DeviceContext`].

mod queue;

use std::sync::Arc;

use vesper_core::{Color, CpuImage};

use crate::context::DeviceContext;
use crate::state::{Primitive, RenderState};
use crate::texture::{Texture, TextureId};
use crate::vertex::Vertices;

pub use queue::AsyncCommandQueue;
pub(crate) use queue::CommandQueues;

/// A unit of work executed on the render thread.
pub trait AsyncCommand: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn execute(self: Box<Self>, ctx: &mut DeviceContext);
}

/// Command wrapping a closure.
pub struct FnCommand<F> {
    name: &'static str,
    f: F,
}

impl<F> FnCommand<F>
where
    F: FnOnce(&mut DeviceContext) + Send,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }
}

impl<F> AsyncCommand for FnCommand<F>
where
    F: FnOnce(&mut DeviceContext) + Send,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn execute(self: Box<Self>, ctx: &mut DeviceContext) {
        (self.f)(ctx)
    }
}

/// Draw with a snapshot of the logical render state.
pub(crate) struct RenderCommand {
    pub state: RenderState,
    pub primitive: Primitive,
    pub vertices: Vertices,
}

impl AsyncCommand for RenderCommand {
    fn name(&self) -> &'static str {
        "Render"
    }

    fn execute(self: Box<Self>, ctx: &mut DeviceContext) {
        ctx.render(&self.state, self.primitive, &self.vertices);
    }
}

pub(crate) struct ClearCommand {
    pub state: RenderState,
    pub color: Color,
    pub depth: bool,
}

impl AsyncCommand for ClearCommand {
    fn name(&self) -> &'static str {
        "Clear"
    }

    fn execute(self: Box<Self>, ctx: &mut DeviceContext) {
        ctx.clear(&self.state, self.color, self.depth);
    }
}

/// Frame boundary: capped async uploads and statistics publication.
pub(crate) struct EndFrameCommand {
    pub update_stats: bool,
}

impl AsyncCommand for EndFrameCommand {
    fn name(&self) -> &'static str {
        "EndFrame"
    }

    fn execute(self: Box<Self>, ctx: &mut DeviceContext) {
        ctx.end_frame(self.update_stats);
    }
}

pub(crate) struct PresentCommand;

impl AsyncCommand for PresentCommand {
    fn name(&self) -> &'static str {
        "Present"
    }

    fn execute(self: Box<Self>, ctx: &mut DeviceContext) {
        ctx.present();
    }
}

/// First upload of a texture created from memory or as a render target.
pub(crate) struct UploadTextureCommand(pub Arc<Texture>);

impl AsyncCommand for UploadTextureCommand {
    fn name(&self) -> &'static str {
        "UploadTexture"
    }

    fn execute(self: Box<Self>, ctx: &mut DeviceContext) {
        self.0.upload(ctx, false);
    }
}

/// Uploads every texture whose async decode has finished, without the
/// per-frame cap.
pub(crate) struct UploadReadyTexturesCommand;

impl AsyncCommand for UploadReadyTexturesCommand {
    fn name(&self) -> &'static str {
        "UploadReadyTextures"
    }

    fn execute(self: Box<Self>, ctx: &mut DeviceContext) {
        ctx.upload_ready_textures(None);
    }
}

/// Releases the device copy of an unloaded texture.
pub(crate) struct UnloadTextureCommand(pub TextureId);

impl AsyncCommand for UnloadTextureCommand {
    fn name(&self) -> &'static str {
        "UnloadTexture"
    }

    fn execute(self: Box<Self>, ctx: &mut DeviceContext) {
        if let Some(texture) = ctx.texture(self.0) {
            texture.release_device(ctx);
        }
    }
}

pub(crate) struct DestroyTextureCommand(pub Arc<Texture>);

impl AsyncCommand for DestroyTextureCommand {
    fn name(&self) -> &'static str {
        "DestroyTexture"
    }

    fn execute(self: Box<Self>, ctx: &mut DeviceContext) {
        self.0.destroy_device(ctx);
        ctx.unregister_texture(self.0.id());
    }
}

/// Re-uploads modified pixels of an uploaded texture.
///
/// With a `replacement` image the whole texture is overwritten, otherwise
/// the texture's dirty region of its CPU copy is sent.
pub(crate) struct FlushTextureCommand {
    pub id: TextureId,
    pub replacement: Option<CpuImage>,
}

impl AsyncCommand for FlushTextureCommand {
    fn name(&self) -> &'static str {
        "FlushTexture"
    }

    fn execute(self: Box<Self>, ctx: &mut DeviceContext) {
        if let Some(texture) = ctx.texture(self.id) {
            texture.flush(ctx, self.replacement);
        }
    }
}
