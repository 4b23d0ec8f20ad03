//! CPU pixel access on textures.
//!
//! Reads and writes go to the CPU copy when there is one. A queued async
//! load is waited for (bounded by the configured timeout) and an unloaded
//! file-backed texture is decoded on the spot. Writes to an uploaded
//! texture mark the touched region dirty and queue one re-upload.
//!
//! Textures without a CPU copy are read back from the device through a
//! synchronous render thread round trip, which is slow.

use vesper_core::{Color, CpuImage, Rect};

use crate::command::FlushTextureCommand;
use crate::context::DeviceContext;

use super::{LoadState, Texture, TextureKind};

/// Rejects malformed rectangles before they reach the pixels.
fn valid_rects(name: &str, rects: &[Rect]) -> bool {
    match rects.iter().try_for_each(Rect::validate) {
        Ok(()) => true,
        Err(err) => {
            log::warn!("Pixel write to texture {} ignored: {}", name, err);
            false
        }
    }
}

impl Texture {
    /// Run `f` on the texture's pixels. `written` is the region `f` may
    /// modify, or `None` for read-only access.
    fn with_pixels<R>(&self, written: Option<Rect>, f: impl FnOnce(&mut CpuImage) -> R) -> Option<R> {
        if self.kind == TextureKind::External {
            log::warn!("Pixel access on external texture {} refused", self.name);
            return None;
        }
        let system = self.system.upgrade()?;

        if self.state() == LoadState::AsyncLoadQueued
            && !self.wait_for_async_load(system.options.async_load_timeout)
        {
            log::warn!(
                "Texture {} did not finish loading within {:?}",
                self.name,
                system.options.async_load_timeout
            );
            return None;
        }

        let mut inner = self.inner.lock();
        if inner.data.is_none() && inner.state == LoadState::Unloaded && self.source.is_some() {
            drop(inner);
            if !self.decode_now() {
                return None;
            }
            inner = self.inner.lock();
        }

        if let Some(data) = inner.data.as_mut() {
            let bounds = data.rect();
            let result = f(data);
            if let Some(rect) = written.and_then(|r| r.intersect(&bounds)) {
                self.mark_dirty(&mut inner, rect, &system);
            }
            return Some(result);
        }
        if inner.state != LoadState::Uploaded {
            return None;
        }
        drop(inner);

        let texture = self.this.upgrade()?;
        let mut image = match system.run_sync("ReadTexture", move |ctx: &mut DeviceContext| {
            texture.read_back(ctx)
        }) {
            Ok(Ok(image)) => image,
            Ok(Err(err)) | Err(err) => {
                log::warn!("Cannot read back texture {}: {}", self.name, err);
                return None;
            }
        };
        let result = f(&mut image);
        if written.is_some() {
            system.enqueue(Box::new(FlushTextureCommand {
                id: self.id,
                replacement: Some(image),
            }));
        }
        Some(result)
    }

    /// Color at `(x, y)`, or `None` when out of range or unavailable.
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.with_pixels(None, |image| image.get_pixel(x, y)).flatten()
    }

    /// Bilinear sample between pixel centers.
    pub fn get_interpolated_pixel(&self, x: f32, y: f32) -> Option<Color> {
        self.with_pixels(None, |image| image.get_interpolated_pixel(x, y))
            .flatten()
    }

    pub fn set_pixel(&self, x: i32, y: i32, color: Color) -> bool {
        self.with_pixels(Some(Rect::new(x, y, 1, 1)), |image| {
            image.set_pixel(x, y, color)
        })
        .unwrap_or(false)
    }

    pub fn fill_rect(&self, rect: Rect, color: Color) -> bool {
        if !valid_rects(&self.name, &[rect]) {
            return false;
        }
        self.with_pixels(Some(rect), |image| image.fill_rect(rect, color))
            .unwrap_or(false)
    }

    /// Copy `src_rect` of `src` to `(x, y)` without blending.
    pub fn write(&self, x: i32, y: i32, src: &CpuImage, src_rect: Rect) -> bool {
        if !valid_rects(&self.name, &[src_rect]) {
            return false;
        }
        let dest = Rect::new(x, y, src_rect.w, src_rect.h);
        self.with_pixels(Some(dest), |image| image.write(x, y, src, src_rect))
            .unwrap_or(false)
    }

    /// Alpha blend `src_rect` of `src` onto `(x, y)`.
    pub fn blit(&self, x: i32, y: i32, src: &CpuImage, src_rect: Rect, alpha: u8) -> bool {
        if !valid_rects(&self.name, &[src_rect]) {
            return false;
        }
        let dest = Rect::new(x, y, src_rect.w, src_rect.h);
        self.with_pixels(Some(dest), |image| image.blit(x, y, src, src_rect, alpha))
            .unwrap_or(false)
    }

    pub fn write_stretch(&self, dest: Rect, src: &CpuImage, src_rect: Rect) -> bool {
        if !valid_rects(&self.name, &[dest, src_rect]) {
            return false;
        }
        self.with_pixels(Some(dest), |image| image.write_stretch(dest, src, src_rect))
            .unwrap_or(false)
    }

    pub fn blit_stretch(&self, dest: Rect, src: &CpuImage, src_rect: Rect, alpha: u8) -> bool {
        if !valid_rects(&self.name, &[dest, src_rect]) {
            return false;
        }
        self.with_pixels(Some(dest), |image| {
            image.blit_stretch(dest, src, src_rect, alpha)
        })
        .unwrap_or(false)
    }

    /// Copy of all pixels.
    pub fn read_pixels(&self) -> Option<CpuImage> {
        self.with_pixels(None, |image| image.clone())
    }
}
