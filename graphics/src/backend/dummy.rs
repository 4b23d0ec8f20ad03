//! Dummy backend for testing and headless runs.
//!
//! This backend performs no device work. It hands out handles, counts every
//! hook in [`DeviceStats`] and honours injected faults, which is enough to
//! exercise the command queue and texture state machine without hardware.

use std::sync::Arc;

use vesper_core::{Color, CpuImage, Mat4, Rect};

use crate::error::GraphicsError;
use crate::state::{BlendMode, ColorMode, PipelineKey, Primitive};
use crate::vertex::Vertices;

use super::{Device, DeviceStats, DeviceTexture, Hook, TextureBinding, TextureDescriptor};

/// No-op device.
#[derive(Debug)]
pub struct DummyDevice {
    stats: Arc<DeviceStats>,
    next_handle: u64,
}

impl DummyDevice {
    pub fn new(stats: Arc<DeviceStats>) -> Self {
        Self {
            stats,
            next_handle: 1,
        }
    }
}

impl Device for DummyDevice {
    fn name(&self) -> &'static str {
        "Dummy"
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<DeviceTexture, GraphicsError> {
        self.stats.record(Hook::CreateTexture)?;
        if self.stats.take_allocation_failure() {
            log::trace!("DummyDevice: injected allocation failure for {:?}", desc.label);
            return Err(GraphicsError::OutOfMemory);
        }
        let handle = DeviceTexture::new(self.next_handle);
        self.next_handle += 1;
        log::trace!(
            "DummyDevice: creating texture {:?} ({}x{}, {:?}) -> {:?}",
            desc.label,
            desc.width,
            desc.height,
            desc.format,
            handle
        );
        Ok(handle)
    }

    fn destroy_texture(&mut self, handle: DeviceTexture) {
        // Destruction cannot fail; a pending injected loss surfaces on the next hook.
        let _ = self.stats.record(Hook::DestroyTexture);
        log::trace!("DummyDevice: destroying texture {:?}", handle);
    }

    fn upload_texture(
        &mut self,
        handle: DeviceTexture,
        image: &CpuImage,
    ) -> Result<(), GraphicsError> {
        self.stats.record(Hook::UploadTexture)?;
        log::trace!(
            "DummyDevice: uploading {} bytes to {:?}",
            image.data().len(),
            handle
        );
        Ok(())
    }

    fn update_texture(
        &mut self,
        handle: DeviceTexture,
        x: u32,
        y: u32,
        image: &CpuImage,
    ) -> Result<(), GraphicsError> {
        self.stats.record(Hook::UpdateTexture)?;
        log::trace!(
            "DummyDevice: updating {:?} at ({}, {}) with {}x{}",
            handle,
            x,
            y,
            image.width(),
            image.height()
        );
        Ok(())
    }

    fn read_texture(&mut self, handle: DeviceTexture) -> Result<CpuImage, GraphicsError> {
        self.stats.record(Hook::ReadTexture)?;
        log::trace!("DummyDevice: read back requested for {:?}", handle);
        Err(GraphicsError::Unsupported("Dummy"))
    }

    fn set_viewport(&mut self, viewport: Rect) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetViewport)?;
        log::trace!("DummyDevice: viewport {:?}", viewport);
        Ok(())
    }

    fn set_modelview_matrix(&mut self, _matrix: &Mat4) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetModelviewMatrix)?;
        log::trace!("DummyDevice: modelview matrix");
        Ok(())
    }

    fn set_projection_matrix(&mut self, _matrix: &Mat4) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetProjectionMatrix)?;
        log::trace!("DummyDevice: projection matrix");
        Ok(())
    }

    fn set_depth_buffer(&mut self, enabled: bool, write: bool) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetDepthBuffer)?;
        log::trace!("DummyDevice: depth buffer {} (write {})", enabled, write);
        Ok(())
    }

    fn set_texture(&mut self, binding: Option<TextureBinding>) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetTexture)?;
        log::trace!("DummyDevice: texture {:?}", binding);
        Ok(())
    }

    fn set_blend_mode(&mut self, mode: BlendMode) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetBlendMode)?;
        log::trace!("DummyDevice: blend mode {:?}", mode);
        Ok(())
    }

    fn set_color_mode(&mut self, mode: ColorMode, factor: f32) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetColorMode)?;
        log::trace!("DummyDevice: color mode {:?} ({})", mode, factor);
        Ok(())
    }

    fn set_render_target(&mut self, target: Option<DeviceTexture>) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetRenderTarget)?;
        log::trace!("DummyDevice: render target {:?}", target);
        Ok(())
    }

    fn clear(&mut self, color: Color, depth: bool) -> Result<(), GraphicsError> {
        self.stats.record(Hook::Clear)?;
        log::trace!("DummyDevice: clear {:?} (depth {})", color, depth);
        Ok(())
    }

    fn draw(
        &mut self,
        primitive: Primitive,
        vertices: &Vertices,
        key: PipelineKey,
        _system_color: Color,
    ) -> Result<(), GraphicsError> {
        self.stats.record(Hook::Draw)?;
        log::trace!(
            "DummyDevice: draw {:?} x{} with {:?}",
            primitive,
            vertices.len(),
            key
        );
        Ok(())
    }

    fn present(&mut self) -> Result<(), GraphicsError> {
        self.stats.record(Hook::Present)?;
        log::trace!("DummyDevice: present");
        Ok(())
    }

    fn read_framebuffer(&mut self) -> Result<CpuImage, GraphicsError> {
        self.stats.record(Hook::ReadFramebuffer)?;
        Err(GraphicsError::Unsupported("Dummy"))
    }

    fn reset(&mut self) -> Result<(), GraphicsError> {
        self.stats.record(Hook::Reset)?;
        log::trace!("DummyDevice: reset");
        Ok(())
    }
}
