//! CPU reference backend.
//!
//! Keeps texture memory in [`CpuImage`]s, renders into an RGBA framebuffer
//! with a small scanline-free rasterizer and caches one entry per
//! [`PipelineKey`], the way a shader-composing backend would. A byte budget
//! turns oversized allocations into out-of-memory errors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use vesper_core::{Color, CpuImage, Mat4, PixelFormat, Rect, Vec2, Vec3};

use crate::error::GraphicsError;
use crate::state::{AddressMode, BlendMode, ColorMode, PipelineKey, Primitive};
use crate::vertex::Vertices;

use super::{Device, DeviceStats, DeviceTexture, Hook, TextureBinding, TextureDescriptor};

/// Software rendering device.
#[derive(Debug)]
pub struct SoftwareDevice {
    stats: Arc<DeviceStats>,
    next_handle: u64,
    textures: HashMap<DeviceTexture, CpuImage>,
    memory_budget: Option<usize>,
    allocated: usize,
    framebuffer: CpuImage,
    target: Option<DeviceTexture>,
    viewport: Rect,
    modelview: Mat4,
    projection: Mat4,
    texture: Option<TextureBinding>,
    blend_mode: BlendMode,
    color_mode: ColorMode,
    color_mode_factor: f32,
    pipelines: HashSet<PipelineKey>,
}

/// Interpolated fragment inputs.
struct Fragment {
    color: [f32; 4],
    uv: Vec2,
}

impl SoftwareDevice {
    pub fn new(
        width: u32,
        height: u32,
        memory_budget: Option<usize>,
        stats: Arc<DeviceStats>,
    ) -> Self {
        Self {
            stats,
            next_handle: 1,
            textures: HashMap::new(),
            memory_budget,
            allocated: 0,
            framebuffer: CpuImage::from_color(width, height, PixelFormat::Rgba8, Color::BLACK),
            target: None,
            viewport: Rect::from_size(width, height),
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            texture: None,
            blend_mode: BlendMode::default(),
            color_mode: ColorMode::default(),
            color_mode_factor: 1.0,
            pipelines: HashSet::new(),
        }
    }

    fn image_mut(&mut self, handle: DeviceTexture) -> Result<&mut CpuImage, GraphicsError> {
        self.textures.get_mut(&handle).ok_or_else(|| {
            GraphicsError::InvalidParameter(format!("unknown device texture {handle:?}"))
        })
    }

    fn set_allocated(&mut self, bytes: usize) {
        self.allocated = bytes;
        self.stats.set_allocated_bytes(bytes as u64);
    }

    fn screen_position(&self, mvp: &Mat4, position: Vec3) -> Vec2 {
        let ndc = mvp.project_point3(position);
        let vp = self.viewport;
        Vec2::new(
            vp.x as f32 + (ndc.x + 1.0) * 0.5 * vp.w as f32,
            vp.y as f32 + (1.0 - ndc.y) * 0.5 * vp.h as f32,
        )
    }

    fn sample(&self, uv: Vec2) -> Option<Color> {
        let binding = self.texture?;
        let image = self.textures.get(&binding.handle)?;
        let (w, h) = (image.width() as f32, image.height() as f32);
        let (u, v) = match binding.address_mode {
            AddressMode::Wrap => (uv.x.rem_euclid(1.0), uv.y.rem_euclid(1.0)),
            AddressMode::Clamp => (uv.x.clamp(0.0, 1.0), uv.y.clamp(0.0, 1.0)),
        };
        let x = ((u * w) as i32).min(image.width() as i32 - 1);
        let y = ((v * h) as i32).min(image.height() as i32 - 1);
        image.get_pixel(x, y)
    }

    fn shade(&self, fragment: &Fragment, textured: bool) -> Color {
        let to_u8 = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        let base = Color::new(
            to_u8(fragment.color[0]),
            to_u8(fragment.color[1]),
            to_u8(fragment.color[2]),
            to_u8(fragment.color[3]),
        );
        let texel = if textured { self.sample(fragment.uv) } else { None };
        let Some(texel) = texel else {
            return base;
        };
        match self.color_mode {
            ColorMode::Multiply => texel.multiply(base),
            ColorMode::AlphaMap => base.with_alpha((texel.a as u16 * base.a as u16 / 255) as u8),
            ColorMode::Lerp => texel
                .lerp(base, self.color_mode_factor)
                .with_alpha((texel.a as u16 * base.a as u16 / 255) as u8),
        }
    }

    fn blend(&self, src: Color, dst: Color) -> Color {
        let scaled = |c: u8| c as u16 * src.a as u16 / 255;
        match self.blend_mode {
            BlendMode::Alpha => src.blend_over(dst, 255),
            BlendMode::Overwrite => src,
            BlendMode::Add => Color::new(
                (dst.r as u16 + scaled(src.r)).min(255) as u8,
                (dst.g as u16 + scaled(src.g)).min(255) as u8,
                (dst.b as u16 + scaled(src.b)).min(255) as u8,
                dst.a,
            ),
            BlendMode::Subtract => Color::new(
                (dst.r as u16).saturating_sub(scaled(src.r)) as u8,
                (dst.g as u16).saturating_sub(scaled(src.g)) as u8,
                (dst.b as u16).saturating_sub(scaled(src.b)) as u8,
                dst.a,
            ),
        }
    }

    fn triangles(primitive: Primitive, count: usize) -> Vec<[usize; 3]> {
        match primitive {
            Primitive::TriangleList => (0..count / 3).map(|t| [t * 3, t * 3 + 1, t * 3 + 2]).collect(),
            Primitive::TriangleStrip => (0..count.saturating_sub(2))
                .map(|i| [i, i + 1, i + 2])
                .collect(),
            Primitive::TriangleFan => (0..count.saturating_sub(2))
                .map(|i| [0, i + 1, i + 2])
                .collect(),
            _ => Vec::new(),
        }
    }

    fn rasterize(
        &self,
        target: &mut CpuImage,
        primitive: Primitive,
        vertices: &Vertices,
        system_color: Color,
    ) {
        let mvp = self.projection * self.modelview;
        let textured = vertices.has_uv() && self.texture.is_some();
        let clip = match self.viewport.intersect(&target.rect()) {
            Some(clip) => clip,
            None => return,
        };
        let points: Vec<(Vec2, [f32; 4], Vec2)> = (0..vertices.len())
            .filter_map(|i| vertices.get(i))
            .map(|(pos, color, uv)| {
                (
                    self.screen_position(&mvp, pos),
                    color.unwrap_or(system_color).to_f32_array(),
                    uv.unwrap_or(Vec2::ZERO),
                )
            })
            .collect();

        if primitive.class() != crate::state::PrimitiveClass::Triangles {
            // Lines and points are plotted at their vertices only.
            for (p, color, uv) in &points {
                let (x, y) = (p.x.floor() as i32, p.y.floor() as i32);
                if clip.contains(x, y) {
                    let src = self.shade(&Fragment { color: *color, uv: *uv }, textured);
                    if let Some(dst) = target.get_pixel(x, y) {
                        target.set_pixel(x, y, self.blend(src, dst));
                    }
                }
            }
            return;
        }

        for [a, b, c] in Self::triangles(primitive, points.len()) {
            let (pa, pb, pc) = (points[a], points[b], points[c]);
            let area = edge(pa.0, pb.0, pc.0);
            if area.abs() < f32::EPSILON {
                continue;
            }
            let min_x = (pa.0.x.min(pb.0.x).min(pc.0.x).floor() as i32).max(clip.x);
            let max_x = (pa.0.x.max(pb.0.x).max(pc.0.x).ceil() as i32).min(clip.right());
            let min_y = (pa.0.y.min(pb.0.y).min(pc.0.y).floor() as i32).max(clip.y);
            let max_y = (pa.0.y.max(pb.0.y).max(pc.0.y).ceil() as i32).min(clip.bottom());
            for y in min_y..max_y {
                for x in min_x..max_x {
                    let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                    let (wa, wb, wc) = (
                        edge(pb.0, pc.0, p) / area,
                        edge(pc.0, pa.0, p) / area,
                        edge(pa.0, pb.0, p) / area,
                    );
                    if wa < 0.0 || wb < 0.0 || wc < 0.0 {
                        continue;
                    }
                    let mut color = [0.0; 4];
                    for (i, channel) in color.iter_mut().enumerate() {
                        *channel = pa.1[i] * wa + pb.1[i] * wb + pc.1[i] * wc;
                    }
                    let uv = pa.2 * wa + pb.2 * wb + pc.2 * wc;
                    let src = self.shade(&Fragment { color, uv }, textured);
                    if let Some(dst) = target.get_pixel(x, y) {
                        target.set_pixel(x, y, self.blend(src, dst));
                    }
                }
            }
        }
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl Device for SoftwareDevice {
    fn name(&self) -> &'static str {
        "Software"
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<DeviceTexture, GraphicsError> {
        self.stats.record(Hook::CreateTexture)?;
        let size = desc.byte_size();
        let over_budget = self
            .memory_budget
            .is_some_and(|budget| self.allocated + size > budget);
        if self.stats.take_allocation_failure() || over_budget {
            log::debug!(
                "SoftwareDevice: cannot allocate {} bytes for {:?} ({} in use)",
                size,
                desc.label,
                self.allocated
            );
            return Err(GraphicsError::OutOfMemory);
        }
        let handle = DeviceTexture::new(self.next_handle);
        self.next_handle += 1;
        self.textures
            .insert(handle, CpuImage::new(desc.width, desc.height, desc.format));
        self.set_allocated(self.allocated + size);
        Ok(handle)
    }

    fn destroy_texture(&mut self, handle: DeviceTexture) {
        let _ = self.stats.record(Hook::DestroyTexture);
        if let Some(image) = self.textures.remove(&handle) {
            self.set_allocated(self.allocated.saturating_sub(image.data().len()));
        }
        if self.target == Some(handle) {
            self.target = None;
        }
        if self.texture.is_some_and(|b| b.handle == handle) {
            self.texture = None;
        }
    }

    fn upload_texture(
        &mut self,
        handle: DeviceTexture,
        image: &CpuImage,
    ) -> Result<(), GraphicsError> {
        self.stats.record(Hook::UploadTexture)?;
        let stored = self.image_mut(handle)?;
        if (stored.width(), stored.height()) != (image.width(), image.height()) {
            return Err(GraphicsError::InvalidParameter(format!(
                "upload of {}x{} into {}x{} texture",
                image.width(),
                image.height(),
                stored.width(),
                stored.height()
            )));
        }
        *stored = image.convert(stored.format());
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
        let stored = self.image_mut(handle)?;
        stored.write(x as i32, y as i32, image, image.rect());
        Ok(())
    }

    fn read_texture(&mut self, handle: DeviceTexture) -> Result<CpuImage, GraphicsError> {
        self.stats.record(Hook::ReadTexture)?;
        Ok(self.image_mut(handle)?.clone())
    }

    fn set_viewport(&mut self, viewport: Rect) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetViewport)?;
        self.viewport = viewport;
        Ok(())
    }

    fn set_modelview_matrix(&mut self, matrix: &Mat4) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetModelviewMatrix)?;
        self.modelview = *matrix;
        Ok(())
    }

    fn set_projection_matrix(&mut self, matrix: &Mat4) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetProjectionMatrix)?;
        self.projection = *matrix;
        Ok(())
    }

    fn set_depth_buffer(&mut self, _enabled: bool, _write: bool) -> Result<(), GraphicsError> {
        // No depth attachment; draws resolve in submission order.
        self.stats.record(Hook::SetDepthBuffer)
    }

    fn set_texture(&mut self, binding: Option<TextureBinding>) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetTexture)?;
        self.texture = binding;
        Ok(())
    }

    fn set_blend_mode(&mut self, mode: BlendMode) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetBlendMode)?;
        self.blend_mode = mode;
        Ok(())
    }

    fn set_color_mode(&mut self, mode: ColorMode, factor: f32) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetColorMode)?;
        self.color_mode = mode;
        self.color_mode_factor = factor;
        Ok(())
    }

    fn set_render_target(&mut self, target: Option<DeviceTexture>) -> Result<(), GraphicsError> {
        self.stats.record(Hook::SetRenderTarget)?;
        if let Some(handle) = target {
            self.image_mut(handle)?;
        }
        self.target = target;
        Ok(())
    }

    fn clear(&mut self, color: Color, _depth: bool) -> Result<(), GraphicsError> {
        self.stats.record(Hook::Clear)?;
        let image = match self.target {
            Some(handle) => self.image_mut(handle)?,
            None => &mut self.framebuffer,
        };
        let rect = image.rect();
        image.fill_rect(rect, color);
        Ok(())
    }

    fn draw(
        &mut self,
        primitive: Primitive,
        vertices: &Vertices,
        key: PipelineKey,
        system_color: Color,
    ) -> Result<(), GraphicsError> {
        self.stats.record(Hook::Draw)?;
        if self.pipelines.insert(key) {
            log::debug!("SoftwareDevice: composing pipeline {:?}", key);
            self.stats.record_pipeline_compiled();
        }
        let mut target = match self.target {
            Some(handle) => match self.textures.remove(&handle) {
                Some(image) => image,
                None => return Ok(()),
            },
            None => std::mem::replace(&mut self.framebuffer, CpuImage::new(0, 0, PixelFormat::Rgba8)),
        };
        self.rasterize(&mut target, primitive, vertices, system_color);
        match self.target {
            Some(handle) => {
                self.textures.insert(handle, target);
            }
            None => self.framebuffer = target,
        }
        Ok(())
    }

    fn present(&mut self) -> Result<(), GraphicsError> {
        self.stats.record(Hook::Present)
    }

    fn read_framebuffer(&mut self) -> Result<CpuImage, GraphicsError> {
        self.stats.record(Hook::ReadFramebuffer)?;
        Ok(self.framebuffer.clone())
    }

    fn reset(&mut self) -> Result<(), GraphicsError> {
        self.stats.record(Hook::Reset)?;
        log::warn!(
            "SoftwareDevice: reset, dropping {} textures",
            self.textures.len()
        );
        let (w, h) = (self.framebuffer.width(), self.framebuffer.height());
        *self = Self::new(w, h, self.memory_budget, self.stats.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::PrimitiveClass;
    use crate::vertex::PlainVertex;

    fn key() -> PipelineKey {
        PipelineKey {
            use_texture: false,
            use_color: false,
            color_mode: ColorMode::Multiply,
            blend_mode: BlendMode::Alpha,
            primitive_class: PrimitiveClass::Triangles,
            depth_enabled: false,
        }
    }

    #[test]
    fn budget_limits_allocations() {
        let stats = Arc::new(DeviceStats::new());
        let mut device = SoftwareDevice::new(4, 4, Some(64), stats.clone());
        let desc = TextureDescriptor {
            label: "a".into(),
            width: 4,
            height: 4,
            format: PixelFormat::Rgba8,
            render_target: false,
        };
        let first = device.create_texture(&desc).unwrap();
        assert_eq!(stats.allocated_bytes(), 64);
        assert!(matches!(
            device.create_texture(&desc),
            Err(GraphicsError::OutOfMemory)
        ));
        device.destroy_texture(first);
        assert_eq!(stats.allocated_bytes(), 0);
        assert!(device.create_texture(&desc).is_ok());
    }

    #[test]
    fn filled_quad_covers_framebuffer() {
        let stats = Arc::new(DeviceStats::new());
        let mut device = SoftwareDevice::new(4, 4, None, stats.clone());
        let quad = Vertices::Plain(vec![
            PlainVertex::new(-1.0, 1.0, 0.0),
            PlainVertex::new(1.0, 1.0, 0.0),
            PlainVertex::new(-1.0, -1.0, 0.0),
            PlainVertex::new(1.0, -1.0, 0.0),
        ]);
        device
            .draw(Primitive::TriangleStrip, &quad, key(), Color::RED)
            .unwrap();
        device
            .draw(Primitive::TriangleStrip, &quad, key(), Color::RED)
            .unwrap();
        let frame = device.read_framebuffer().unwrap();
        assert_eq!(frame.get_pixel(0, 0), Some(Color::RED));
        assert_eq!(frame.get_pixel(3, 3), Some(Color::RED));
        assert_eq!(stats.pipelines_compiled(), 1);
    }

    #[test]
    fn clear_and_read_back_render_target() {
        let stats = Arc::new(DeviceStats::new());
        let mut device = SoftwareDevice::new(4, 4, None, stats);
        let target = device
            .create_texture(&TextureDescriptor {
                label: "rt".into(),
                width: 2,
                height: 2,
                format: PixelFormat::Rgba8,
                render_target: true,
            })
            .unwrap();
        device.set_render_target(Some(target)).unwrap();
        device.clear(Color::GREEN, false).unwrap();
        let image = device.read_texture(target).unwrap();
        assert_eq!(image.get_pixel(1, 1), Some(Color::GREEN));
        assert_eq!(
            device.read_framebuffer().unwrap().get_pixel(0, 0),
            Some(Color::BLACK)
        );
    }
}
