use crate::color::Color;
use crate::error::CoreError;
use crate::math::Rect;

use super::PixelFormat;

/// Owned, tightly packed pixel buffer.
///
/// All pixel operations clip against both images and return whether at
/// least one pixel was touched. Out-of-range coordinates are not errors.
#[derive(Clone, PartialEq, Eq)]
pub struct CpuImage {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: Vec<u8>,
}

impl std::fmt::Debug for CpuImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl CpuImage {
    /// Zero-filled image.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0; Self::byte_size(width, height, format)],
        }
    }

    /// Image filled with a single color.
    pub fn from_color(width: u32, height: u32, format: PixelFormat, color: Color) -> Self {
        let mut image = Self::new(width, height, format);
        let bpp = format.bytes_per_pixel();
        let mut pixel = [0u8; 4];
        format.write(&mut pixel[..bpp], color);
        for chunk in image.data.chunks_exact_mut(bpp) {
            chunk.copy_from_slice(&pixel[..bpp]);
        }
        image
    }

    /// Wrap existing pixel bytes, checking their length.
    pub fn from_data(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, CoreError> {
        let expected = Self::byte_size(width, height, format);
        if data.len() != expected {
            return Err(CoreError::DataSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Number of bytes an image of this size and format occupies.
    pub fn byte_size(width: u32, height: u32, format: PixelFormat) -> usize {
        width as usize * height as usize * format.bytes_per_pixel()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Bounds of the whole image.
    pub fn rect(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    fn offset(&self, x: i32, y: i32) -> usize {
        (y as usize * self.width as usize + x as usize) * self.format.bytes_per_pixel()
    }

    fn read_unchecked(&self, x: i32, y: i32) -> Color {
        let at = self.offset(x, y);
        self.format
            .read(&self.data[at..at + self.format.bytes_per_pixel()])
    }

    fn write_unchecked(&mut self, x: i32, y: i32, color: Color) {
        let at = self.offset(x, y);
        let bpp = self.format.bytes_per_pixel();
        self.format.write(&mut self.data[at..at + bpp], color);
    }

    pub fn get_pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.rect()
            .contains(x, y)
            .then(|| self.read_unchecked(x, y))
    }

    /// Bilinear sample at `(x, y)`, where whole numbers hit pixel centers.
    /// Neighbors past the last row or column are clamped to the edge.
    pub fn get_interpolated_pixel(&self, x: f32, y: f32) -> Option<Color> {
        let inside = x >= 0.0 && y >= 0.0 && x < self.width as f32 && y < self.height as f32;
        if !inside {
            return None;
        }
        let (x0, y0) = (x.floor() as i32, y.floor() as i32);
        let x1 = (x0 + 1).min(self.width as i32 - 1);
        let y1 = (y0 + 1).min(self.height as i32 - 1);
        let (fx, fy) = (x - x0 as f32, y - y0 as f32);
        let top = self.read_unchecked(x0, y0).lerp(self.read_unchecked(x1, y0), fx);
        let bottom = self.read_unchecked(x0, y1).lerp(self.read_unchecked(x1, y1), fx);
        Some(top.lerp(bottom, fy))
    }

    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) -> bool {
        if !self.rect().contains(x, y) {
            return false;
        }
        self.write_unchecked(x, y, color);
        true
    }

    /// Overwrite a rectangle with a color, without blending.
    pub fn fill_rect(&mut self, rect: Rect, color: Color) -> bool {
        let Some(target) = rect.intersect(&self.rect()) else {
            return false;
        };
        let bpp = self.format.bytes_per_pixel();
        let mut pixel = [0u8; 4];
        self.format.write(&mut pixel[..bpp], color);
        for y in target.y..target.bottom() {
            let start = self.offset(target.x, y);
            let end = start + target.w as usize * bpp;
            for chunk in self.data[start..end].chunks_exact_mut(bpp) {
                chunk.copy_from_slice(&pixel[..bpp]);
            }
        }
        true
    }

    /// Copy `src_rect` of `src` to `(x, y)`, converting formats but not blending.
    pub fn write(&mut self, x: i32, y: i32, src: &CpuImage, src_rect: Rect) -> bool {
        let Some((target, sx, sy)) = self.clip_transfer(x, y, src, src_rect) else {
            return false;
        };
        if src.format == self.format {
            let row_bytes = target.w as usize * self.format.bytes_per_pixel();
            for row in 0..target.h {
                let from = src.offset(sx, sy + row);
                let to = self.offset(target.x, target.y + row);
                self.data[to..to + row_bytes].copy_from_slice(&src.data[from..from + row_bytes]);
            }
        } else {
            self.transfer(target, sx, sy, src, |s, _| s);
        }
        true
    }

    /// Alpha-blend `src_rect` of `src` onto `(x, y)`; `alpha` scales the source alpha.
    pub fn blit(&mut self, x: i32, y: i32, src: &CpuImage, src_rect: Rect, alpha: u8) -> bool {
        let Some((target, sx, sy)) = self.clip_transfer(x, y, src, src_rect) else {
            return false;
        };
        self.transfer(target, sx, sy, src, |s, d| s.blend_over(d, alpha));
        true
    }

    /// Scaled copy of `src_rect` into `dest_rect`, nearest sampling, no blending.
    pub fn write_stretch(&mut self, dest_rect: Rect, src: &CpuImage, src_rect: Rect) -> bool {
        self.stretch(dest_rect, src, src_rect, |s, _| s)
    }

    /// Scaled, alpha-blended copy of `src_rect` into `dest_rect`.
    pub fn blit_stretch(
        &mut self,
        dest_rect: Rect,
        src: &CpuImage,
        src_rect: Rect,
        alpha: u8,
    ) -> bool {
        self.stretch(dest_rect, src, src_rect, |s, d| s.blend_over(d, alpha))
    }

    /// Same pixels in another format.
    pub fn convert(&self, format: PixelFormat) -> CpuImage {
        if format == self.format {
            return self.clone();
        }
        let mut out = CpuImage::new(self.width, self.height, format);
        let (src_bpp, dst_bpp) = (self.format.bytes_per_pixel(), format.bytes_per_pixel());
        for (from, to) in self
            .data
            .chunks_exact(src_bpp)
            .zip(out.data.chunks_exact_mut(dst_bpp))
        {
            format.write(to, self.format.read(from));
        }
        out
    }

    /// Copy of a sub-rectangle, clipped to the image.
    pub fn region(&self, rect: Rect) -> Option<CpuImage> {
        let clipped = rect.intersect(&self.rect())?;
        let mut out = CpuImage::new(clipped.w as u32, clipped.h as u32, self.format);
        out.write(0, 0, self, clipped);
        Some(out)
    }

    /// Resolve the destination rectangle and source origin of a 1:1 transfer.
    fn clip_transfer(
        &self,
        x: i32,
        y: i32,
        src: &CpuImage,
        src_rect: Rect,
    ) -> Option<(Rect, i32, i32)> {
        let clipped = src_rect.intersect(&src.rect())?;
        let dest = Rect::new(
            x.saturating_add(clipped.x - src_rect.x),
            y.saturating_add(clipped.y - src_rect.y),
            clipped.w,
            clipped.h,
        );
        let target = dest.intersect(&self.rect())?;
        Some((
            target,
            clipped.x + (target.x - dest.x),
            clipped.y + (target.y - dest.y),
        ))
    }

    fn transfer(
        &mut self,
        target: Rect,
        sx: i32,
        sy: i32,
        src: &CpuImage,
        op: impl Fn(Color, Color) -> Color,
    ) {
        for row in 0..target.h {
            for col in 0..target.w {
                let (dx, dy) = (target.x + col, target.y + row);
                let value = op(src.read_unchecked(sx + col, sy + row), self.read_unchecked(dx, dy));
                self.write_unchecked(dx, dy, value);
            }
        }
    }

    fn stretch(
        &mut self,
        dest_rect: Rect,
        src: &CpuImage,
        src_rect: Rect,
        op: impl Fn(Color, Color) -> Color,
    ) -> bool {
        if dest_rect.is_empty() || src_rect.is_empty() {
            return false;
        }
        let Some(target) = dest_rect.intersect(&self.rect()) else {
            return false;
        };
        let bounds = src.rect();
        let mut touched = false;
        for dy in target.y..target.bottom() {
            let sy = src_rect.y as i64
                + (dy - dest_rect.y) as i64 * src_rect.h as i64 / dest_rect.h as i64;
            for dx in target.x..target.right() {
                let sx = src_rect.x as i64
                    + (dx - dest_rect.x) as i64 * src_rect.w as i64 / dest_rect.w as i64;
                let (sx, sy) = (sx as i32, sy as i32);
                if !bounds.contains(sx, sy) {
                    continue;
                }
                let value = op(src.read_unchecked(sx, sy), self.read_unchecked(dx, dy));
                self.write_unchecked(dx, dy, value);
                touched = true;
            }
        }
        touched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> CpuImage {
        let mut img = CpuImage::new(2, 2, PixelFormat::Rgba8);
        img.set_pixel(0, 0, Color::RED);
        img.set_pixel(1, 0, Color::GREEN);
        img.set_pixel(0, 1, Color::BLUE);
        img.set_pixel(1, 1, Color::WHITE);
        img
    }

    #[test]
    fn interpolated_pixel_blends_neighbors() {
        let img = checker();
        assert_eq!(img.get_interpolated_pixel(0.0, 0.0), Some(Color::RED));
        assert_eq!(img.get_interpolated_pixel(1.0, 1.0), Some(Color::WHITE));
        assert_eq!(
            img.get_interpolated_pixel(0.5, 0.0),
            Some(Color::new(128, 128, 0, 255))
        );
        assert_eq!(
            img.get_interpolated_pixel(0.5, 0.5),
            Some(Color::new(128, 128, 128, 255))
        );
        // Past the last center the edge pixel repeats.
        assert_eq!(img.get_interpolated_pixel(1.5, 0.0), Some(Color::GREEN));
        assert_eq!(img.get_interpolated_pixel(2.0, 0.0), None);
        assert_eq!(img.get_interpolated_pixel(-0.1, 0.0), None);
        assert_eq!(img.get_interpolated_pixel(f32::NAN, 0.0), None);
    }

    #[test]
    fn from_data_checks_length() {
        assert!(CpuImage::from_data(2, 2, PixelFormat::Rgb8, vec![0; 12]).is_ok());
        assert!(matches!(
            CpuImage::from_data(2, 2, PixelFormat::Rgb8, vec![0; 11]),
            Err(CoreError::DataSize {
                expected: 12,
                actual: 11
            })
        ));
    }

    #[test]
    fn pixel_access_is_bounds_checked() {
        let mut img = checker();
        assert_eq!(img.get_pixel(1, 0), Some(Color::GREEN));
        assert_eq!(img.get_pixel(2, 0), None);
        assert_eq!(img.get_pixel(-1, 0), None);
        assert!(!img.set_pixel(0, 5, Color::BLACK));
    }

    #[test]
    fn fill_rect_clips() {
        let mut img = CpuImage::new(4, 4, PixelFormat::Rgb8);
        assert!(img.fill_rect(Rect::new(2, 2, 10, 10), Color::YELLOW));
        assert_eq!(img.get_pixel(3, 3), Some(Color::YELLOW));
        assert_eq!(img.get_pixel(1, 1), Some(Color::BLACK));
        assert!(!img.fill_rect(Rect::new(8, 8, 2, 2), Color::YELLOW));
    }

    #[test]
    fn write_converts_and_clips() {
        let src = checker();
        let mut dst = CpuImage::new(3, 3, PixelFormat::Bgra8);
        assert!(dst.write(2, 2, &src, src.rect()));
        assert_eq!(dst.get_pixel(2, 2), Some(Color::RED));
        assert_eq!(dst.get_pixel(1, 1), Some(Color::CLEAR));

        // Negative destination shifts the source origin.
        let mut dst = CpuImage::new(2, 2, PixelFormat::Rgba8);
        assert!(dst.write(-1, -1, &src, src.rect()));
        assert_eq!(dst.get_pixel(0, 0), Some(Color::WHITE));
    }

    #[test]
    fn blit_blends_with_alpha() {
        let src = CpuImage::from_color(1, 1, PixelFormat::Rgba8, Color::RED);
        let mut dst = CpuImage::from_color(1, 1, PixelFormat::Rgba8, Color::BLUE);
        assert!(dst.blit(0, 0, &src, src.rect(), 0));
        assert_eq!(dst.get_pixel(0, 0), Some(Color::BLUE));
        assert!(dst.blit(0, 0, &src, src.rect(), 255));
        assert_eq!(dst.get_pixel(0, 0), Some(Color::RED));
    }

    #[test]
    fn stretch_doubles_pixels() {
        let src = checker();
        let mut dst = CpuImage::new(4, 4, PixelFormat::Rgba8);
        assert!(dst.write_stretch(dst.rect(), &src, src.rect()));
        assert_eq!(dst.get_pixel(1, 1), Some(Color::RED));
        assert_eq!(dst.get_pixel(2, 0), Some(Color::GREEN));
        assert_eq!(dst.get_pixel(3, 3), Some(Color::WHITE));

        let mut dst = CpuImage::from_color(2, 2, PixelFormat::Rgba8, Color::BLACK);
        let half_red = CpuImage::from_color(1, 1, PixelFormat::Rgba8, Color::RED);
        assert!(dst.blit_stretch(dst.rect(), &half_red, half_red.rect(), 255));
        assert_eq!(dst.get_pixel(1, 1), Some(Color::RED));
    }

    #[test]
    fn region_and_convert() {
        let img = checker();
        let sub = img.region(Rect::new(1, 0, 5, 5)).unwrap();
        assert_eq!((sub.width(), sub.height()), (1, 2));
        assert_eq!(sub.get_pixel(0, 1), Some(Color::WHITE));

        let alpha = img.convert(PixelFormat::Alpha8);
        assert_eq!(alpha.data().len(), 4);
        assert_eq!(alpha.get_pixel(0, 0), Some(Color::WHITE));
    }
}
