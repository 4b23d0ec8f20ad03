use crate::color::Color;

/// Pixel layout of a CPU image or device texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    #[default]
    Rgba8,
    Bgra8,
    Rgb8,
    /// Single alpha channel; color channels read back as white.
    Alpha8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::Rgb8 => 3,
            Self::Alpha8 => 1,
        }
    }

    pub const fn has_alpha(self) -> bool {
        !matches!(self, Self::Rgb8)
    }

    /// Decode one pixel. `bytes` must hold exactly one pixel.
    pub fn read(self, bytes: &[u8]) -> Color {
        match self {
            Self::Rgba8 => Color::new(bytes[0], bytes[1], bytes[2], bytes[3]),
            Self::Bgra8 => Color::new(bytes[2], bytes[1], bytes[0], bytes[3]),
            Self::Rgb8 => Color::rgb(bytes[0], bytes[1], bytes[2]),
            Self::Alpha8 => Color::WHITE.with_alpha(bytes[0]),
        }
    }

    /// Encode one pixel. `bytes` must hold exactly one pixel.
    pub fn write(self, bytes: &mut [u8], color: Color) {
        match self {
            Self::Rgba8 => bytes.copy_from_slice(&[color.r, color.g, color.b, color.a]),
            Self::Bgra8 => bytes.copy_from_slice(&[color.b, color.g, color.r, color.a]),
            Self::Rgb8 => bytes.copy_from_slice(&[color.r, color.g, color.b]),
            Self::Alpha8 => bytes[0] = color.a,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::rgba(PixelFormat::Rgba8, Color::new(10, 20, 30, 40))]
    #[case::bgra(PixelFormat::Bgra8, Color::new(10, 20, 30, 40))]
    #[case::rgb(PixelFormat::Rgb8, Color::rgb(10, 20, 30))]
    #[case::alpha(PixelFormat::Alpha8, Color::WHITE.with_alpha(40))]
    fn pixel_codec_preserves_representable_channels(
        #[case] format: PixelFormat,
        #[case] color: Color,
    ) {
        let mut buf = vec![0u8; format.bytes_per_pixel()];
        format.write(&mut buf, color);
        assert_eq!(format.read(&buf), color);
    }

    #[test]
    fn bgra_byte_order() {
        let mut buf = [0u8; 4];
        PixelFormat::Bgra8.write(&mut buf, Color::new(1, 2, 3, 4));
        assert_eq!(buf, [3, 2, 1, 4]);
    }
}
