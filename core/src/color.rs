//! 8-bit RGBA color.

use bytemuck::{Pod, Zeroable};

use crate::error::CoreError;

/// An 8-bit per channel RGBA color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Color {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const GREY: Self = Self::rgb(127, 127, 127);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    pub const YELLOW: Self = Self::rgb(255, 255, 0);
    pub const MAGENTA: Self = Self::rgb(255, 0, 255);
    pub const CYAN: Self = Self::rgb(0, 255, 255);
    /// Fully transparent black.
    pub const CLEAR: Self = Self::new(0, 0, 0, 0);

    /// Create a color from all four channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Same color with a different alpha.
    pub const fn with_alpha(self, a: u8) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }

    /// Parse `RRGGBB` or `RRGGBBAA`, optionally prefixed with `0x`.
    ///
    /// A malformed string is a programming error and is reported as
    /// [`CoreError::InvalidHexColor`].
    pub fn from_hex(hex: &str) -> Result<Self, CoreError> {
        let digits = hex
            .strip_prefix("0x")
            .or_else(|| hex.strip_prefix("0X"))
            .unwrap_or(hex);
        if (digits.len() != 6 && digits.len() != 8)
            || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(CoreError::InvalidHexColor(hex.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| CoreError::InvalidHexColor(hex.to_string()))
        };
        let a = if digits.len() == 8 { channel(3)? } else { 255 };
        Ok(Self::new(channel(0)?, channel(1)?, channel(2)?, a))
    }

    /// Format as uppercase `RRGGBBAA`, or `RRGGBB` when `rgb_only` is set.
    pub fn to_hex(&self, rgb_only: bool) -> String {
        if rgb_only {
            format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }

    /// Pack as `0xRRGGBBAA`.
    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }

    /// Unpack from `0xRRGGBBAA`.
    pub const fn from_u32(value: u32) -> Self {
        let [r, g, b, a] = value.to_be_bytes();
        Self::new(r, g, b, a)
    }

    /// Channels as normalized floats.
    pub fn to_f32_array(self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    /// Linear interpolation towards `other`; `t` is clamped to `[0, 1]`.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }

    /// Channel-wise modulation, as used by the multiply color mode.
    pub fn multiply(self, other: Self) -> Self {
        let mul = |a: u8, b: u8| ((a as u16 * b as u16 + 127) / 255) as u8;
        Self::new(
            mul(self.r, other.r),
            mul(self.g, other.g),
            mul(self.b, other.b),
            mul(self.a, other.a),
        )
    }

    /// Source-over blend of `self` onto `dst`, with an extra alpha factor.
    pub fn blend_over(self, dst: Self, alpha: u8) -> Self {
        let sa = self.a as u32 * alpha as u32 / 255;
        if sa == 0 {
            return dst;
        }
        if sa == 255 {
            return self;
        }
        let inv = 255 - sa;
        let mix = |s: u8, d: u8| ((s as u32 * sa + d as u32 * inv + 127) / 255) as u8;
        Self::new(
            mix(self.r, dst.r),
            mix(self.g, dst.g),
            mix(self.b, dst.b),
            (sa + dst.a as u32 * inv / 255).min(255) as u8,
        )
    }
}

impl std::str::FromStr for Color {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::rgb("FF8000", Color::rgb(255, 128, 0))]
    #[case::rgba("FF800040", Color::new(255, 128, 0, 64))]
    #[case::prefixed("0x00FF00", Color::GREEN)]
    #[case::lowercase("0xff00ff7f", Color::new(255, 0, 255, 127))]
    fn parses_hex(#[case] input: &str, #[case] expected: Color) {
        assert_eq!(Color::from_hex(input).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::short("FFF")]
    #[case::seven("FF00FF0")]
    #[case::not_hex("GG0000")]
    #[case::prefix_only("0x")]
    fn rejects_malformed_hex(#[case] input: &str) {
        assert!(matches!(
            Color::from_hex(input),
            Err(CoreError::InvalidHexColor(_))
        ));
    }

    #[test]
    fn hex_formatting() {
        let c = Color::new(1, 2, 3, 4);
        assert_eq!(c.to_hex(false), "01020304");
        assert_eq!(c.to_hex(true), "010203");
        assert_eq!(c.to_hex(false).parse::<Color>().unwrap(), c);
    }

    #[test]
    fn u32_packing() {
        let c = Color::new(0x11, 0x22, 0x33, 0x44);
        assert_eq!(c.to_u32(), 0x1122_3344);
        assert_eq!(Color::from_u32(0x1122_3344), c);
    }

    #[test]
    fn blend_over_extremes() {
        let dst = Color::BLUE;
        assert_eq!(Color::RED.blend_over(dst, 255), Color::RED);
        assert_eq!(Color::RED.blend_over(dst, 0), dst);
        assert_eq!(Color::CLEAR.blend_over(dst, 255), dst);

        let half = Color::new(255, 0, 0, 128).blend_over(Color::BLACK, 255);
        assert!(half.r > 120 && half.r < 135);
        assert_eq!(half.a, 255);
    }

    #[test]
    fn multiply_and_lerp() {
        assert_eq!(Color::WHITE.multiply(Color::RED), Color::RED);
        assert_eq!(Color::BLACK.lerp(Color::WHITE, 1.0), Color::WHITE);
        assert_eq!(Color::BLACK.lerp(Color::WHITE, -3.0), Color::BLACK);
    }
}
