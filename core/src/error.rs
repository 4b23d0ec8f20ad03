//! Core error types.

use thiserror::Error;

/// Errors reported by the core data types.
///
/// These indicate programmer misuse (malformed input to a setup call) or
/// a failed decode. Per-frame operations never produce them.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A hex color string was not `RRGGBB` or `RRGGBBAA`.
    #[error("invalid hex color {0:?}: expected RRGGBB or RRGGBBAA with optional 0x prefix")]
    InvalidHexColor(String),

    /// A rectangle had a negative or overflowing extent.
    #[error("invalid rectangle: {0}")]
    InvalidRect(String),

    /// Pixel data did not match the declared size and format.
    #[error("pixel data size mismatch: expected {expected} bytes, got {actual}")]
    DataSize { expected: usize, actual: usize },

    /// Image decoding failed.
    #[error("image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Reading an image source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidHexColor("zz".to_string());
        assert!(err.to_string().starts_with("invalid hex color \"zz\""));

        let err = CoreError::DataSize {
            expected: 16,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "pixel data size mismatch: expected 16 bytes, got 4"
        );
    }
}
