//! Graphics error types.

use thiserror::Error;
use vesper_core::CoreError;

/// Errors that can occur in the graphics system.
///
/// Only setup and creation calls surface these to the application. Device
/// hooks return them to the render thread, which recovers locally.
#[derive(Debug, Error)]
pub enum GraphicsError {
    /// Failed to initialize the render system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),

    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),

    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,

    /// The GPU device was lost.
    #[error("GPU device lost")]
    DeviceLost,

    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The render thread is gone or the request was made from it.
    #[error("render thread unavailable: {0}")]
    Disconnected(String),

    /// The backend does not support the operation.
    #[error("not supported by the {0} backend")]
    Unsupported(&'static str),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),

    /// Error from the core data types.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl GraphicsError {
    /// Whether the consumer must rebuild device state after this error.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Self::DeviceLost)
    }
}
