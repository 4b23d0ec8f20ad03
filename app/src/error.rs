//! Application error types.

use thiserror::Error;
use vesper_graphics::GraphicsError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),

    #[error("Window creation failed: {0}")]
    WindowCreation(String),

    #[error(transparent)]
    Graphics(#[from] GraphicsError),
}
