pub mod color;
pub mod depth;
pub mod display;
pub mod renderer;
pub mod skeleton;

use thiserror::Error;

use crate::types::StreamKind;

// Re-exports for convenience
pub use display::{DisplayReceiver, DisplaySurface, channel_surface};
pub use renderer::FrameRenderer;
pub use skeleton::{SkeletonOptions, compose_overlay};

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("{} frame unavailable", .stream.label())]
    Unavailable { stream: StreamKind },
    #[error(
        "{} frame has {actual} elements, expected {expected} for {width}x{height}",
        .stream.label()
    )]
    LengthMismatch {
        stream: StreamKind,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("{} frame dimensions {width}x{height} are invalid for {detail}", .stream.label())]
    InvalidDimensions {
        stream: StreamKind,
        width: u32,
        height: u32,
        detail: String,
    },
    #[error("{0}")]
    Conversion(String),
}
