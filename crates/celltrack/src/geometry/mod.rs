//! Pixel-level geometry: masks, overlap scores and outline handling.

pub mod mask;
pub mod outline;

pub use mask::{overlap, OverlapMode, Pixel, PixelMask};
pub use outline::{densify, order_boundary, OutlineError, MIN_OUTLINE_POINTS};
