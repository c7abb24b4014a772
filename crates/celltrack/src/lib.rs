//! celltrack — identity assignment for segmented cells in 3D time-lapse
//! microscopy.
//!
//! Input is the output of a 2D instance segmenter: per plane, one outline
//! (and optionally one mask) per detected cell plus the raw plane image.
//! The pipeline stages are:
//!
//! 1. **Label** – propagate per-volume labels through z by nearest centroid.
//! 2. **Split** – detect merged cells from dips in intensity-weighted
//!    plane-to-plane overlap and cut them apart.
//! 3. **Consolidate** – one 3D cell per label at its brightest plane.
//! 4. **Track** – link 3D cells across time by mutual nearest neighbors.
//!
//! # Public API
//! - [`CellTracker`] as the time-series entry point, including manual
//!   corrections and undo
//! - [`Volume`] and [`Tracker`] for running the stages separately
//! - [`CellTrackConfig`] for tuning
//! - the geometry, volume and tracking modules for the building blocks

mod api;
mod cell;
mod config;
pub mod geometry;
pub mod tracking;
pub mod volume;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::CellTracker;
pub use cell::{CellError, CellInstance, Label, UNLABELED};
pub use config::{
    CellTrackConfig, ConfigError, SegmentationConfig, TrackingConfig, DEFAULT_XY_RESOLUTION,
};
pub use geometry::{OutlineError, OverlapMode, Pixel, PixelMask};
pub use tracking::{
    TrackId, TrackedCell, TrackedFrame, Tracker, TrackingError, TrackingResult,
};
pub use volume::{
    Cell3d, EditError, LabelTrackDiagnostics, Plane, SegmentationStats, Volume,
};
