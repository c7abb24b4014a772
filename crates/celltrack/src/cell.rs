//! Per-plane cell detections.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::geometry::{densify, Pixel, PixelMask};

/// Per-volume identity of a cell across z-planes.
pub type Label = usize;

/// Label carried by instances that have not been through the z-labeler yet.
pub const UNLABELED: Label = Label::MAX;

/// Reasons a detection cannot become a [`CellInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellError {
    /// The outline has no points.
    EmptyOutline,
    /// The mask has no interior pixels (zero-area detection).
    EmptyMask,
}

impl std::fmt::Display for CellError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyOutline => write!(f, "degenerate detection: empty outline"),
            Self::EmptyMask => write!(f, "degenerate detection: empty mask"),
        }
    }
}

impl std::error::Error for CellError {}

/// One detection on one plane.
///
/// Aggregates everything the pipeline needs about a detection so that edits
/// move a single record instead of several index-aligned lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellInstance {
    pub(crate) label: Label,
    outline: Vec<Pixel>,
    mask: PixelMask,
    /// Intensity-weighted centroid `[x, y]` in pixels.
    centroid: [f64; 2],
    /// Sum of raw intensities over the mask.
    intensity: f64,
}

impl CellInstance {
    /// Measure centroid and intensity of a detection on its raw plane image.
    ///
    /// Mask pixels outside the image contribute no weight. When every weight
    /// is zero the unweighted mask mean is used as centroid.
    pub fn measure(
        outline: Vec<Pixel>,
        mask: PixelMask,
        image: &GrayImage,
    ) -> Result<Self, CellError> {
        if outline.is_empty() {
            return Err(CellError::EmptyOutline);
        }
        if mask.is_empty() {
            return Err(CellError::EmptyMask);
        }

        let (w, h) = image.dimensions();
        let (mut sw, mut sx, mut sy) = (0.0f64, 0.0f64, 0.0f64);
        for &[x, y] in mask.pixels() {
            if x < 0 || y < 0 || x as u32 >= w || y as u32 >= h {
                continue;
            }
            let v = f64::from(image.get_pixel(x as u32, y as u32)[0]);
            sw += v;
            sx += v * f64::from(x);
            sy += v * f64::from(y);
        }

        let centroid = if sw > 0.0 {
            [sx / sw, sy / sw]
        } else {
            tracing::warn!(
                n_pixels = mask.len(),
                "zero-weight detection; using unweighted mask centroid"
            );
            mask_mean(&mask)
        };

        Ok(Self {
            label: UNLABELED,
            outline,
            mask,
            centroid,
            intensity: sw,
        })
    }

    /// Build a detection from an outline alone.
    ///
    /// The outline is densified to `min_outline_length` points, its interior
    /// rasterized, then measured on `image`.
    pub fn from_outline(
        outline: &[Pixel],
        image: &GrayImage,
        min_outline_length: usize,
    ) -> Result<Self, CellError> {
        if outline.is_empty() {
            return Err(CellError::EmptyOutline);
        }
        let outline = densify(outline, min_outline_length);
        let mask = PixelMask::from_outline(&outline);
        Self::measure(outline, mask, image)
    }

    /// Build a detection from values measured elsewhere.
    pub fn from_parts(
        outline: Vec<Pixel>,
        mask: PixelMask,
        centroid: [f64; 2],
        intensity: f64,
    ) -> Result<Self, CellError> {
        if outline.is_empty() {
            return Err(CellError::EmptyOutline);
        }
        if mask.is_empty() {
            return Err(CellError::EmptyMask);
        }
        Ok(Self {
            label: UNLABELED,
            outline,
            mask,
            centroid,
            intensity,
        })
    }

    /// Label assigned by the most recent z-labeling.
    pub fn label(&self) -> Label {
        self.label
    }

    pub fn outline(&self) -> &[Pixel] {
        &self.outline
    }

    pub fn mask(&self) -> &PixelMask {
        &self.mask
    }

    /// Intensity-weighted centroid `[x, y]`.
    pub fn centroid(&self) -> [f64; 2] {
        self.centroid
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }
}

fn mask_mean(mask: &PixelMask) -> [f64; 2] {
    let n = mask.len() as f64;
    let (sx, sy) = mask
        .pixels()
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &[x, y]| {
            (sx + f64::from(x), sy + f64::from(y))
        });
    [sx / n, sy / n]
}
