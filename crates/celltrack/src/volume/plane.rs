//! Detections of one z-slice.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::cell::{CellInstance, Label};
use crate::geometry::{Pixel, PixelMask};

/// One z-slice of a volume: the detections found on it, in detection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    cells: Vec<CellInstance>,
}

impl Plane {
    pub fn new(cells: Vec<CellInstance>) -> Self {
        Self { cells }
    }

    /// Build a plane from parallel outline and mask lists produced by an
    /// external segmenter.
    ///
    /// Degenerate detections (empty outline or mask) are dropped.
    pub fn from_detections(
        outlines: Vec<Vec<Pixel>>,
        masks: Vec<PixelMask>,
        image: &GrayImage,
    ) -> Self {
        if outlines.len() != masks.len() {
            tracing::warn!(
                n_outlines = outlines.len(),
                n_masks = masks.len(),
                "outline/mask count mismatch; extra entries ignored"
            );
        }
        let cells = outlines
            .into_iter()
            .zip(masks)
            .enumerate()
            .filter_map(|(i, (outline, mask))| {
                match CellInstance::measure(outline, mask, image) {
                    Ok(cell) => Some(cell),
                    Err(e) => {
                        tracing::debug!(detection = i, "dropping detection: {}", e);
                        None
                    }
                }
            })
            .collect();
        Self { cells }
    }

    /// Build a plane from outlines only; masks are rasterized from the
    /// densified outlines.
    pub fn from_outlines(
        outlines: &[Vec<Pixel>],
        image: &GrayImage,
        min_outline_length: usize,
    ) -> Self {
        let cells = outlines
            .iter()
            .enumerate()
            .filter_map(|(i, outline)| {
                match CellInstance::from_outline(outline, image, min_outline_length) {
                    Ok(cell) => Some(cell),
                    Err(e) => {
                        tracing::debug!(detection = i, "dropping detection: {}", e);
                        None
                    }
                }
            })
            .collect();
        Self { cells }
    }

    pub fn cells(&self) -> &[CellInstance] {
        &self.cells
    }

    pub(crate) fn cells_mut(&mut self) -> &mut Vec<CellInstance> {
        &mut self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Labels in detection order.
    pub fn labels(&self) -> Vec<Label> {
        self.cells.iter().map(CellInstance::label).collect()
    }

    /// Outlines in detection order.
    pub fn outlines(&self) -> Vec<&[Pixel]> {
        self.cells.iter().map(CellInstance::outline).collect()
    }

    /// Index of the detection carrying `label`, if any.
    pub fn position_of(&self, label: Label) -> Option<usize> {
        self.cells.iter().position(|c| c.label == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::disk_image;
    use approx::assert_abs_diff_eq;
    use image::Luma;

    #[test]
    fn degenerate_detections_are_dropped() {
        let img = GrayImage::from_pixel(8, 8, Luma([5]));
        let outlines = vec![vec![[1, 1], [2, 1]], vec![[4, 4]], vec![]];
        let masks = vec![
            PixelMask::from_pixels([[1, 1], [2, 1]]),
            PixelMask::default(),
            PixelMask::from_pixels([[6, 6]]),
        ];
        let plane = Plane::from_detections(outlines, masks, &img);
        assert_eq!(plane.len(), 1);
        assert_eq!(plane.cells()[0].mask().len(), 2);
    }

    #[test]
    fn outlines_are_measured_on_the_plane_image() {
        let img = disk_image(64, 64, &[([12.0, 22.0], 2, 100)]);
        let square = vec![[8, 18], [16, 18], [16, 26], [8, 26]];
        let plane = Plane::from_outlines(&[square], &img, 200);
        let cell = &plane.cells()[0];
        assert_eq!(cell.mask().len(), 81);
        assert_abs_diff_eq!(cell.intensity(), 13.0 * 100.0);
        assert_abs_diff_eq!(cell.centroid()[0], 12.0);
        assert_abs_diff_eq!(cell.centroid()[1], 22.0);
    }

    #[test]
    fn from_outlines_skips_empty_outlines() {
        let img = GrayImage::from_pixel(8, 8, Luma([5]));
        let outlines = vec![vec![[1, 1], [3, 1], [3, 3], [1, 3]], vec![]];
        let plane = Plane::from_outlines(&outlines, &img, 8);
        assert_eq!(plane.len(), 1);
        assert_eq!(plane.cells()[0].mask().len(), 9);
    }
}
