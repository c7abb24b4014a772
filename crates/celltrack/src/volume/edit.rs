//! Manual corrections on a single volume.

use image::GrayImage;

use crate::cell::{CellError, CellInstance, Label};
use crate::geometry::{order_boundary, OutlineError, Pixel};

use super::Volume;

/// Errors returned by volume and time-series edits. A failed edit leaves the
/// data untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// Time index outside the series.
    UnknownTime { t: usize, n_times: usize },
    /// Plane index outside the volume.
    PlaneOutOfRange { z: usize, n_planes: usize },
    /// No detection carries `label` (on plane `z`, when given).
    UnknownLabel { label: Label, z: Option<usize> },
    /// Both labels occur on plane `z`, so they cannot be one cell.
    LabelCollision {
        label_a: Label,
        label_b: Label,
        z: usize,
    },
    /// Hand-drawn points could not be ordered into a boundary.
    Outline(OutlineError),
    /// The reconstructed cell has no area.
    Degenerate(CellError),
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTime { t, n_times } => {
                write!(f, "time point {} out of range (series has {})", t, n_times)
            }
            Self::PlaneOutOfRange { z, n_planes } => {
                write!(f, "plane {} out of range (volume has {})", z, n_planes)
            }
            Self::UnknownLabel { label, z: Some(z) } => {
                write!(f, "label {} not present on plane {}", label, z)
            }
            Self::UnknownLabel { label, z: None } => write!(f, "label {} not present", label),
            Self::LabelCollision {
                label_a,
                label_b,
                z,
            } => write!(
                f,
                "labels {} and {} both occur on plane {}",
                label_a, label_b, z
            ),
            Self::Outline(e) => write!(f, "{}", e),
            Self::Degenerate(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for EditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Outline(e) => Some(e),
            Self::Degenerate(e) => Some(e),
            _ => None,
        }
    }
}

impl From<OutlineError> for EditError {
    fn from(e: OutlineError) -> Self {
        Self::Outline(e)
    }
}

impl From<CellError> for EditError {
    fn from(e: CellError) -> Self {
        Self::Degenerate(e)
    }
}

impl Volume {
    fn check_plane(&self, z: usize) -> Result<(), EditError> {
        if z < self.planes.len() {
            Ok(())
        } else {
            Err(EditError::PlaneOutOfRange {
                z,
                n_planes: self.planes.len(),
            })
        }
    }

    fn has_label(&self, label: Label) -> bool {
        self.planes.iter().any(|p| p.position_of(label).is_some())
    }

    /// Remove the detection carrying `label` on plane `z`, then relabel.
    pub fn delete_cell(&mut self, label: Label, z: usize) -> Result<(), EditError> {
        self.check_plane(z)?;
        let idx = self.planes[z]
            .position_of(label)
            .ok_or(EditError::UnknownLabel { label, z: Some(z) })?;
        self.planes[z].cells_mut().remove(idx);
        tracing::info!(label, z, "deleted cell");
        self.refresh();
        Ok(())
    }

    /// Remove every detection carrying `label`, then relabel. Returns the
    /// number of detections removed.
    pub fn delete_label(&mut self, label: Label) -> Result<usize, EditError> {
        let mut removed = 0;
        for plane in &mut self.planes {
            let cells = plane.cells_mut();
            let before = cells.len();
            cells.retain(|c| c.label != label);
            removed += before - cells.len();
        }
        if removed == 0 {
            return Err(EditError::UnknownLabel { label, z: None });
        }
        tracing::info!(label, removed, "deleted label");
        self.refresh();
        Ok(removed)
    }

    /// Fold the larger of two labels into the smaller. Returns the surviving
    /// label.
    ///
    /// Only the 3D cells and diagnostics are recomputed; the planes keep
    /// their labels until the next structural edit relabels them.
    pub fn combine_labels(&mut self, label_a: Label, label_b: Label) -> Result<Label, EditError> {
        for label in [label_a, label_b] {
            if !self.has_label(label) {
                return Err(EditError::UnknownLabel { label, z: None });
            }
        }
        let (keep, drop) = (label_a.min(label_b), label_a.max(label_b));
        if keep == drop {
            return Ok(keep);
        }
        if let Some(z) = self
            .planes
            .iter()
            .position(|p| p.position_of(keep).is_some() && p.position_of(drop).is_some())
        {
            return Err(EditError::LabelCollision {
                label_a,
                label_b,
                z,
            });
        }

        for plane in &mut self.planes {
            for cell in plane.cells_mut() {
                if cell.label == drop {
                    cell.label = keep;
                }
            }
        }
        tracing::info!(keep, drop, "combined labels");
        self.reconsolidate();
        Ok(keep)
    }

    /// Add a hand-drawn cell from unordered boundary points on plane `z`,
    /// then relabel. Returns the label the new cell received.
    pub fn insert_cell(
        &mut self,
        points: &[Pixel],
        z: usize,
        image: &GrayImage,
    ) -> Result<Label, EditError> {
        self.check_plane(z)?;
        let outline = order_boundary(
            points,
            self.config.neighbors_for_sequence_sorting,
            self.config.sequence_seed,
        )?;
        let cell = CellInstance::from_outline(&outline, image, self.config.min_outline_length)?;

        let idx = self.planes[z].len();
        self.planes[z].cells_mut().push(cell);
        self.refresh();
        let label = self.planes[z].cells()[idx].label();
        tracing::info!(label, z, n_points = points.len(), "inserted cell");
        Ok(label)
    }
}
