//! One representative 3D cell per label.

use serde::{Deserialize, Serialize};

use crate::cell::{CellInstance, Label};
use crate::geometry::Pixel;

use super::plane::Plane;
use super::tracks::LabelTrack;

/// Canonical 3D representative of one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell3d {
    pub label: Label,
    /// Position `[z, y, x]`; z is the plane index, y/x the centroid in pixels.
    pub position: [f64; 3],
    /// Outline of the representative plane.
    pub outline: Vec<Pixel>,
    /// Intensity-sum of the representative plane.
    pub weight: f64,
}

/// Pick, for every label-track, the occurrence with the largest intensity-sum.
///
/// Ties keep the lowest plane. Output follows the order of `tracks`.
pub fn consolidate(planes: &[Plane], tracks: &[LabelTrack]) -> Vec<Cell3d> {
    tracks
        .iter()
        .filter_map(|track| {
            let mut best: Option<(usize, &CellInstance)> = None;
            for occ in &track.occurrences {
                let cell = &planes[occ.z].cells()[occ.cell];
                if best.map_or(true, |(_, b)| cell.intensity() > b.intensity()) {
                    best = Some((occ.z, cell));
                }
            }
            best.map(|(z, cell)| {
                let [x, y] = cell.centroid();
                Cell3d {
                    label: track.label,
                    position: [z as f64, y, x],
                    outline: cell.outline().to_vec(),
                    weight: cell.intensity(),
                }
            })
        })
        .collect()
}
