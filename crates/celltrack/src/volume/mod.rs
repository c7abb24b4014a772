//! Per-volume identity assignment.
//!
//! A [`Volume`] owns the planes of one time point and runs the within-volume
//! stages:
//!
//! 1. **Label** – propagate labels through z by nearest centroid
//!    ([`labeling::assign_labels`]).
//! 2. **Split merged cells** – score plane-to-plane continuity of every
//!    label-track, weight it by intensity and cut tracks at deep valleys of
//!    that evidence ([`barrier::detect_barriers`]). The cut plane's detection
//!    is dropped and the volume relabeled. Runs `barrier_passes` times.
//! 3. **Filter** – drop label-tracks spanning fewer than `min_track_planes`
//!    planes.
//! 4. **Consolidate** – one [`Cell3d`] per label at its brightest plane.

pub mod barrier;
pub mod consolidate;
pub mod continuity;
mod edit;
pub mod labeling;
mod plane;
pub mod tracks;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

use crate::cell::{CellInstance, Label};
use crate::config::SegmentationConfig;
use crate::geometry::Pixel;

pub use barrier::BarrierParams;
pub use consolidate::Cell3d;
pub use edit::EditError;
pub use plane::Plane;
pub use tracks::{LabelTrack, Occurrence};

/// Continuity and split-point analysis of one label-track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelTrackDiagnostics {
    pub label: Label,
    /// Planes covered by the label, ascending.
    pub planes: Vec<usize>,
    /// Smoothed continuity per track index.
    pub continuity: Vec<f64>,
    /// Intensity-weighted continuity per track index.
    pub evidence: Vec<f64>,
    /// Planes the split-point detector would cut.
    pub barrier_planes: Vec<usize>,
}

/// Counters produced by [`Volume::segment`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationStats {
    /// Detections present before post-processing.
    pub n_cells_in: usize,
    /// Detections removed at split points, summed over passes.
    pub n_split_points: usize,
    /// Detections removed with short label-tracks.
    pub n_short_removed: usize,
    /// Labels surviving post-processing.
    pub n_labels: usize,
}

/// The planes of one time point and the identities derived from them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    planes: Vec<Plane>,
    config: SegmentationConfig,
    next_label: Label,
    cells_3d: Vec<Cell3d>,
    diagnostics: Vec<LabelTrackDiagnostics>,
}

impl Volume {
    /// Wrap planes without running any stage. Labels are assigned on the
    /// first [`refresh`](Self::refresh) or [`segment`](Self::segment).
    pub fn new(planes: Vec<Plane>, config: SegmentationConfig) -> Self {
        Self {
            planes,
            config,
            next_label: 0,
            cells_3d: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Build a volume and run the full post-processing pipeline on it.
    pub fn segment(planes: Vec<Plane>, config: SegmentationConfig) -> (Self, SegmentationStats) {
        let mut volume = Self::new(planes, config);
        let stats = volume.run_pipeline();
        (volume, stats)
    }

    /// Label, split merged cells, drop short tracks and consolidate.
    pub fn run_pipeline(&mut self) -> SegmentationStats {
        let mut stats = SegmentationStats {
            n_cells_in: self.n_cells(),
            ..SegmentationStats::default()
        };

        self.relabel();
        for pass in 0..self.config.barrier_passes {
            let n = self.split_merged_cells();
            tracing::debug!(pass, n_split_points = n, "barrier pass");
            stats.n_split_points += n;
            self.relabel();
        }

        stats.n_short_removed = self.remove_short_tracks();
        self.refresh();
        stats.n_labels = self.cells_3d.len();

        tracing::info!(
            n_planes = self.planes.len(),
            n_cells_in = stats.n_cells_in,
            n_split_points = stats.n_split_points,
            n_short_removed = stats.n_short_removed,
            n_labels = stats.n_labels,
            "volume segmented"
        );
        stats
    }

    /// Relabel from scratch, then recompute diagnostics and 3D cells.
    ///
    /// Does not cut anything: split points found here are only reported in
    /// [`diagnostics`](Self::diagnostics).
    pub fn refresh(&mut self) {
        self.relabel();
        self.reconsolidate();
    }

    /// Recompute diagnostics and 3D cells from the current labels.
    fn reconsolidate(&mut self) {
        let tracks = self.label_tracks();
        self.diagnostics = self.analyze(&tracks);
        self.cells_3d = consolidate::consolidate(&self.planes, &tracks);
    }

    fn relabel(&mut self) {
        let threshold = self.config.distance_th_px();
        self.next_label = labeling::assign_labels(&mut self.planes, threshold, 0);
    }

    fn analyze(&self, tracks: &[LabelTrack]) -> Vec<LabelTrackDiagnostics> {
        let params = BarrierParams::from(&self.config);
        tracks
            .iter()
            .map(|track| {
                let cells: Vec<&CellInstance> = track.cells(&self.planes).collect();
                let masks: Vec<_> = cells.iter().map(|c| c.mask()).collect();
                let intensities: Vec<f64> = cells.iter().map(|c| c.intensity()).collect();

                let scores = continuity::overlap_matrix(
                    &masks,
                    self.config.overlap_mode,
                    self.config.full_overlap_matrix,
                );
                let continuity =
                    continuity::smoothed_continuity(&scores, self.config.z_neighborhood);
                let evidence = barrier::evidence_signal(&intensities, &continuity);
                let planes = track.planes();
                let barrier_planes = barrier::detect_barriers(&evidence, &params)
                    .into_iter()
                    .map(|i| planes[i])
                    .collect();

                LabelTrackDiagnostics {
                    label: track.label,
                    planes,
                    continuity,
                    evidence,
                    barrier_planes,
                }
            })
            .collect()
    }

    /// Drop the detection at every split point. Returns how many were dropped.
    fn split_merged_cells(&mut self) -> usize {
        let tracks = self.label_tracks();
        let diagnostics = self.analyze(&tracks);

        let mut doomed: Vec<Occurrence> = Vec::new();
        for (track, diag) in tracks.iter().zip(&diagnostics) {
            for &z in &diag.barrier_planes {
                if let Some(occ) = track.occurrences.iter().find(|o| o.z == z) {
                    tracing::debug!(label = track.label, z, "cutting label-track");
                    doomed.push(*occ);
                }
            }
        }
        self.remove_occurrences(doomed)
    }

    /// Drop every label-track shorter than `min_track_planes`.
    fn remove_short_tracks(&mut self) -> usize {
        let min_planes = self.config.min_track_planes;
        let doomed: Vec<Occurrence> = self
            .label_tracks()
            .into_iter()
            .filter(|t| t.len() < min_planes)
            .flat_map(|t| t.occurrences)
            .collect();
        self.remove_occurrences(doomed)
    }

    fn remove_occurrences(&mut self, mut doomed: Vec<Occurrence>) -> usize {
        // Highest index first so earlier indices in the same plane stay valid.
        doomed.sort_unstable_by(|a, b| b.z.cmp(&a.z).then(b.cell.cmp(&a.cell)));
        doomed.dedup();
        for occ in &doomed {
            self.planes[occ.z].cells_mut().remove(occ.cell);
        }
        doomed.len()
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn n_planes(&self) -> usize {
        self.planes.len()
    }

    /// Total number of detections over all planes.
    pub fn n_cells(&self) -> usize {
        self.planes.iter().map(Plane::len).sum()
    }

    /// Labels of plane `z` in detection order.
    pub fn labels(&self, z: usize) -> Option<Vec<Label>> {
        self.planes.get(z).map(Plane::labels)
    }

    /// Outlines of plane `z` in detection order.
    pub fn outlines(&self, z: usize) -> Option<Vec<&[Pixel]>> {
        self.planes.get(z).map(Plane::outlines)
    }

    /// Current label-tracks, ordered by first appearance.
    pub fn label_tracks(&self) -> Vec<LabelTrack> {
        tracks::collect_label_tracks(&self.planes)
    }

    /// Consolidated cells as of the last pipeline run, refresh or edit.
    pub fn cells_3d(&self) -> &[Cell3d] {
        &self.cells_3d
    }

    /// Per-label continuity analysis as of the last pipeline run, refresh or edit.
    pub fn diagnostics(&self) -> &[LabelTrackDiagnostics] {
        &self.diagnostics
    }

    /// One past the largest label handed out by the last labeling.
    pub fn next_label(&self) -> Label {
        self.next_label
    }
}
