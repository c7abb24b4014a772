//! High-level time-series API.
//!
//! [`CellTracker`] segments every volume of a time series, tracks the 3D
//! cells through time and applies manual corrections while keeping the
//! tracking consistent with the edited volumes.

use image::GrayImage;

use crate::cell::Label;
use crate::config::CellTrackConfig;
use crate::geometry::Pixel;
use crate::tracking::{TrackId, Tracker, TrackingError, TrackingResult};
use crate::volume::{Cell3d, EditError, Plane, SegmentationStats, Volume};

/// Segmented and tracked time series with editing support.
///
/// # Examples
///
/// ```no_run
/// use celltrack::{CellTrackConfig, CellTracker, Plane};
///
/// let stacks: Vec<Vec<Plane>> = Vec::new();
/// let tracker = CellTracker::run(stacks, CellTrackConfig::default());
/// for frame in tracker.tracking().frames() {
///     println!("{:?}", frame.labels());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CellTracker {
    config: CellTrackConfig,
    tracker: Tracker,
    volumes: Vec<Volume>,
    stats: Vec<SegmentationStats>,
    tracking: TrackingResult,
    initial: (Vec<Volume>, TrackingResult),
}

impl CellTracker {
    /// Segment every stack (one per time point) and track the result.
    pub fn run(stacks: Vec<Vec<Plane>>, config: CellTrackConfig) -> Self {
        let (volumes, stats): (Vec<Volume>, Vec<SegmentationStats>) = stacks
            .into_iter()
            .enumerate()
            .map(|(t, planes)| {
                tracing::debug!(t, n_planes = planes.len(), "segmenting volume");
                Volume::segment(planes, config.segmentation.clone())
            })
            .unzip();

        let tracker = Tracker::new(config.tracking.clone());
        let tracking = tracker.track(&cells_3d(&volumes));
        tracing::info!(
            n_times = volumes.len(),
            n_tracks = tracking.next_track_id(),
            "time series tracked"
        );

        let initial = (volumes.clone(), tracking.clone());
        Self {
            config,
            tracker,
            volumes,
            stats,
            tracking,
            initial,
        }
    }

    pub fn config(&self) -> &CellTrackConfig {
        &self.config
    }

    pub fn n_times(&self) -> usize {
        self.volumes.len()
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn volume(&self, t: usize) -> Option<&Volume> {
        self.volumes.get(t)
    }

    /// Segmentation counters of the initial run, per time point.
    pub fn stats(&self) -> &[SegmentationStats] {
        &self.stats
    }

    pub fn tracking(&self) -> &TrackingResult {
        &self.tracking
    }

    /// Track id of local label `local` at time `t`.
    pub fn global_track(&self, t: usize, local: Label) -> Option<TrackId> {
        self.tracking.frame(t)?.global_for_local(local)
    }

    fn volume_mut(&mut self, t: usize) -> Result<&mut Volume, EditError> {
        let n_times = self.volumes.len();
        self.volumes
            .get_mut(t)
            .ok_or(EditError::UnknownTime { t, n_times })
    }

    fn retrack_from(&mut self, t: usize) {
        let cells = cells_3d(&self.volumes);
        self.tracker.retrack_from(&mut self.tracking, &cells, t);
    }

    /// Delete the cell `label` on plane `z` at time `t`.
    pub fn delete_cell(&mut self, t: usize, label: Label, z: usize) -> Result<(), EditError> {
        self.volume_mut(t)?.delete_cell(label, z)?;
        self.retrack_from(t);
        Ok(())
    }

    /// Delete every occurrence of `label` at time `t`.
    pub fn delete_label(&mut self, t: usize, label: Label) -> Result<usize, EditError> {
        let removed = self.volume_mut(t)?.delete_label(label)?;
        self.retrack_from(t);
        Ok(removed)
    }

    /// Combine two labels of the volume at time `t`.
    pub fn combine_labels(
        &mut self,
        t: usize,
        label_a: Label,
        label_b: Label,
    ) -> Result<Label, EditError> {
        let kept = self.volume_mut(t)?.combine_labels(label_a, label_b)?;
        self.retrack_from(t);
        Ok(kept)
    }

    /// Add a hand-drawn cell on plane `z` at time `t`.
    pub fn insert_cell(
        &mut self,
        t: usize,
        points: &[Pixel],
        z: usize,
        image: &GrayImage,
    ) -> Result<Label, EditError> {
        let label = self.volume_mut(t)?.insert_cell(points, z, image)?;
        self.retrack_from(t);
        Ok(label)
    }

    /// Merge two track ids at time `t` without re-tracking.
    pub fn merge_tracks(
        &mut self,
        t: usize,
        track_a: TrackId,
        track_b: TrackId,
    ) -> Result<TrackId, TrackingError> {
        self.tracking.merge_tracks(t, track_a, track_b)
    }

    /// Drop every correction and return to the state after [`run`](Self::run).
    ///
    /// Track ids minted by the dropped corrections stay reserved.
    pub fn undo_corrections(&mut self) {
        let (volumes, mut tracking) = self.initial.clone();
        tracking.reserve_ids_below(self.tracking.next_track_id());
        self.volumes = volumes;
        self.tracking = tracking;
        tracing::info!(
            next_track_id = self.tracking.next_track_id(),
            "corrections undone"
        );
    }
}

fn cells_3d(volumes: &[Volume]) -> Vec<Vec<Cell3d>> {
    volumes.iter().map(|v| v.cells_3d().to_vec()).collect()
}
