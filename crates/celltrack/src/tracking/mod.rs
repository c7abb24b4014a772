//! Temporal tracking of consolidated 3D cells.
//!
//! ## Algorithm
//!
//! 1. **Seed** – the first time t = 0 is tracked, every local label becomes
//!    its own track id. Re-tracking t = 0 matches it against its previous
//!    version like any later frame.
//! 2. **Match** – for t > 0 the previous frame's cells (rows) and the current
//!    volume's cells (columns) are compared by scaled xy distance, with pairs
//!    too far apart in z gated out. Mutual nearest neighbors closer than
//!    `max_match_distance` inherit the previous track id.
//! 3. **Mint** – every unmatched current cell gets a fresh id from a
//!    high-water counter, so ids are never handed out twice in one result.

pub mod matching;

use serde::{Deserialize, Serialize};

use crate::cell::Label;
use crate::config::TrackingConfig;
use crate::geometry::Pixel;
use crate::volume::Cell3d;

/// Identity of a cell across time.
pub type TrackId = usize;

/// One 3D cell of one time point with its track identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedCell {
    pub track_id: TrackId,
    /// Label of the cell inside its own volume.
    pub local_label: Label,
    /// Position `[z, y, x]`.
    pub position: [f64; 3],
    pub outline: Vec<Pixel>,
}

/// Tracked cells of one time point: matched cells first, in the order of
/// their matches in the previous frame, then newly minted tracks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackedFrame {
    pub cells: Vec<TrackedCell>,
}

impl TrackedFrame {
    /// Track ids in frame order.
    pub fn labels(&self) -> Vec<TrackId> {
        self.cells.iter().map(|c| c.track_id).collect()
    }

    /// Positions `[z, y, x]` in frame order.
    pub fn centers(&self) -> Vec<[f64; 3]> {
        self.cells.iter().map(|c| c.position).collect()
    }

    pub fn outlines(&self) -> Vec<&[Pixel]> {
        self.cells.iter().map(|c| c.outline.as_slice()).collect()
    }

    /// `(local label, track id)` pairs in frame order.
    pub fn correspondence(&self) -> Vec<(Label, TrackId)> {
        self.cells
            .iter()
            .map(|c| (c.local_label, c.track_id))
            .collect()
    }

    pub fn global_for_local(&self, local: Label) -> Option<TrackId> {
        self.cells
            .iter()
            .find(|c| c.local_label == local)
            .map(|c| c.track_id)
    }

    fn contains_track(&self, id: TrackId) -> bool {
        self.cells.iter().any(|c| c.track_id == id)
    }
}

/// Lookup failures of track-level operations. A failed call mutates nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackingError {
    /// Time index outside the tracked series.
    UnknownTime { t: usize, n_times: usize },
    /// No cell of frame `t` carries the track id.
    UnknownTrack { t: usize, track_id: TrackId },
    /// Both ids occur in frame `t`, so they cannot be one track.
    TrackCollision {
        t: usize,
        track_a: TrackId,
        track_b: TrackId,
    },
}

impl std::fmt::Display for TrackingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownTime { t, n_times } => {
                write!(f, "time point {} out of range (series has {})", t, n_times)
            }
            Self::UnknownTrack { t, track_id } => {
                write!(f, "track {} not present at time {}", track_id, t)
            }
            Self::TrackCollision {
                t,
                track_a,
                track_b,
            } => write!(
                f,
                "tracks {} and {} both present at time {}",
                track_a, track_b, t
            ),
        }
    }
}

impl std::error::Error for TrackingError {}

/// Tracked frames of a time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingResult {
    frames: Vec<TrackedFrame>,
    next_track_id: TrackId,
}

impl TrackingResult {
    pub fn frames(&self) -> &[TrackedFrame] {
        &self.frames
    }

    pub fn frame(&self, t: usize) -> Option<&TrackedFrame> {
        self.frames.get(t)
    }

    pub fn n_times(&self) -> usize {
        self.frames.len()
    }

    /// Smallest id that has never been handed out.
    pub fn next_track_id(&self) -> TrackId {
        self.next_track_id
    }

    /// Raise the id counter to at least `id`. Never lowers it.
    pub(crate) fn reserve_ids_below(&mut self, id: TrackId) {
        self.next_track_id = self.next_track_id.max(id);
    }

    /// `(time, cell)` pairs carrying `id`, in time order.
    pub fn track_history(&self, id: TrackId) -> Vec<(usize, &TrackedCell)> {
        self.frames
            .iter()
            .enumerate()
            .flat_map(|(t, frame)| {
                frame
                    .cells
                    .iter()
                    .filter(move |c| c.track_id == id)
                    .map(move |c| (t, c))
            })
            .collect()
    }

    /// Rename the larger of two ids to the smaller one in frame `t` only.
    /// Returns the surviving id.
    pub fn merge_tracks(
        &mut self,
        t: usize,
        track_a: TrackId,
        track_b: TrackId,
    ) -> Result<TrackId, TrackingError> {
        let n_times = self.frames.len();
        let frame = self
            .frames
            .get_mut(t)
            .ok_or(TrackingError::UnknownTime { t, n_times })?;
        let (keep, drop) = (track_a.min(track_b), track_a.max(track_b));
        if !frame.contains_track(drop) {
            return Err(TrackingError::UnknownTrack { t, track_id: drop });
        }
        if keep == drop {
            return Ok(keep);
        }
        if frame.contains_track(keep) {
            return Err(TrackingError::TrackCollision {
                t,
                track_a,
                track_b,
            });
        }
        for cell in frame.cells.iter_mut().filter(|c| c.track_id == drop) {
            cell.track_id = keep;
        }
        tracing::info!(t, keep, drop, "merged tracks");
        Ok(keep)
    }
}

/// Frame-to-frame tracker over per-time lists of 3D cells.
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    config: TrackingConfig,
}

impl Tracker {
    pub fn new(config: TrackingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    /// Track a whole series from scratch.
    pub fn track(&self, volumes: &[Vec<Cell3d>]) -> TrackingResult {
        let mut result = TrackingResult::default();
        self.retrack_from(&mut result, volumes, 0);
        result
    }

    /// Drop every frame from `t0` on and recompute them from `volumes`.
    ///
    /// `t0` is clamped to the number of existing frames. The id counter is
    /// kept, so ids handed out by dropped frames are not reused. Re-tracking
    /// an already tracked first frame matches it against its old version
    /// instead of seeding it again.
    pub fn retrack_from(&self, result: &mut TrackingResult, volumes: &[Vec<Cell3d>], t0: usize) {
        let t0 = t0.min(result.frames.len()).min(volumes.len());
        let old_first = if t0 == 0 {
            result.frames.first().cloned()
        } else {
            None
        };
        result.frames.truncate(t0);

        for (t, cells) in volumes.iter().enumerate().skip(t0) {
            let frame = match (result.frames.last(), &old_first) {
                (Some(prev), _) | (None, Some(prev)) => {
                    self.match_frame(t, prev, cells, &mut result.next_track_id)
                }
                (None, None) => self.seed_frame(cells, &mut result.next_track_id),
            };
            result.frames.push(frame);
        }
    }

    fn seed_frame(&self, cells: &[Cell3d], next_id: &mut TrackId) -> TrackedFrame {
        if let Some(max_label) = cells.iter().map(|c| c.label).max() {
            *next_id = (*next_id).max(max_label + 1);
        }
        tracing::info!(t = 0, n_tracks = cells.len(), "seeded tracks");
        TrackedFrame {
            cells: cells.iter().map(|c| tracked(c, c.label)).collect(),
        }
    }

    fn match_frame(
        &self,
        t: usize,
        prev: &TrackedFrame,
        cells: &[Cell3d],
        next_id: &mut TrackId,
    ) -> TrackedFrame {
        let future: Vec<[f64; 3]> = cells.iter().map(|c| c.position).collect();
        let distances = matching::distance_matrix(&prev.centers(), &future, &self.config);
        let pairs = matching::mutual_nearest(&distances, self.config.max_match_distance);

        let mut matched = vec![false; cells.len()];
        let mut out: Vec<TrackedCell> = Vec::with_capacity(cells.len());
        for &(i, j) in &pairs {
            matched[j] = true;
            out.push(tracked(&cells[j], prev.cells[i].track_id));
        }

        let n_matched = out.len();
        for (cell, &m) in cells.iter().zip(&matched) {
            if !m {
                out.push(tracked(cell, *next_id));
                *next_id += 1;
            }
        }

        tracing::info!(
            t,
            n_cells = cells.len(),
            n_matched,
            n_new = out.len() - n_matched,
            "tracked frame"
        );
        TrackedFrame { cells: out }
    }
}

fn tracked(cell: &Cell3d, track_id: TrackId) -> TrackedCell {
    TrackedCell {
        track_id,
        local_label: cell.label,
        position: cell.position,
        outline: cell.outline.clone(),
    }
}
