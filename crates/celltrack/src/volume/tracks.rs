//! Grouping of detections into label-tracks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cell::{CellInstance, Label};

use super::plane::Plane;

/// Where one label occurs in a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Plane index.
    pub z: usize,
    /// Index of the detection within its plane.
    pub cell: usize,
}

/// All plane occurrences of one label, in ascending z.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTrack {
    pub label: Label,
    pub occurrences: Vec<Occurrence>,
}

impl LabelTrack {
    pub fn len(&self) -> usize {
        self.occurrences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.occurrences.is_empty()
    }

    /// Plane indices covered by this label.
    pub fn planes(&self) -> Vec<usize> {
        self.occurrences.iter().map(|o| o.z).collect()
    }

    /// Detections of this label, in ascending z.
    pub fn cells<'a>(&'a self, planes: &'a [Plane]) -> impl Iterator<Item = &'a CellInstance> + 'a {
        self.occurrences.iter().map(|o| &planes[o.z].cells()[o.cell])
    }
}

/// Group detections by label, ordered by first appearance (z, then detection order).
pub fn collect_label_tracks(planes: &[Plane]) -> Vec<LabelTrack> {
    let mut index: HashMap<Label, usize> = HashMap::new();
    let mut tracks: Vec<LabelTrack> = Vec::new();
    for (z, plane) in planes.iter().enumerate() {
        for (cell, c) in plane.cells().iter().enumerate() {
            let slot = *index.entry(c.label).or_insert_with(|| {
                tracks.push(LabelTrack {
                    label: c.label,
                    occurrences: Vec::new(),
                });
                tracks.len() - 1
            });
            tracks[slot].occurrences.push(Occurrence { z, cell });
        }
    }
    tracks
}
