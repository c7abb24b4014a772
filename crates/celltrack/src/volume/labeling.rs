//! Label propagation across the planes of one volume.

use std::collections::HashMap;

use crate::cell::Label;

use super::plane::Plane;

#[inline]
fn dist(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// Closest previous-plane donor `(label, distance)` strictly within `threshold_px`.
fn nearest_donor(centroid: [f64; 2], prev: &Plane, threshold_px: f64) -> Option<(Label, f64)> {
    let mut best: Option<(Label, f64)> = None;
    for cell in prev.cells() {
        let d = dist(centroid, cell.centroid());
        if d < threshold_px && best.map_or(true, |(_, bd)| d < bd) {
            best = Some((cell.label, d));
        }
    }
    best
}

/// Assign labels plane by plane in increasing z.
///
/// Cells on the first plane, cells with no donor within `threshold_px`, and
/// cells losing a donor conflict draw fresh labels from `next_label`. When two
/// cells claim the same donor, the one closer to the previous plane keeps it;
/// on equal distance the cell seen first keeps it. Returns the counter value
/// after the last fresh label.
pub fn assign_labels(planes: &mut [Plane], threshold_px: f64, next_label: Label) -> Label {
    let mut next = next_label;
    let mut fresh = || {
        let label = next;
        next += 1;
        label
    };

    for z in 0..planes.len() {
        let (before, rest) = planes.split_at_mut(z);
        let plane = &mut rest[0];

        let Some(prev) = before.last() else {
            for cell in plane.cells_mut() {
                cell.label = fresh();
            }
            continue;
        };

        let donors: Vec<Option<(Label, f64)>> = plane
            .cells()
            .iter()
            .map(|c| nearest_donor(c.centroid(), prev, threshold_px))
            .collect();

        let mut labels = vec![0; plane.len()];
        let mut holder: HashMap<Label, usize> = HashMap::new();
        for (i, donor) in donors.iter().enumerate() {
            let Some((label, d)) = *donor else {
                labels[i] = fresh();
                continue;
            };
            match holder.get(&label).copied() {
                None => {
                    labels[i] = label;
                    holder.insert(label, i);
                }
                Some(other) => {
                    // The holder claimed this label through a donor, so it has one.
                    let other_d = donors[other].map_or(f64::INFINITY, |(_, od)| od);
                    if d < other_d {
                        labels[other] = fresh();
                        labels[i] = label;
                        holder.insert(label, i);
                    } else {
                        labels[i] = fresh();
                    }
                }
            }
        }

        for (cell, label) in plane.cells_mut().iter_mut().zip(labels) {
            cell.label = label;
        }
    }

    next
}
