//! Distance matrix and mutual-nearest-neighbor assignment between frames.

use nalgebra::DMatrix;

use crate::config::TrackingConfig;

/// Pairwise distances between `past` (rows) and `future` (columns) positions
/// given as `[z, y, x]`.
///
/// xy offsets are scaled to microns; pairs more than `z_gate_planes` apart
/// in z get `gated_distance` instead.
pub fn distance_matrix(
    past: &[[f64; 3]],
    future: &[[f64; 3]],
    cfg: &TrackingConfig,
) -> DMatrix<f64> {
    DMatrix::from_fn(past.len(), future.len(), |i, j| {
        let [pz, py, px] = past[i];
        let [fz, fy, fx] = future[j];
        if (pz - fz).abs() > cfg.z_gate_planes {
            return cfg.gated_distance;
        }
        let dy = (py - fy) * cfg.xy_resolution;
        let dx = (px - fx) * cfg.xy_resolution;
        (dx * dx + dy * dy).sqrt()
    })
}

/// Index of the first minimum, `None` for an empty iterator.
fn argmin(values: impl Iterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.enumerate() {
        if best.map_or(true, |(_, b)| v < b) {
            best = Some((i, v));
        }
    }
    best.map(|(i, _)| i)
}

/// Pairs `(row, col)` that are each other's nearest neighbor and closer than
/// `max_distance`, in row order.
pub fn mutual_nearest(distances: &DMatrix<f64>, max_distance: f64) -> Vec<(usize, usize)> {
    let (rows, cols) = distances.shape();
    if rows == 0 || cols == 0 {
        return Vec::new();
    }
    let col_best: Vec<Option<usize>> = (0..cols)
        .map(|j| argmin(distances.column(j).iter().copied()))
        .collect();

    (0..rows)
        .filter_map(|i| {
            let j = argmin(distances.row(i).iter().copied())?;
            (col_best[j] == Some(i) && distances[(i, j)] < max_distance).then_some((i, j))
        })
        .collect()
}
