//! Plane-to-plane continuity of a label-track.

use nalgebra::DMatrix;

use crate::geometry::{overlap, OverlapMode, PixelMask};

/// Pairwise overlap scores between the masks of one label-track.
///
/// Entry `(i, j)` scores mask `i` against mask `j`. With `full == false` only
/// `j < i` is computed and the remaining entries stay zero. The diagonal is
/// always zero.
pub fn overlap_matrix(masks: &[&PixelMask], mode: OverlapMode, full: bool) -> DMatrix<f64> {
    let n = masks.len();
    let mut m = DMatrix::<f64>::zeros(n, n);
    for i in 0..n {
        let upper = if full { n } else { i };
        for j in 0..upper {
            if i != j {
                m[(i, j)] = overlap(masks[i], masks[j], mode);
            }
        }
    }
    m
}

/// Mean of row `i` over the other track indices within `radius` of `i`.
///
/// Returns 0 for an index with no neighbor in range.
pub fn smoothed_continuity(scores: &DMatrix<f64>, radius: usize) -> Vec<f64> {
    let n = scores.nrows();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(n);
            let (sum, count) = (lo..hi)
                .filter(|&j| j != i)
                .fold((0.0, 0usize), |(s, c), j| (s + scores[(i, j)], c + 1));
            if count == 0 {
                0.0
            } else {
                sum / count as f64
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn row(x0: i32, len: i32) -> PixelMask {
        PixelMask::from_pixels((x0..x0 + len).map(|x| [x, 0]))
    }

    #[test]
    fn full_matrix_is_symmetric_with_zero_diagonal() {
        let a = row(0, 4);
        let b = row(2, 4);
        let c = row(0, 4);
        let m = overlap_matrix(&[&a, &b, &c], OverlapMode::Absolute, true);
        for i in 0..3 {
            assert_eq!(m[(i, i)], 0.0);
            for j in 0..3 {
                assert_abs_diff_eq!(m[(i, j)], m[(j, i)]);
            }
        }
        assert_abs_diff_eq!(m[(0, 1)], 50.0);
        assert_abs_diff_eq!(m[(0, 2)], 100.0);
    }

    #[test]
    fn restricted_matrix_only_scores_earlier_planes() {
        let a = row(0, 4);
        let m = overlap_matrix(&[&a, &a, &a], OverlapMode::Relative, false);
        assert_eq!(m[(0, 1)], 0.0);
        assert_eq!(m[(1, 2)], 0.0);
        assert_abs_diff_eq!(m[(1, 0)], 100.0);
        assert_abs_diff_eq!(m[(2, 1)], 100.0);
    }

    #[test]
    fn continuity_averages_within_radius() {
        let m = DMatrix::from_row_slice(
            4,
            4,
            &[
                0.0, 80.0, 40.0, 10.0, //
                80.0, 0.0, 60.0, 20.0, //
                40.0, 60.0, 0.0, 90.0, //
                10.0, 20.0, 90.0, 0.0,
            ],
        );
        let c = smoothed_continuity(&m, 1);
        assert_abs_diff_eq!(c[0], 80.0);
        assert_abs_diff_eq!(c[1], 70.0);
        assert_abs_diff_eq!(c[2], 75.0);
        assert_abs_diff_eq!(c[3], 90.0);
    }

    #[test]
    fn single_plane_track_has_zero_continuity() {
        let m = DMatrix::<f64>::zeros(1, 1);
        assert_eq!(smoothed_continuity(&m, 2), vec![0.0]);
    }
}
