//! Outline reconstruction and densification.

use rand::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use super::mask::Pixel;

/// Minimum number of points that can describe a closed outline.
pub const MIN_OUTLINE_POINTS: usize = 3;

/// Errors raised while turning user points into a closed outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineError {
    /// Too few points to form a polygon.
    TooFewPoints {
        /// Required minimum number of points.
        needed: usize,
        /// Provided number of points.
        got: usize,
    },
    /// The nearest-neighbor walk ran out of unvisited neighbors.
    ///
    /// `partial` is the ordered path built before the walk got stuck; the
    /// caller should ask for a denser or cleaner drawing.
    NoUnvisitedNeighbor {
        /// Ordered points visited so far.
        partial: Vec<Pixel>,
        /// Number of input points.
        total: usize,
    },
}

impl std::fmt::Display for OutlineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "too few outline points: need {}, got {}", needed, got)
            }
            Self::NoUnvisitedNeighbor { partial, total } => write!(
                f,
                "outline walk stuck after {} of {} points; no unvisited neighbor",
                partial.len(),
                total
            ),
        }
    }
}

impl std::error::Error for OutlineError {}

#[inline]
fn dist2(a: Pixel, b: Pixel) -> i64 {
    let dx = i64::from(a[0] - b[0]);
    let dy = i64::from(a[1] - b[1]);
    dx * dx + dy * dy
}

#[inline]
fn midpoint(a: Pixel, b: Pixel) -> Pixel {
    let mx = (f64::from(a[0]) + f64::from(b[0])) * 0.5;
    let my = (f64::from(a[1]) + f64::from(b[1])) * 0.5;
    [mx.round_ties_even() as i32, my.round_ties_even() as i32]
}

fn widen(p: Pixel) -> [i64; 2] {
    [i64::from(p[0]), i64::from(p[1])]
}

/// Indices of the `k - 1` nearest other points for every point.
///
/// `k` counts the query point itself. Neighbors are ranked by distance, then
/// by index.
fn knn_index(points: &[Pixel], k: usize) -> Vec<Vec<usize>> {
    let take = k.saturating_sub(1);
    let tree = RTree::bulk_load(
        points
            .iter()
            .enumerate()
            .map(|(i, &p)| GeomWithData::new(widen(p), i))
            .collect(),
    );

    points
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let mut ranked: Vec<(i64, usize)> = Vec::with_capacity(take + 1);
            for hit in tree.nearest_neighbor_iter(&widen(p)) {
                let j = hit.data;
                if j == i {
                    continue;
                }
                let d2 = dist2(p, points[j]);
                // Run through ties at the cut-off so the index decides them.
                if ranked.len() >= take && ranked.last().map_or(true, |&(last, _)| d2 > last) {
                    break;
                }
                ranked.push((d2, j));
            }
            ranked.sort_unstable();
            ranked.truncate(take);
            ranked.into_iter().map(|(_, j)| j).collect()
        })
        .collect()
}

/// Order an unordered point cloud into a boundary polygon.
///
/// Starts at a point drawn from a seeded RNG and repeatedly steps to the
/// nearest not-yet-visited point among the `neighbors` nearest (self
/// included). Fails with the partial path when no such point remains.
pub fn order_boundary(
    points: &[Pixel],
    neighbors: usize,
    seed: u64,
) -> Result<Vec<Pixel>, OutlineError> {
    if points.len() < MIN_OUTLINE_POINTS {
        return Err(OutlineError::TooFewPoints {
            needed: MIN_OUTLINE_POINTS,
            got: points.len(),
        });
    }

    let knn = knn_index(points, neighbors);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut current = rng.gen_range(0..points.len());
    let mut visited = vec![false; points.len()];
    visited[current] = true;
    let mut path = vec![points[current]];

    while path.len() < points.len() {
        let Some(&next) = knn[current].iter().find(|&&j| !visited[j]) else {
            return Err(OutlineError::NoUnvisitedNeighbor {
                partial: path,
                total: points.len(),
            });
        };
        visited[next] = true;
        path.push(points[next]);
        current = next;
    }

    Ok(path)
}

/// Insert rounded midpoints until the outline has at least `min_len` points.
///
/// Each round doubles the point count; `ceil(log2(min_len / len))` rounds run.
pub fn densify(outline: &[Pixel], min_len: usize) -> Vec<Pixel> {
    let n = outline.len();
    if n < 2 || min_len <= n {
        return outline.to_vec();
    }
    let rounds = (min_len as f64 / n as f64).log2().ceil() as usize;

    let mut current = outline.to_vec();
    for _ in 0..rounds {
        let m = current.len();
        let mut next = Vec::with_capacity(2 * m);
        for i in 0..m {
            let a = current[i];
            let b = current[(i + 1) % m];
            next.push(a);
            next.push(midpoint(a, b));
        }
        current = next;
    }
    current
}
