//! Pixel masks and the normalized overlap score between them.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Integer pixel coordinate `[x, y]`.
pub type Pixel = [i32; 2];

/// Normalization used by [`overlap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapMode {
    /// `100 * |A ∩ B| / min(|A|, |B|)`.
    Relative,
    /// `200 * |A ∩ B| / (|A| + |B|)`.
    #[default]
    Absolute,
}

/// Interior pixels of one detection.
///
/// Pixels are kept sorted in row-major `(y, x)` order without duplicates, so
/// membership is a binary search and intersection is a linear merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Pixel>", into = "Vec<Pixel>")]
pub struct PixelMask {
    pixels: Vec<Pixel>,
}

#[inline]
fn row_major(a: &Pixel, b: &Pixel) -> Ordering {
    a[1].cmp(&b[1]).then(a[0].cmp(&b[0]))
}

impl PixelMask {
    /// Build a mask from an arbitrary (possibly unsorted, repeated) pixel list.
    pub fn from_pixels<I: IntoIterator<Item = Pixel>>(pixels: I) -> Self {
        let mut pixels: Vec<Pixel> = pixels.into_iter().collect();
        pixels.sort_unstable_by(row_major);
        pixels.dedup();
        Self { pixels }
    }

    /// Rasterize the interior of a closed outline by scanline filling.
    ///
    /// Every row touched by the outline contributes all pixels between the
    /// leftmost and rightmost outline point on that row (inclusive).
    pub fn from_outline(outline: &[Pixel]) -> Self {
        let mut rows: BTreeMap<i32, (i32, i32)> = BTreeMap::new();
        for &[x, y] in outline {
            rows.entry(y)
                .and_modify(|(lo, hi)| {
                    *lo = (*lo).min(x);
                    *hi = (*hi).max(x);
                })
                .or_insert((x, x));
        }
        let pixels = rows
            .into_iter()
            .flat_map(|(y, (lo, hi))| (lo..=hi).map(move |x| [x, y]))
            .collect();
        // Rows come out of the BTreeMap in order and x ascends within a row.
        Self { pixels }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Pixels in row-major order.
    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    pub fn contains(&self, p: Pixel) -> bool {
        self.pixels.binary_search_by(|q| row_major(q, &p)).is_ok()
    }

    /// Number of pixels present in both masks.
    pub fn intersection_count(&self, other: &PixelMask) -> usize {
        let (a, b) = (&self.pixels, &other.pixels);
        let (mut i, mut j, mut n) = (0usize, 0usize, 0usize);
        while i < a.len() && j < b.len() {
            match row_major(&a[i], &b[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    n += 1;
                    i += 1;
                    j += 1;
                }
            }
        }
        n
    }
}

impl From<Vec<Pixel>> for PixelMask {
    fn from(pixels: Vec<Pixel>) -> Self {
        Self::from_pixels(pixels)
    }
}

impl From<PixelMask> for Vec<Pixel> {
    fn from(mask: PixelMask) -> Self {
        mask.pixels
    }
}

/// Normalized overlap score in `[0, 100]` between two masks.
///
/// Returns 0 when the normalizing denominator is zero.
pub fn overlap(a: &PixelMask, b: &PixelMask, mode: OverlapMode) -> f64 {
    let shared = a.intersection_count(b) as f64;
    match mode {
        OverlapMode::Relative => {
            let denom = a.len().min(b.len());
            if denom == 0 {
                0.0
            } else {
                100.0 * shared / denom as f64
            }
        }
        OverlapMode::Absolute => {
            let denom = a.len() + b.len();
            if denom == 0 {
                0.0
            } else {
                200.0 * shared / denom as f64
            }
        }
    }
}
