//! Split-point detection on a label-track's evidence signal.
//!
//! ## Algorithm
//!
//! 1. **Extrema** – valleys are strict interior local minima; peaks are strict
//!    local maxima, where a boundary sample only needs to beat its single
//!    neighbor.
//!
//! 2. **Valley merge** – adjacent valleys closer than `merge_gap` collapse into
//!    one valley at the evidence maximum of `[left, right)`, and the evidence
//!    over `[left, right]` is flattened to that value so the old valleys are
//!    not found again. Repeated until no close pair remains.
//!
//! 3. **Depth filter** – a valley survives when its depth relative to the
//!    lower of its two enclosing peaks reaches `depth_threshold`. Peak
//!    positions come from the raw signal, peak values from the flattened one.
//!    A side without a strict peak (plateaus) uses its maximum evidence.

use crate::config::SegmentationConfig;

/// Parameters of the split-point detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarrierParams {
    /// Valleys closer than this many track indices are merged.
    pub merge_gap: usize,
    /// Minimum relative valley depth `(peak - valley) / peak`.
    pub depth_threshold: f64,
}

impl From<&SegmentationConfig> for BarrierParams {
    fn from(cfg: &SegmentationConfig) -> Self {
        Self {
            merge_gap: cfg.valley_merge_gap,
            depth_threshold: cfg.overlap_gradient_th,
        }
    }
}

impl Default for BarrierParams {
    fn default() -> Self {
        Self::from(&SegmentationConfig::default())
    }
}

/// Per-plane evidence: intensity-sum times smoothed continuity.
pub fn evidence_signal(intensities: &[f64], continuity: &[f64]) -> Vec<f64> {
    intensities
        .iter()
        .zip(continuity)
        .map(|(i, c)| i * c)
        .collect()
}

/// Strict interior local minima.
pub fn find_valleys(signal: &[f64]) -> Vec<usize> {
    if signal.len() < 3 {
        return Vec::new();
    }
    (1..signal.len() - 1)
        .filter(|&i| signal[i] < signal[i - 1] && signal[i] < signal[i + 1])
        .collect()
}

/// Strict local maxima, boundaries included.
pub fn find_peaks(signal: &[f64]) -> Vec<usize> {
    let n = signal.len();
    (0..n)
        .filter(|&i| {
            let above_left = i == 0 || signal[i] > signal[i - 1];
            let above_right = i + 1 == n || signal[i] > signal[i + 1];
            above_left && above_right
        })
        .collect()
}

/// Index of the first maximum of a non-empty slice.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// One sweep over adjacent valley pairs. `None` when no pair is closer than `gap`.
fn merge_sweep(valleys: &[usize], evidence: &[f64], gap: usize) -> Option<(Vec<usize>, Vec<f64>)> {
    let mut evidence = evidence.to_vec();
    let mut merged = vec![false; valleys.len()];
    let mut replacements = Vec::new();

    for (k, pair) in valleys.windows(2).enumerate() {
        let (left, right) = (pair[0], pair[1]);
        if right - left >= gap {
            continue;
        }
        merged[k] = true;
        merged[k + 1] = true;
        let summit = left + argmax(&evidence[left..right]);
        let level = evidence[summit];
        evidence[left..=right].fill(level);
        replacements.push(summit);
    }

    if replacements.is_empty() {
        return None;
    }

    let mut out: Vec<usize> = valleys
        .iter()
        .zip(&merged)
        .filter_map(|(&v, &m)| (!m).then_some(v))
        .chain(replacements)
        .collect();
    out.sort_unstable();
    out.dedup();
    Some((out, evidence))
}

/// Merge close valleys until no adjacent pair is closer than `gap`.
///
/// `valleys` must be sorted and free of duplicates. Returns the surviving
/// valleys and the flattened evidence.
pub fn merge_close_valleys(valleys: &[usize], evidence: &[f64], gap: usize) -> (Vec<usize>, Vec<f64>) {
    let mut valleys = valleys.to_vec();
    let mut evidence = evidence.to_vec();
    // Every productive sweep removes at least one valley.
    while let Some((v, e)) = merge_sweep(&valleys, &evidence, gap) {
        valleys = v;
        evidence = e;
    }
    (valleys, evidence)
}

/// Value of the peak enclosing `valley` on one side.
fn side_peak(peaks: &[usize], evidence: &[f64], valley: usize, left: bool) -> Option<f64> {
    let nearest = if left {
        peaks.iter().copied().filter(|&p| p < valley).max()
    } else {
        peaks.iter().copied().filter(|&p| p > valley).min()
    };
    if let Some(p) = nearest {
        return Some(evidence[p]);
    }
    let side = if left {
        &evidence[..valley]
    } else {
        &evidence[valley + 1..]
    };
    side.iter().copied().reduce(f64::max)
}

/// Keep valleys whose depth relative to the lower enclosing peak is at least
/// `threshold`.
pub fn filter_shallow_valleys(
    valleys: &[usize],
    peaks: &[usize],
    evidence: &[f64],
    threshold: f64,
) -> Vec<usize> {
    valleys
        .iter()
        .copied()
        .filter(|&v| {
            let (Some(lp), Some(rp)) = (
                side_peak(peaks, evidence, v, true),
                side_peak(peaks, evidence, v, false),
            ) else {
                return false;
            };
            let peak = lp.min(rp);
            if peak <= 0.0 {
                return false;
            }
            let depth = (peak - evidence[v]) / peak;
            if depth < threshold {
                tracing::trace!(valley = v, depth, "discarding shallow valley");
                return false;
            }
            true
        })
        .collect()
}

/// Track indices at which a label-track should be cut.
pub fn detect_barriers(evidence: &[f64], params: &BarrierParams) -> Vec<usize> {
    let valleys = find_valleys(evidence);
    if valleys.is_empty() {
        return Vec::new();
    }
    let peaks = find_peaks(evidence);
    let (valleys, flattened) = merge_close_valleys(&valleys, evidence, params.merge_gap);
    filter_shallow_valleys(&valleys, &peaks, &flattened, params.depth_threshold)
}
