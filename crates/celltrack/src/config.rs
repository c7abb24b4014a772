//! Run-wide configuration for segmentation post-processing and tracking.

use std::path::Path;

use crate::geometry::OverlapMode;

/// Pixel size of the reference microscope in microns.
pub const DEFAULT_XY_RESOLUTION: f64 = 0.2767553;

/// Per-volume labeling and merged-cell correction parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Maximum centroid distance (microns) between a cell and its donor on
    /// the previous plane.
    pub distance_th_z: f64,
    /// Physical size of one pixel in xy (microns).
    pub xy_resolution: f64,
    /// Overlap normalization used by the continuity scorer.
    pub overlap_mode: OverlapMode,
    /// Score every plane pair of a label-track. When false only earlier
    /// planes are scored and later entries stay zero.
    pub full_overlap_matrix: bool,
    /// Radius (in track indices) of the continuity smoothing window.
    pub z_neighborhood: usize,
    /// Minimum relative valley depth for a split point to be accepted.
    pub overlap_gradient_th: f64,
    /// Valleys closer than this many track indices are merged.
    pub valley_merge_gap: usize,
    /// Number of detect-and-split passes run before the short-track filter.
    pub barrier_passes: usize,
    /// Label-tracks spanning fewer planes than this are removed.
    pub min_track_planes: usize,
    /// Outlines are densified to at least this many points.
    pub min_outline_length: usize,
    /// Neighborhood size (self included) for ordering hand-drawn points.
    pub neighbors_for_sequence_sorting: usize,
    /// Seed for the start point of the boundary walk.
    pub sequence_seed: u64,
}

impl SegmentationConfig {
    /// Centroid distance threshold expressed in pixels.
    pub fn distance_th_px(&self) -> f64 {
        (self.distance_th_z / self.xy_resolution).round()
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            distance_th_z: 3.0,
            xy_resolution: DEFAULT_XY_RESOLUTION,
            overlap_mode: OverlapMode::Absolute,
            full_overlap_matrix: true,
            z_neighborhood: 2,
            overlap_gradient_th: 0.3,
            valley_merge_gap: 5,
            barrier_passes: 2,
            min_track_planes: 2,
            min_outline_length: 200,
            neighbors_for_sequence_sorting: 7,
            sequence_seed: 0,
        }
    }
}

/// Frame-to-frame matching parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Physical size of one pixel in xy (microns).
    pub xy_resolution: f64,
    /// Pairs whose z positions differ by more than this many planes are gated.
    pub z_gate_planes: f64,
    /// Mutual nearest neighbors farther apart than this (microns) stay unmatched.
    pub max_match_distance: f64,
    /// Distance written into gated entries of the distance matrix.
    pub gated_distance: f64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            xy_resolution: DEFAULT_XY_RESOLUTION,
            z_gate_planes: 2.0,
            max_match_distance: 7.5,
            gated_distance: 100.0,
        }
    }
}

/// Errors raised while loading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The file is not valid configuration JSON.
    Parse(serde_json::Error),
    /// A parameter is outside its valid range.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read config: {}", e),
            Self::Parse(e) => write!(f, "cannot parse config: {}", e),
            Self::Invalid(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}

/// Full configuration for a tracking run.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CellTrackConfig {
    pub segmentation: SegmentationConfig,
    pub tracking: TrackingConfig,
}

impl CellTrackConfig {
    /// Load a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&data)
    }

    /// Parse a configuration from a JSON string. Missing fields keep their defaults.
    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(data).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let seg = &self.segmentation;
        if !(seg.xy_resolution.is_finite() && seg.xy_resolution > 0.0) {
            return Err(ConfigError::Invalid(
                "segmentation.xy_resolution must be finite and positive".to_string(),
            ));
        }
        if !(self.tracking.xy_resolution.is_finite() && self.tracking.xy_resolution > 0.0) {
            return Err(ConfigError::Invalid(
                "tracking.xy_resolution must be finite and positive".to_string(),
            ));
        }
        if seg.valley_merge_gap == 0 {
            return Err(ConfigError::Invalid(
                "segmentation.valley_merge_gap must be at least 1".to_string(),
            ));
        }
        if seg.neighbors_for_sequence_sorting < 2 {
            return Err(ConfigError::Invalid(
                "segmentation.neighbors_for_sequence_sorting must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_threshold_in_pixels() {
        let cfg = SegmentationConfig::default();
        // 3.0 / 0.2767553 = 10.84
        assert_eq!(cfg.distance_th_px(), 11.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = CellTrackConfig::from_json_str(
            r#"{ "segmentation": { "overlap_mode": "relative", "z_neighborhood": 3 } }"#,
        )
        .expect("partial config must parse");
        assert_eq!(cfg.segmentation.overlap_mode, OverlapMode::Relative);
        assert_eq!(cfg.segmentation.z_neighborhood, 3);
        assert_eq!(cfg.segmentation.valley_merge_gap, 5);
        assert_eq!(cfg.tracking.max_match_distance, 7.5);
    }

    #[test]
    fn rejects_non_positive_resolution() {
        let err = CellTrackConfig::from_json_str(r#"{ "tracking": { "xy_resolution": 0.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = CellTrackConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
