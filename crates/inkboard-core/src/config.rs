//! Engine tunables.
//!
//! Every threshold used by the interactive core lives here. Hosts either use
//! [`EngineConfig::default`] or hand in a JSON document; absent keys fall back
//! to the defaults below.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Distance past which an arrow end detaches from its target.
pub const MAX_ARROW_LIMIT: f64 = 20.0;
/// Pointer-to-edge distance for attachment suggestions.
pub const SNAP_THRESHOLD: f64 = 10.0;
/// Pointer-to-shape distance for the eraser.
pub const ERASER_THRESHOLD: f64 = 10.0;
/// Minimum time between attachment suggestion recomputations.
pub const SUGGESTION_INTERVAL_MS: u64 = 100;
/// A box shape is committable once either side exceeds this.
pub const MIN_SHAPE_EXTENT: f64 = 4.0;
/// An arrow is committable once its first segment exceeds this.
pub const MIN_ARROW_LENGTH: f64 = 20.0;
pub const MIN_FREEHAND_POINTS: usize = 3;
/// Floor applied to width/height when a resize is normalized.
pub const MIN_NORMALIZED_SIZE: f64 = 5.0;
/// Display opacity of shapes selected for deletion.
pub const PENDING_DELETE_OPACITY: f64 = 0.5;
/// Maximum number of undo states to keep.
pub const MAX_UNDO_HISTORY: usize = 50;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {field}: {value}")]
    Invalid { field: &'static str, value: f64 },
}

/// Tunables for the whiteboard core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_arrow_limit: f64,
    pub snap_threshold: f64,
    pub eraser_threshold: f64,
    pub suggestion_interval_ms: u64,
    pub min_shape_extent: f64,
    pub min_arrow_length: f64,
    pub min_freehand_points: usize,
    pub min_normalized_size: f64,
    pub pending_delete_opacity: f64,
    pub max_undo_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_arrow_limit: MAX_ARROW_LIMIT,
            snap_threshold: SNAP_THRESHOLD,
            eraser_threshold: ERASER_THRESHOLD,
            suggestion_interval_ms: SUGGESTION_INTERVAL_MS,
            min_shape_extent: MIN_SHAPE_EXTENT,
            min_arrow_length: MIN_ARROW_LENGTH,
            min_freehand_points: MIN_FREEHAND_POINTS,
            min_normalized_size: MIN_NORMALIZED_SIZE,
            pending_delete_opacity: PENDING_DELETE_OPACITY,
            max_undo_history: MAX_UNDO_HISTORY,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject negative or non-finite distances and out-of-range opacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let distances = [
            ("max_arrow_limit", self.max_arrow_limit),
            ("snap_threshold", self.snap_threshold),
            ("eraser_threshold", self.eraser_threshold),
            ("min_shape_extent", self.min_shape_extent),
            ("min_arrow_length", self.min_arrow_length),
            ("min_normalized_size", self.min_normalized_size),
        ];
        for (field, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid { field, value });
            }
        }
        if !(0.0..=1.0).contains(&self.pending_delete_opacity) {
            return Err(ConfigError::Invalid {
                field: "pending_delete_opacity",
                value: self.pending_delete_opacity,
            });
        }
        Ok(())
    }

    pub fn suggestion_interval(&self) -> Duration {
        Duration::from_millis(self.suggestion_interval_ms)
    }

    pub fn commit_thresholds(&self) -> CommitThresholds {
        CommitThresholds {
            min_shape_extent: self.min_shape_extent,
            min_arrow_length: self.min_arrow_length,
            min_freehand_points: self.min_freehand_points,
        }
    }
}

/// Minimum extents a drawn shape must reach before it can be committed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommitThresholds {
    pub min_shape_extent: f64,
    pub min_arrow_length: f64,
    pub min_freehand_points: usize,
}

impl Default for CommitThresholds {
    fn default() -> Self {
        EngineConfig::default().commit_thresholds()
    }
}
