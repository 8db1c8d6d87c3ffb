//! Content signals and frame-skip plans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Smallest allowed skip stride (every frame admitted).
pub const MIN_STRIDE: u32 = 1;

/// Largest allowed skip stride.
pub const MAX_STRIDE: u32 = 10;

/// Lightweight per-segment signals derived from a window of recent frames.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentSignals {
    /// Normalized inter-frame difference magnitude in `[0, 1]`.
    pub motion_intensity: f64,
    /// Normalized spatial detail (edge density) in `[0, 1]`.
    pub scene_complexity: f64,
}

impl ContentSignals {
    pub fn new(motion_intensity: f64, scene_complexity: f64) -> Self {
        Self {
            motion_intensity: motion_intensity.clamp(0.0, 1.0),
            scene_complexity: scene_complexity.clamp(0.0, 1.0),
        }
    }

    /// Largest per-signal difference from another reading. Used to decide
    /// whether a skip plan needs recomputing.
    pub fn max_delta(&self, other: &ContentSignals) -> f64 {
        (self.motion_intensity - other.motion_intensity)
            .abs()
            .max((self.scene_complexity - other.scene_complexity).abs())
    }
}

/// An active frame-skipping decision.
///
/// A frame is admitted iff `sequence % stride == 0`. Recomputed when the
/// window's signals move materially or when `valid_until` elapses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkipPlan {
    /// Frames between two admitted frames, in `[MIN_STRIDE, MAX_STRIDE]`.
    pub stride: u32,
    /// Wall-clock expiry of this plan.
    pub valid_until: DateTime<Utc>,
}

impl SkipPlan {
    /// Build a plan, clamping the stride into its legal range.
    pub fn new(stride: u32, valid_until: DateTime<Utc>) -> Self {
        Self {
            stride: stride.clamp(MIN_STRIDE, MAX_STRIDE),
            valid_until,
        }
    }

    /// Whether a frame with this sequence index is admitted.
    pub fn admits(&self, sequence: u64) -> bool {
        sequence % self.stride as u64 == 0
    }

    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_until
    }
}
