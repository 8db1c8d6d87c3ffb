//! Adaptive batch-size policy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session-scoped batch-size policy tuned by the memory governor.
///
/// `min <= current <= max` holds at all times; every mutation clamps
/// internally so callers cannot break the invariant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSizePolicy {
    current: usize,
    min: usize,
    max: usize,
    /// When the policy last changed.
    pub last_adjusted_at: DateTime<Utc>,
}

impl BatchSizePolicy {
    /// Minimum batch size. A single frame is always dispatchable.
    pub const MIN: usize = 1;

    /// Create a policy with the given initial size and configured cap.
    /// Both are clamped into `[1, max]`.
    pub fn new(initial: usize, max: usize) -> Self {
        let max = max.max(Self::MIN);
        Self {
            current: initial.clamp(Self::MIN, max),
            min: Self::MIN,
            max,
            last_adjusted_at: Utc::now(),
        }
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> usize {
        self.max
    }

    /// Halve the target size under memory pressure. Returns true if the
    /// value changed.
    pub fn halve(&mut self) -> bool {
        self.set(self.current / 2)
    }

    /// Double the target size when headroom allows. Returns true if the
    /// value changed.
    pub fn double(&mut self) -> bool {
        self.set(self.current.saturating_mul(2))
    }

    /// Re-anchor the target size to a tier's batch cap after a fallback
    /// transition.
    pub fn apply_cap(&mut self, cap: usize) {
        self.set(cap);
    }

    fn set(&mut self, value: usize) -> bool {
        let clamped = value.clamp(self.min, self.max);
        if clamped != self.current {
            self.current = clamped;
            self.last_adjusted_at = Utc::now();
            true
        } else {
            false
        }
    }
}
