//! Accelerator memory samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time reading of accelerator memory.
///
/// `total_bytes > 0` is an invariant of the sampling capability. `used_bytes`
/// may transiently exceed `total_bytes` due to sampling skew; consumers
/// tolerate this rather than assert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemorySample {
    /// Bytes currently allocated on the device.
    pub used_bytes: u64,
    /// Total device memory in bytes.
    pub total_bytes: u64,
    /// When the sample was taken.
    pub sampled_at: DateTime<Utc>,
}

impl MemorySample {
    /// Create a sample taken now.
    pub fn now(used_bytes: u64, total_bytes: u64) -> Self {
        Self {
            used_bytes,
            total_bytes,
            sampled_at: Utc::now(),
        }
    }

    /// Fraction of device memory in use. May exceed 1.0 under sampling skew.
    pub fn utilization(&self) -> f64 {
        self.used_bytes as f64 / self.total_bytes as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utilization() {
        let sample = MemorySample::now(3, 6);
        assert!((sample.utilization() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_utilization_tolerates_skew() {
        let sample = MemorySample::now(7, 6);
        assert!(sample.utilization() > 1.0);
    }
}
