//! Fallback tiers for graceful degradation.
//!
//! A tier bundles the knobs the executor can trade away under resource
//! pressure: device class, numeric precision, input resolution, and the
//! batch-size ceiling. Tiers are totally ordered by `rank`; rank 0 is the
//! most capable and is always attempted first for a new session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric precision used for inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrecisionMode {
    /// Full precision (e.g. fp32).
    #[default]
    Full,
    /// Reduced precision (e.g. fp16/int8). Smaller memory footprint.
    Reduced,
}

impl PrecisionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrecisionMode::Full => "full",
            PrecisionMode::Reduced => "reduced",
        }
    }
}

impl fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where inference runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Dedicated accelerator (GPU or similar).
    #[default]
    Accelerator,
    /// Host CPU. Slowest, but not subject to accelerator memory limits.
    Host,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Accelerator => "accelerator",
            DeviceClass::Host => "host",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One degradation level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackTier {
    /// Position in the degradation ladder; 0 is most capable.
    pub rank: u8,
    /// Batch-size ceiling while this tier is active.
    pub batch_cap: usize,
    /// Numeric precision for inference at this tier.
    pub precision_mode: PrecisionMode,
    /// Longest-edge resolution cap in pixels, if the tier downscales input.
    pub resolution_cap: Option<u32>,
    /// Device the tier runs on.
    pub device_class: DeviceClass,
}

impl FallbackTier {
    /// Built-in four-tier ladder ending in a host-device tier, derived from
    /// the configured batch cap. Used when configuration supplies no tiers.
    pub fn default_ladder(max_batch: usize) -> Vec<FallbackTier> {
        let max_batch = max_batch.max(1);
        vec![
            FallbackTier {
                rank: 0,
                batch_cap: max_batch,
                precision_mode: PrecisionMode::Full,
                resolution_cap: None,
                device_class: DeviceClass::Accelerator,
            },
            FallbackTier {
                rank: 1,
                batch_cap: (max_batch / 2).max(1),
                precision_mode: PrecisionMode::Reduced,
                resolution_cap: Some(720),
                device_class: DeviceClass::Accelerator,
            },
            FallbackTier {
                rank: 2,
                batch_cap: (max_batch / 4).max(1),
                precision_mode: PrecisionMode::Reduced,
                resolution_cap: Some(480),
                device_class: DeviceClass::Accelerator,
            },
            FallbackTier {
                rank: 3,
                batch_cap: 1,
                precision_mode: PrecisionMode::Reduced,
                resolution_cap: Some(480),
                device_class: DeviceClass::Host,
            },
        ]
    }
}

impl fmt::Display for FallbackTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tier {} ({}/{}, cap {}, res {})",
            self.rank,
            self.device_class,
            self.precision_mode,
            self.batch_cap,
            self.resolution_cap
                .map(|r| r.to_string())
                .unwrap_or_else(|| "native".to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ladder_shape() {
        let ladder = FallbackTier::default_ladder(32);
        assert_eq!(ladder.len(), 4);
        for (i, tier) in ladder.iter().enumerate() {
            assert_eq!(tier.rank as usize, i);
            assert!(tier.batch_cap >= 1);
        }
        assert_eq!(ladder.last().unwrap().device_class, DeviceClass::Host);
    }

    #[test]
    fn test_default_ladder_caps_shrink() {
        let ladder = FallbackTier::default_ladder(32);
        for pair in ladder.windows(2) {
            assert!(pair[1].batch_cap <= pair[0].batch_cap);
        }
    }

    #[test]
    fn test_default_ladder_tiny_cap() {
        let ladder = FallbackTier::default_ladder(1);
        assert!(ladder.iter().all(|t| t.batch_cap == 1));
    }

    #[test]
    fn test_display() {
        let ladder = FallbackTier::default_ladder(8);
        assert_eq!(
            ladder[0].to_string(),
            "tier 0 (accelerator/full, cap 8, res native)"
        );
    }
}
