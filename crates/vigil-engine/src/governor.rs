//! Memory-pressure governance of the batch-size target.
//!
//! Advisory tuning between dispatches; the hard guarantee against OOM lives
//! in the executor's split-and-retry path.

use tracing::{debug, warn};
use vigil_models::{BatchSizePolicy, MemorySample};

use crate::config::EngineConfig;

/// Direction the governor moved the batch-size target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeAdjustment {
    Halved,
    Doubled,
    Unchanged,
}

/// Outcome of one governance pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GovernorVerdict {
    pub adjustment: SizeAdjustment,
    /// Utilization the verdict was based on.
    pub utilization: f64,
    /// Request an accelerator cache clear before the next dispatch.
    pub cache_clear: bool,
}

/// Periodically retunes [`BatchSizePolicy`] from accelerator memory samples.
pub struct MemoryGovernor {
    high_threshold: f64,
    low_threshold: f64,
    critical_threshold: f64,
}

impl MemoryGovernor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            high_threshold: config.memory_high_threshold,
            low_threshold: config.memory_low_threshold,
            critical_threshold: config.memory_critical_threshold,
        }
    }

    /// Fold a fresh sample into the policy.
    pub fn assess(&self, sample: &MemorySample, policy: &mut BatchSizePolicy) -> GovernorVerdict {
        let utilization = sample.utilization();
        let adjustment = if utilization > self.high_threshold {
            if policy.halve() {
                debug!(
                    utilization,
                    current = policy.current(),
                    "memory pressure, batch target halved"
                );
            }
            SizeAdjustment::Halved
        } else if utilization < self.low_threshold && policy.current() < policy.max() {
            policy.double();
            debug!(
                utilization,
                current = policy.current(),
                "memory headroom, batch target doubled"
            );
            SizeAdjustment::Doubled
        } else {
            SizeAdjustment::Unchanged
        };

        let cache_clear = utilization > self.critical_threshold;
        if cache_clear {
            warn!(utilization, "critical memory pressure, cache clear requested");
        }

        GovernorVerdict {
            adjustment,
            utilization,
            cache_clear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::MemorySample;

    fn governor() -> MemoryGovernor {
        MemoryGovernor::new(&EngineConfig::default())
    }

    fn sample(used: u64, total: u64) -> MemorySample {
        MemorySample::now(used, total)
    }

    #[test]
    fn test_critical_sample_halves_and_clears() {
        // used 5.6 GiB of 6.0 GiB, utilization ~0.93.
        let mut policy = BatchSizePolicy::new(8, 32);
        let verdict = governor().assess(&sample(5_600, 6_000), &mut policy);
        assert_eq!(verdict.adjustment, SizeAdjustment::Halved);
        assert_eq!(policy.current(), 4);
        assert!(verdict.cache_clear);
    }

    #[test]
    fn test_high_but_not_critical_halves_without_clear() {
        let mut policy = BatchSizePolicy::new(8, 32);
        let verdict = governor().assess(&sample(88, 100), &mut policy);
        assert_eq!(verdict.adjustment, SizeAdjustment::Halved);
        assert_eq!(policy.current(), 4);
        assert!(!verdict.cache_clear);
    }

    #[test]
    fn test_low_utilization_doubles() {
        let mut policy = BatchSizePolicy::new(8, 32);
        let verdict = governor().assess(&sample(20, 100), &mut policy);
        assert_eq!(verdict.adjustment, SizeAdjustment::Doubled);
        assert_eq!(policy.current(), 16);
    }

    #[test]
    fn test_low_utilization_at_max_unchanged() {
        let mut policy = BatchSizePolicy::new(32, 32);
        let verdict = governor().assess(&sample(20, 100), &mut policy);
        assert_eq!(verdict.adjustment, SizeAdjustment::Unchanged);
        assert_eq!(policy.current(), 32);
    }

    #[test]
    fn test_mid_band_unchanged() {
        let mut policy = BatchSizePolicy::new(8, 32);
        let verdict = governor().assess(&sample(70, 100), &mut policy);
        assert_eq!(verdict.adjustment, SizeAdjustment::Unchanged);
        assert_eq!(policy.current(), 8);
    }

    #[test]
    fn test_high_utilization_never_grows_target() {
        let governor = governor();
        let mut policy = BatchSizePolicy::new(32, 32);
        for used in [86, 90, 99, 120] {
            let previous = policy.current();
            governor.assess(&sample(used, 100), &mut policy);
            assert!(policy.current() <= previous);
            assert!(policy.current() >= policy.min());
        }
        assert_eq!(policy.current(), 2);
    }

    #[test]
    fn test_skewed_sample_tolerated() {
        // used > total: transient sampling skew must not panic and reads
        // as extreme pressure.
        let mut policy = BatchSizePolicy::new(8, 32);
        let verdict = governor().assess(&sample(110, 100), &mut policy);
        assert!(verdict.cache_clear);
        assert_eq!(policy.current(), 4);
    }
}
