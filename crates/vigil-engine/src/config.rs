//! Engine configuration.
//!
//! All thresholds the pipeline steers by are heuristic constants carried
//! here as named, overridable options rather than literals in component
//! code. `from_env` follows the `VIGIL_*` environment variables; `validate`
//! rejects configurations the pipeline cannot honor.

use std::time::Duration;
use thiserror::Error;
use vigil_models::{DeviceClass, FallbackTier};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("tier list must not be empty")]
    EmptyTierList,

    #[error("tier list must end with a host-device tier")]
    MissingHostTier,

    #[error("tier ranks must be contiguous from 0, found rank {found} at position {position}")]
    NonContiguousRanks { position: usize, found: u8 },

    #[error("memory thresholds must satisfy low < high <= critical, got {low}/{high}/{critical}")]
    ThresholdOrder { low: f64, high: f64, critical: f64 },

    #[error("{name} must be positive")]
    NonPositive { name: &'static str },
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Target processing rate the skip planner aims for.
    pub target_fps: f64,
    /// Batch-size target at session start.
    pub initial_batch_size: usize,
    /// Hard batch-size ceiling.
    pub max_batch_size: usize,
    /// Utilization above which the batch-size target is halved.
    pub memory_high_threshold: f64,
    /// Utilization below which the batch-size target may double.
    pub memory_low_threshold: f64,
    /// Utilization above which an accelerator cache clear is requested.
    pub memory_critical_threshold: f64,
    /// Longest a partial batch may wait before dispatch.
    pub max_wait: Duration,
    /// Ordered degradation ladder. Must end with a host-device tier.
    pub tiers: Vec<FallbackTier>,
    /// Frames kept in the content-analysis window.
    pub analyzer_window: usize,
    /// Admitted frames between signal recomputations.
    pub analyzer_cadence: u64,
    /// Per-signal change that forces a skip-plan recompute before expiry.
    pub signal_replan_delta: f64,
    /// Skip-plan validity.
    pub skip_plan_ttl: Duration,
    /// Motion intensity above which sampling densifies.
    pub motion_high_threshold: f64,
    /// Motion intensity below which sampling sparsifies.
    pub motion_low_threshold: f64,
    /// Scene complexity above which sampling densifies further.
    pub complexity_high_threshold: f64,
    /// Depth of the completed-batch queue between producer and consumer.
    pub batch_queue_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let max_batch_size = 32;
        Self {
            target_fps: 10.0,
            initial_batch_size: 8,
            max_batch_size,
            memory_high_threshold: 0.85,
            memory_low_threshold: 0.5,
            memory_critical_threshold: 0.9,
            max_wait: Duration::from_millis(100),
            tiers: FallbackTier::default_ladder(max_batch_size),
            analyzer_window: 12,
            analyzer_cadence: 4,
            signal_replan_delta: 0.15,
            skip_plan_ttl: Duration::from_secs(2),
            motion_high_threshold: 0.7,
            motion_low_threshold: 0.3,
            complexity_high_threshold: 0.8,
            batch_queue_depth: 2,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_batch_size = env_parse("VIGIL_MAX_BATCH_SIZE", defaults.max_batch_size);
        Self {
            target_fps: env_parse("VIGIL_TARGET_FPS", defaults.target_fps),
            initial_batch_size: env_parse("VIGIL_INITIAL_BATCH_SIZE", defaults.initial_batch_size),
            max_batch_size,
            memory_high_threshold: env_parse(
                "VIGIL_MEMORY_HIGH_THRESHOLD",
                defaults.memory_high_threshold,
            ),
            memory_low_threshold: env_parse(
                "VIGIL_MEMORY_LOW_THRESHOLD",
                defaults.memory_low_threshold,
            ),
            memory_critical_threshold: env_parse(
                "VIGIL_MEMORY_CRITICAL_THRESHOLD",
                defaults.memory_critical_threshold,
            ),
            max_wait: Duration::from_millis(env_parse("VIGIL_MAX_WAIT_MS", 100u64)),
            tiers: FallbackTier::default_ladder(max_batch_size),
            analyzer_window: env_parse("VIGIL_ANALYZER_WINDOW", defaults.analyzer_window),
            analyzer_cadence: env_parse("VIGIL_ANALYZER_CADENCE", defaults.analyzer_cadence),
            signal_replan_delta: env_parse(
                "VIGIL_SIGNAL_REPLAN_DELTA",
                defaults.signal_replan_delta,
            ),
            skip_plan_ttl: Duration::from_millis(env_parse("VIGIL_SKIP_PLAN_TTL_MS", 2000u64)),
            motion_high_threshold: env_parse(
                "VIGIL_MOTION_HIGH_THRESHOLD",
                defaults.motion_high_threshold,
            ),
            motion_low_threshold: env_parse(
                "VIGIL_MOTION_LOW_THRESHOLD",
                defaults.motion_low_threshold,
            ),
            complexity_high_threshold: env_parse(
                "VIGIL_COMPLEXITY_HIGH_THRESHOLD",
                defaults.complexity_high_threshold,
            ),
            batch_queue_depth: env_parse("VIGIL_BATCH_QUEUE_DEPTH", defaults.batch_queue_depth),
        }
    }

    /// Reject configurations the pipeline cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiers.is_empty() {
            return Err(ConfigError::EmptyTierList);
        }
        for (position, tier) in self.tiers.iter().enumerate() {
            if tier.rank as usize != position {
                return Err(ConfigError::NonContiguousRanks {
                    position,
                    found: tier.rank,
                });
            }
        }
        match self.tiers.last() {
            Some(tier) if tier.device_class == DeviceClass::Host => {}
            _ => return Err(ConfigError::MissingHostTier),
        }
        if !(self.memory_low_threshold < self.memory_high_threshold
            && self.memory_high_threshold <= self.memory_critical_threshold)
        {
            return Err(ConfigError::ThresholdOrder {
                low: self.memory_low_threshold,
                high: self.memory_high_threshold,
                critical: self.memory_critical_threshold,
            });
        }
        if self.target_fps <= 0.0 {
            return Err(ConfigError::NonPositive { name: "target_fps" });
        }
        if self.max_batch_size == 0 {
            return Err(ConfigError::NonPositive {
                name: "max_batch_size",
            });
        }
        if self.analyzer_window == 0 {
            return Err(ConfigError::NonPositive {
                name: "analyzer_window",
            });
        }
        if self.analyzer_cadence == 0 {
            return Err(ConfigError::NonPositive {
                name: "analyzer_cadence",
            });
        }
        if self.batch_queue_depth == 0 {
            return Err(ConfigError::NonPositive {
                name: "batch_queue_depth",
            });
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_models::PrecisionMode;

    #[test]
    fn test_default_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_empty_tier_list_rejected() {
        let config = EngineConfig {
            tiers: Vec::new(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::EmptyTierList));
    }

    #[test]
    fn test_missing_host_tier_rejected() {
        let mut config = EngineConfig::default();
        config.tiers.pop();
        assert_eq!(config.validate(), Err(ConfigError::MissingHostTier));
    }

    #[test]
    fn test_non_contiguous_ranks_rejected() {
        let mut config = EngineConfig::default();
        config.tiers[1].rank = 5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonContiguousRanks { position: 1, found: 5 })
        ));
    }

    #[test]
    fn test_threshold_order_rejected() {
        let config = EngineConfig {
            memory_low_threshold: 0.9,
            memory_high_threshold: 0.85,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdOrder { .. })
        ));
    }

    #[test]
    fn test_single_host_tier_accepted() {
        let config = EngineConfig {
            tiers: vec![FallbackTier {
                rank: 0,
                batch_cap: 1,
                precision_mode: PrecisionMode::Reduced,
                resolution_cap: Some(480),
                device_class: DeviceClass::Host,
            }],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
