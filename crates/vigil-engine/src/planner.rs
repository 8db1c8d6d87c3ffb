//! Content-aware frame-skip planning.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::debug;
use vigil_models::{ContentSignals, SkipPlan, MAX_STRIDE, MIN_STRIDE};

use crate::config::EngineConfig;

/// Decides how many frames to skip between submissions.
///
/// The planner holds the active [`SkipPlan`] plus the signals it was based
/// on, and recomputes when the signals move materially or when the plan
/// expires, whichever happens first.
pub struct FrameSkipPlanner {
    target_fps: f64,
    motion_high: f64,
    motion_low: f64,
    complexity_high: f64,
    replan_delta: f64,
    ttl: ChronoDuration,
    active: SkipPlan,
    basis: ContentSignals,
}

impl FrameSkipPlanner {
    pub fn new(config: &EngineConfig, original_fps: f64, now: DateTime<Utc>) -> Self {
        let ttl = ChronoDuration::from_std(config.skip_plan_ttl)
            .unwrap_or_else(|_| ChronoDuration::seconds(2));
        let basis = ContentSignals::default();
        let mut planner = Self {
            target_fps: config.target_fps,
            motion_high: config.motion_high_threshold,
            motion_low: config.motion_low_threshold,
            complexity_high: config.complexity_high_threshold,
            replan_delta: config.signal_replan_delta,
            ttl,
            active: SkipPlan::new(MIN_STRIDE, now),
            basis,
        };
        planner.active = planner.plan(original_fps, basis, now);
        planner
    }

    /// Active plan.
    pub fn active(&self) -> SkipPlan {
        self.active
    }

    /// Whether a frame with this sequence index is admitted under the
    /// active plan.
    pub fn admits(&self, sequence: u64) -> bool {
        self.active.admits(sequence)
    }

    /// Feed fresh signals. Recomputes the plan if the signals crossed the
    /// configured delta from the plan's basis or the plan expired. Returns
    /// the new plan when one was produced.
    pub fn observe(
        &mut self,
        original_fps: f64,
        signals: ContentSignals,
        now: DateTime<Utc>,
    ) -> Option<SkipPlan> {
        let moved = signals.max_delta(&self.basis) > self.replan_delta;
        if !moved && !self.active.expired(now) {
            return None;
        }
        let plan = self.plan(original_fps, signals, now);
        if plan.stride != self.active.stride {
            debug!(
                stride = plan.stride,
                motion = signals.motion_intensity,
                complexity = signals.scene_complexity,
                "skip plan updated"
            );
        }
        self.active = plan;
        self.basis = signals;
        Some(plan)
    }

    /// Pure stride computation from the source rate, the target rate, and
    /// the current content signals.
    pub fn plan(
        &self,
        original_fps: f64,
        signals: ContentSignals,
        now: DateTime<Utc>,
    ) -> SkipPlan {
        let base = (original_fps / self.target_fps).round().max(1.0) as u32;
        let mut stride = if signals.motion_intensity > self.motion_high {
            base.saturating_sub(1).max(MIN_STRIDE)
        } else if signals.motion_intensity < self.motion_low {
            base + 1
        } else {
            base
        };
        if signals.scene_complexity > self.complexity_high {
            stride = stride.saturating_sub(1).max(MIN_STRIDE);
        }
        SkipPlan::new(stride.clamp(MIN_STRIDE, MAX_STRIDE), now + self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner(original_fps: f64) -> FrameSkipPlanner {
        FrameSkipPlanner::new(&EngineConfig::default(), original_fps, Utc::now())
    }

    fn signals(motion: f64, complexity: f64) -> ContentSignals {
        ContentSignals::new(motion, complexity)
    }

    #[test]
    fn test_high_motion_densifies() {
        // base = round(30 / 10) = 3; motion 0.9 > 0.7 gives stride 2.
        let plan = planner(30.0).plan(30.0, signals(0.9, 0.5), Utc::now());
        assert_eq!(plan.stride, 2);
    }

    #[test]
    fn test_low_motion_sparsifies() {
        let plan = planner(30.0).plan(30.0, signals(0.1, 0.5), Utc::now());
        assert_eq!(plan.stride, 4);
    }

    #[test]
    fn test_complexity_densifies_further() {
        let plan = planner(30.0).plan(30.0, signals(0.5, 0.9), Utc::now());
        assert_eq!(plan.stride, 2);
    }

    #[test]
    fn test_stride_always_in_bounds() {
        for original_fps in [1.0, 10.0, 30.0, 60.0, 240.0] {
            for motion in [0.0, 0.2, 0.5, 0.8, 1.0] {
                for complexity in [0.0, 0.5, 0.9, 1.0] {
                    let plan = planner(original_fps).plan(
                        original_fps,
                        signals(motion, complexity),
                        Utc::now(),
                    );
                    assert!((MIN_STRIDE..=MAX_STRIDE).contains(&plan.stride));
                }
            }
        }
    }

    #[test]
    fn test_stride_never_below_one() {
        // base = 1 at matched rates; high motion and complexity cannot push
        // the stride under MIN_STRIDE.
        let plan = planner(10.0).plan(10.0, signals(1.0, 1.0), Utc::now());
        assert_eq!(plan.stride, MIN_STRIDE);
    }

    #[test]
    fn test_replan_on_material_delta() {
        let mut p = planner(30.0);
        // Default basis is zero signals; a small move does not replan.
        assert!(p.observe(30.0, signals(0.05, 0.05), Utc::now()).is_none());
        // A material move does.
        assert!(p.observe(30.0, signals(0.9, 0.1), Utc::now()).is_some());
        assert_eq!(p.active().stride, 2);
    }

    #[test]
    fn test_replan_on_expiry() {
        let mut p = planner(30.0);
        let later = Utc::now() + ChronoDuration::seconds(10);
        assert!(p.observe(30.0, signals(0.0, 0.0), later).is_some());
    }

    #[test]
    fn test_admission_follows_active_stride() {
        let p = planner(30.0);
        // Default signals are zero: motion below low threshold, base 3 + 1.
        assert_eq!(p.active().stride, 4);
        assert!(p.admits(0));
        assert!(!p.admits(2));
        assert!(p.admits(8));
    }
}
