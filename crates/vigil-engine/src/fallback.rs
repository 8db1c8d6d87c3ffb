//! Tiered fallback state machine.
//!
//! Degradation tiers are held in rank order and the cursor only ever moves
//! forward, so "never skip a tier" is structural rather than a runtime
//! convention.

use tracing::warn;
use vigil_models::FallbackTier;

/// Result of an escalation request.
#[derive(Debug, PartialEq)]
pub enum Escalation<'a> {
    /// Advanced to the next-lower-capability tier; retry the failing unit
    /// once there.
    NextTier(&'a FallbackTier),
    /// Already at the least capable tier. Fatal for the session.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active(usize),
    Exhausted,
}

/// Holds the ordered degradation ladder and the active tier.
///
/// Every new session starts at rank 0. Tier transitions happen only through
/// [`FallbackOrchestrator::escalate`].
pub struct FallbackOrchestrator {
    tiers: Vec<FallbackTier>,
    state: State,
}

impl FallbackOrchestrator {
    /// Build from an ordered tier list. The list is assumed validated
    /// (non-empty, contiguous ranks) by [`crate::config::EngineConfig::validate`].
    pub fn new(tiers: Vec<FallbackTier>) -> Self {
        Self {
            tiers,
            state: State::Active(0),
        }
    }

    /// The active tier, or `None` once exhausted.
    pub fn current(&self) -> Option<&FallbackTier> {
        match self.state {
            State::Active(index) => self.tiers.get(index),
            State::Exhausted => None,
        }
    }

    /// True once every tier has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.state == State::Exhausted
    }

    /// Advance to the next tier, or transition to `Exhausted` when the
    /// ladder has no lower rung.
    pub fn escalate(&mut self) -> Escalation<'_> {
        match self.state {
            State::Exhausted => Escalation::Exhausted,
            State::Active(index) => {
                let next = index + 1;
                if next < self.tiers.len() {
                    self.state = State::Active(next);
                    let tier = &self.tiers[next];
                    warn!(%tier, "escalated to fallback tier");
                    Escalation::NextTier(tier)
                } else {
                    warn!("fallback ladder exhausted");
                    self.state = State::Exhausted;
                    Escalation::Exhausted
                }
            }
        }
    }
}
