//! External capability traits.
//!
//! These traits are the seams to collaborators this engine does not own:
//! the detection model, the accelerator's memory/cache controls, and the
//! arbiter that serializes device access across sessions.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use vigil_models::{Detection, Frame, MemorySample, PrecisionMode};

/// Failure modes an inference call can report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InferenceFault {
    /// Accelerator resource exhaustion. Recoverable by splitting the unit
    /// of work or degrading the tier.
    #[error("accelerator out of memory")]
    OutOfMemory,

    /// Driver or device failure unrelated to memory. Never retried at the
    /// same tier.
    #[error("device error: {0}")]
    Device(String),
}

/// The external behavior-detection model.
///
/// Implementations must preserve frame order: output index `i` corresponds
/// to input frame `i`.
#[async_trait]
pub trait DetectionModel: Send + Sync {
    /// Run inference over ordered frames under the given tier constraints.
    async fn infer(
        &self,
        frames: &[Frame],
        precision: PrecisionMode,
        resolution_cap: Option<u32>,
    ) -> Result<Vec<Vec<Detection>>, InferenceFault>;

    /// Model name for logging.
    fn name(&self) -> &'static str;
}

/// Accelerator memory sampling and cache control.
#[async_trait]
pub trait AcceleratorControl: Send + Sync {
    /// Take a fresh memory reading. `total_bytes > 0` is the implementor's
    /// invariant.
    async fn memory_sample(&self) -> MemorySample;

    /// Release cached allocations. Invoked under critical memory pressure
    /// and when a session releases the device.
    async fn clear_cache(&self);
}

/// Exclusive-access token for the accelerator.
///
/// Memory accounting assumes serialized device access, so exactly one
/// inference call may be in flight per lease. Sessions sharing one device
/// obtain leases from an external arbiter; a sole session may mint its own.
#[derive(Debug)]
pub struct DeviceLease {
    holder: Uuid,
}

impl DeviceLease {
    /// Mint a lease for a session that has the device to itself.
    pub fn exclusive(holder: Uuid) -> Self {
        Self { holder }
    }

    /// Session currently holding the device.
    pub fn holder(&self) -> Uuid {
        self.holder
    }
}
