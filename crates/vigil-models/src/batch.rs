//! Batches and batch results.

use serde::{Deserialize, Serialize};

use crate::frame::{Detection, Frame};

/// An ordered, non-empty group of frames submitted together for inference.
///
/// Immutable once dispatched; ownership transfers to the executor for the
/// duration of the inference call.
#[derive(Debug, Clone)]
pub struct Batch {
    frames: Vec<Frame>,
}

impl Batch {
    /// Build a batch from ordered frames. Returns `None` for empty input;
    /// non-emptiness is a structural invariant.
    pub fn new(frames: Vec<Frame>) -> Option<Self> {
        if frames.is_empty() {
            None
        } else {
            Some(Self { frames })
        }
    }

    /// Number of frames in the batch. Always at least 1.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Batches are structurally non-empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Frames in submission order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Sequence index of the first frame.
    pub fn first_sequence(&self) -> u64 {
        self.frames[0].sequence
    }

    /// Consume the batch, yielding its frames in order.
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}

/// Outcome tag for a completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// All frames inferred at the tier the batch started on (OOM splits at
    /// the same tier included).
    Success,
    /// All frames inferred, but only after degrading to a less capable tier.
    PartialFailure,
    /// The batch could not be completed. Never attached to detections
    /// returned to the caller; used in attempt records and telemetry.
    Failure,
}

/// Result of processing one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Outcome tag.
    pub outcome: BatchOutcome,
    /// Per-frame detections in the original frame order. On `Success` and
    /// `PartialFailure` the length equals the input batch length.
    pub detections: Vec<Vec<Detection>>,
    /// Sequence indexes of the frames, parallel to `detections`.
    pub sequences: Vec<u64>,
    /// Rank of the tier the final unit of work completed on.
    pub completed_tier_rank: u8,
}

impl BatchResult {
    /// True when every frame produced a (possibly empty) detection list.
    pub fn is_complete(&self) -> bool {
        self.outcome != BatchOutcome::Failure
            && self.detections.len() == self.sequences.len()
    }
}
