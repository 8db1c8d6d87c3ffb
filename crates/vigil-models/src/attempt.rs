//! Processing-attempt records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The slice of a batch an attempt covered, identified by the first frame's
/// sequence index and the number of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSpan {
    pub first_sequence: u64,
    pub len: usize,
}

/// How one inference attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    OutOfMemory,
    DeviceError,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Succeeded => "succeeded",
            AttemptOutcome::OutOfMemory => "out_of_memory",
            AttemptOutcome::DeviceError => "device_error",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of one inference call, kept per session for
/// diagnostics and surfaced whole when every tier is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingAttempt {
    /// The unit of work the attempt covered.
    pub span: BatchSpan,
    /// Rank of the tier the attempt ran on.
    pub tier_rank: u8,
    /// How the attempt ended.
    pub outcome: AttemptOutcome,
    /// Device-reported detail for failed attempts.
    pub error_detail: Option<String>,
    /// When the attempt completed.
    pub at: DateTime<Utc>,
}

impl ProcessingAttempt {
    pub fn new(
        span: BatchSpan,
        tier_rank: u8,
        outcome: AttemptOutcome,
        error_detail: Option<String>,
    ) -> Self {
        Self {
            span,
            tier_rank,
            outcome,
            error_detail,
            at: Utc::now(),
        }
    }
}
