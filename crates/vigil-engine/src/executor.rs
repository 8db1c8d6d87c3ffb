//! Inference execution with split-and-retry OOM recovery.
//!
//! Recovery is an explicit iterative work-stack rather than recursion:
//! any OOM on a splittable unit pushes two halves back onto the stack, so
//! every failure strictly reduces the unit of work and the retry state
//! stays inspectable. Unsplittable failures escalate through the fallback
//! orchestrator.

use std::sync::Arc;

use metrics::counter;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use vigil_models::{
    AttemptOutcome, Batch, BatchOutcome, BatchResult, BatchSizePolicy, BatchSpan, Detection,
    Frame, ProcessingAttempt, TelemetryEvent, TelemetryKind,
};

use crate::error::{EngineError, EngineResult};
use crate::fallback::{Escalation, FallbackOrchestrator};
use crate::model::{DetectionModel, DeviceLease, InferenceFault};
use crate::telemetry::MetricsSink;

/// One pending unit of work: a contiguous slice of the original batch.
struct WorkUnit {
    /// Offset of the unit's first frame within the original batch.
    offset: usize,
    frames: Vec<Frame>,
}

impl WorkUnit {
    fn span(&self) -> BatchSpan {
        BatchSpan {
            first_sequence: self.frames[0].sequence,
            len: self.frames.len(),
        }
    }

    /// Split into `ceil(n/2)` and `floor(n/2)` halves. Caller guarantees
    /// `n > 1`.
    fn split(self) -> (WorkUnit, WorkUnit) {
        let mid = self.frames.len().div_ceil(2);
        let mut left_frames = self.frames;
        let right_frames = left_frames.split_off(mid);
        let right = WorkUnit {
            offset: self.offset + mid,
            frames: right_frames,
        };
        let left = WorkUnit {
            offset: self.offset,
            frames: left_frames,
        };
        (left, right)
    }
}

/// Submits batches to the detection model under the active fallback tier.
///
/// Holds the session's append-only attempt log and the exclusive device
/// lease; exactly one inference call is in flight at a time.
pub struct InferenceExecutor {
    model: Arc<dyn DetectionModel>,
    sink: Arc<dyn MetricsSink>,
    session_id: Uuid,
    lease: DeviceLease,
    attempts: Vec<ProcessingAttempt>,
}

impl InferenceExecutor {
    pub fn new(
        model: Arc<dyn DetectionModel>,
        sink: Arc<dyn MetricsSink>,
        session_id: Uuid,
        lease: DeviceLease,
    ) -> Self {
        Self {
            model,
            sink,
            session_id,
            lease,
            attempts: Vec::new(),
        }
    }

    /// Session-scoped attempt history.
    pub fn attempts(&self) -> &[ProcessingAttempt] {
        &self.attempts
    }

    /// Process one batch to completion.
    ///
    /// Returns a full-length, ordered [`BatchResult`] or
    /// [`EngineError::AllTiersExhausted`] once escalation has nowhere left
    /// to go. Never returns partial detections.
    pub async fn execute(
        &mut self,
        batch: Batch,
        fallback: &mut FallbackOrchestrator,
        policy: &mut BatchSizePolicy,
    ) -> EngineResult<BatchResult> {
        let total = batch.len();
        let sequences: Vec<u64> = batch.frames().iter().map(|f| f.sequence).collect();
        debug!(
            session_id = %self.session_id,
            lease_holder = %self.lease.holder(),
            batch_size = total,
            first_sequence = batch.first_sequence(),
            "dispatching batch"
        );

        let mut slots: Vec<Option<Vec<Detection>>> = Vec::new();
        slots.resize_with(total, || None);
        let mut stack = vec![WorkUnit {
            offset: 0,
            frames: batch.into_frames(),
        }];
        let mut escalations = 0u32;
        let mut completed_rank = 0u8;

        while let Some(unit) = stack.pop() {
            let tier = match fallback.current() {
                Some(tier) => tier.clone(),
                None => {
                    return Err(EngineError::AllTiersExhausted {
                        attempts: self.attempts.clone(),
                    })
                }
            };
            let span = unit.span();

            match self
                .model
                .infer(&unit.frames, tier.precision_mode, tier.resolution_cap)
                .await
            {
                Ok(detections) => {
                    self.log_attempt(span, tier.rank, AttemptOutcome::Succeeded, None);
                    if detections.len() != unit.frames.len() {
                        return Err(EngineError::ModelContract {
                            expected: unit.frames.len(),
                            got: detections.len(),
                        });
                    }
                    for (i, frame_detections) in detections.into_iter().enumerate() {
                        slots[unit.offset + i] = Some(frame_detections);
                    }
                    completed_rank = completed_rank.max(tier.rank);
                }
                Err(InferenceFault::OutOfMemory) if unit.frames.len() > 1 => {
                    self.log_attempt(span, tier.rank, AttemptOutcome::OutOfMemory, None);
                    counter!("vigil_oom_splits_total").increment(1);
                    let len = unit.frames.len();
                    let (left, right) = unit.split();
                    debug!(
                        session_id = %self.session_id,
                        unit_size = len,
                        left = left.frames.len(),
                        right = right.frames.len(),
                        tier_rank = tier.rank,
                        "OOM, splitting unit"
                    );
                    self.sink.record(TelemetryEvent::new(
                        TelemetryKind::BatchSplit,
                        self.session_id,
                        json!({
                            "unit_size": len,
                            "tier_rank": tier.rank,
                        }),
                    ));
                    // Left half processed first to keep the attempt log in
                    // frame order.
                    stack.push(right);
                    stack.push(left);
                }
                Err(fault) => {
                    let outcome = match fault {
                        InferenceFault::OutOfMemory => AttemptOutcome::OutOfMemory,
                        InferenceFault::Device(_) => AttemptOutcome::DeviceError,
                    };
                    self.log_attempt(span, tier.rank, outcome, Some(fault.to_string()));
                    match fallback.escalate() {
                        Escalation::NextTier(next) => {
                            counter!("vigil_tier_escalations_total").increment(1);
                            escalations += 1;
                            policy.apply_cap(next.batch_cap);
                            warn!(
                                session_id = %self.session_id,
                                from_rank = tier.rank,
                                to_rank = next.rank,
                                fault = %fault,
                                "escalating failing unit to next tier"
                            );
                            self.sink.record(TelemetryEvent::new(
                                TelemetryKind::TierEscalated,
                                self.session_id,
                                json!({
                                    "from_rank": tier.rank,
                                    "to_rank": next.rank,
                                    "fault": fault.to_string(),
                                }),
                            ));
                            // Retry the same unit once at the new tier; a
                            // further failure escalates again.
                            stack.push(unit);
                        }
                        Escalation::Exhausted => {
                            self.sink.record(TelemetryEvent::new(
                                TelemetryKind::SessionExhausted,
                                self.session_id,
                                json!({ "attempts": self.attempts.len() }),
                            ));
                            return Err(EngineError::AllTiersExhausted {
                                attempts: self.attempts.clone(),
                            });
                        }
                    }
                }
            }
        }

        // Every slot was filled: units partition the batch and each success
        // writes its full range.
        let detections: Vec<Vec<Detection>> = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_default())
            .collect();
        let outcome = if escalations == 0 {
            BatchOutcome::Success
        } else {
            BatchOutcome::PartialFailure
        };

        Ok(BatchResult {
            outcome,
            detections,
            sequences,
            completed_tier_rank: completed_rank,
        })
    }

    fn log_attempt(
        &mut self,
        span: BatchSpan,
        tier_rank: u8,
        outcome: AttemptOutcome,
        error_detail: Option<String>,
    ) {
        self.attempts
            .push(ProcessingAttempt::new(span, tier_rank, outcome, error_detail));
    }
}
