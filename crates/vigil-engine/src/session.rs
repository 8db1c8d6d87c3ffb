//! Session pipeline: frame admission, batching, inference, governance.
//!
//! One producer stage (validate, analyze, plan, assemble) and one consumer
//! stage (execute, govern) connected by a bounded queue of completed
//! batches, decoupling frame-arrival jitter from inference latency. The
//! batch-size policy lives with the consumer; the producer reads the current
//! limit through a `watch` channel so there is no cross-task shared mutable
//! state.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, gauge};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vigil_models::{
    Batch, BatchResult, BatchSizePolicy, Frame, ProcessingAttempt, TelemetryEvent, TelemetryKind,
};

use crate::analyzer::ContentAnalyzer;
use crate::assembler::BatchAssembler;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::executor::InferenceExecutor;
use crate::fallback::FallbackOrchestrator;
use crate::governor::{MemoryGovernor, SizeAdjustment};
use crate::model::{AcceleratorControl, DetectionModel, DeviceLease};
use crate::planner::FrameSkipPlanner;
use crate::telemetry::MetricsSink;

/// Requests cooperative session shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Stop admitting frames, flush the partial batch, let the in-flight
    /// inference finish, release the device, and return.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Counters accumulated over a session's lifetime.
#[derive(Debug, Clone, Default)]
pub struct SessionSummary {
    pub frames_offered: u64,
    pub frames_dropped_invalid: u64,
    pub frames_skipped: u64,
    pub frames_admitted: u64,
    pub batches_completed: u64,
    /// Full processing-attempt history for diagnostics.
    pub attempts: Vec<ProcessingAttempt>,
}

#[derive(Debug, Default)]
struct ProducerStats {
    offered: u64,
    dropped_invalid: u64,
    skipped: u64,
    admitted: u64,
}

/// A single-device inference session over one frame stream.
pub struct InferenceSession {
    id: Uuid,
    config: EngineConfig,
    source_fps: f64,
    model: Arc<dyn DetectionModel>,
    accelerator: Arc<dyn AcceleratorControl>,
    sink: Arc<dyn MetricsSink>,
    lease: Option<DeviceLease>,
    shutdown: watch::Sender<bool>,
}

impl InferenceSession {
    /// Create a session. Validates configuration up front.
    pub fn new(
        config: EngineConfig,
        source_fps: f64,
        model: Arc<dyn DetectionModel>,
        accelerator: Arc<dyn AcceleratorControl>,
        sink: Arc<dyn MetricsSink>,
        lease: DeviceLease,
    ) -> EngineResult<Self> {
        config.validate()?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            id: lease.holder(),
            config,
            source_fps,
            model,
            accelerator,
            sink,
            lease: Some(lease),
            shutdown,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Handle for cancelling the session from outside `run`.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown.clone(),
        }
    }

    /// Drive the pipeline until the frame stream ends, shutdown is
    /// requested, or a terminal failure occurs.
    ///
    /// Batch results are emitted to `results` in dispatch order. The only
    /// session-terminating failures are `AllTiersExhausted`, a model
    /// contract violation, and the caller dropping the result receiver.
    pub async fn run(
        mut self,
        frames: mpsc::Receiver<Frame>,
        results: mpsc::Sender<BatchResult>,
    ) -> EngineResult<SessionSummary> {
        info!(
            session_id = %self.id,
            model = self.model.name(),
            source_fps = self.source_fps,
            target_fps = self.config.target_fps,
            "session starting"
        );

        let policy = BatchSizePolicy::new(
            self.config.initial_batch_size,
            self.config.max_batch_size,
        );
        let (limit_tx, limit_rx) = watch::channel(policy.current());
        let (batch_tx, batch_rx) = mpsc::channel::<Batch>(self.config.batch_queue_depth);

        let producer = tokio::spawn(producer_loop(
            self.id,
            self.config.clone(),
            self.source_fps,
            frames,
            batch_tx,
            limit_rx,
            self.shutdown.subscribe(),
            Arc::clone(&self.sink),
        ));

        // The lease is present by construction; run consumes it.
        let lease = self.lease.take().ok_or_else(|| EngineError::TaskJoin(
            "session lease already consumed".to_string(),
        ))?;
        let mut executor =
            InferenceExecutor::new(Arc::clone(&self.model), Arc::clone(&self.sink), self.id, lease);

        let consumed = self
            .consume_batches(batch_rx, results, &mut executor, policy, limit_tx)
            .await;

        // Unblock the producer if it is still waiting on frames after a
        // terminal consumer failure.
        let _ = self.shutdown.send(true);

        // Release accelerator resources before returning, on every path.
        self.accelerator.clear_cache().await;
        self.sink.record(TelemetryEvent::new(
            TelemetryKind::CacheClear,
            self.id,
            json!({ "reason": "session_end" }),
        ));

        let stats = match producer.await {
            Ok(stats) => stats,
            Err(e) => return Err(EngineError::TaskJoin(e.to_string())),
        };
        let batches_completed = consumed?;

        let summary = SessionSummary {
            frames_offered: stats.offered,
            frames_dropped_invalid: stats.dropped_invalid,
            frames_skipped: stats.skipped,
            frames_admitted: stats.admitted,
            batches_completed,
            attempts: executor.attempts().to_vec(),
        };
        info!(
            session_id = %self.id,
            frames_offered = summary.frames_offered,
            frames_admitted = summary.frames_admitted,
            batches_completed = summary.batches_completed,
            "session finished"
        );
        Ok(summary)
    }

    /// Consumer stage: serialized inference plus memory governance between
    /// dispatches.
    async fn consume_batches(
        &self,
        mut batch_rx: mpsc::Receiver<Batch>,
        results: mpsc::Sender<BatchResult>,
        executor: &mut InferenceExecutor,
        mut policy: BatchSizePolicy,
        limit_tx: watch::Sender<usize>,
    ) -> EngineResult<u64> {
        let governor = MemoryGovernor::new(&self.config);
        let mut fallback = FallbackOrchestrator::new(self.config.tiers.clone());
        let mut completed = 0u64;

        while let Some(batch) = batch_rx.recv().await {
            let batch_size = batch.len();
            let result = match executor.execute(batch, &mut fallback, &mut policy).await {
                Ok(result) => result,
                Err(e) => {
                    error!(session_id = %self.id, error = %e, "terminal batch failure");
                    return Err(e);
                }
            };
            completed += 1;
            counter!("vigil_batches_completed_total").increment(1);
            self.sink.record(TelemetryEvent::new(
                TelemetryKind::BatchCompleted,
                self.id,
                json!({
                    "batch_size": batch_size,
                    "outcome": result.outcome,
                    "tier_rank": result.completed_tier_rank,
                }),
            ));

            // Advisory retune between dispatches; the policy is never
            // touched while a call is in flight.
            let sample = self.accelerator.memory_sample().await;
            let verdict = governor.assess(&sample, &mut policy);
            gauge!("vigil_batch_size_target").set(policy.current() as f64);
            if verdict.adjustment == SizeAdjustment::Halved {
                self.sink.record(TelemetryEvent::new(
                    TelemetryKind::MemoryPressure,
                    self.id,
                    json!({ "utilization": verdict.utilization }),
                ));
            }
            if verdict.cache_clear {
                self.accelerator.clear_cache().await;
                self.sink.record(TelemetryEvent::new(
                    TelemetryKind::CacheClear,
                    self.id,
                    json!({ "utilization": verdict.utilization }),
                ));
            }
            let _ = limit_tx.send(policy.current());

            if results.send(result).await.is_err() {
                warn!(session_id = %self.id, "result receiver dropped, stopping");
                return Err(EngineError::ResultChannelClosed);
            }
        }

        Ok(completed)
    }
}

/// Producer stage: validation, content analysis, skip planning, and
/// time-bounded batch assembly.
#[allow(clippy::too_many_arguments)]
async fn producer_loop(
    session_id: Uuid,
    config: EngineConfig,
    source_fps: f64,
    mut frames: mpsc::Receiver<Frame>,
    batch_tx: mpsc::Sender<Batch>,
    limit_rx: watch::Receiver<usize>,
    mut shutdown: watch::Receiver<bool>,
    sink: Arc<dyn MetricsSink>,
) -> ProducerStats {
    let mut analyzer = ContentAnalyzer::new(config.analyzer_window, config.analyzer_cadence);
    let mut planner = FrameSkipPlanner::new(&config, source_fps, Utc::now());
    let mut assembler = BatchAssembler::new(config.max_wait);
    let mut stats = ProducerStats::default();

    loop {
        let deadline = assembler.deadline();
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    debug!(session_id = %session_id, "shutdown requested, flushing");
                    break;
                }
            }
            maybe_frame = frames.recv() => {
                let Some(frame) = maybe_frame else {
                    debug!(session_id = %session_id, "frame stream ended, flushing");
                    break;
                };
                stats.offered += 1;
                if let Err(reason) = frame.validate() {
                    stats.dropped_invalid += 1;
                    counter!("vigil_frames_dropped_total").increment(1);
                    warn!(session_id = %session_id, %reason, "dropping invalid frame");
                    sink.record(TelemetryEvent::new(
                        TelemetryKind::FrameDropped,
                        session_id,
                        json!({ "sequence": frame.sequence, "reason": reason.to_string() }),
                    ));
                    continue;
                }
                if !planner.admits(frame.sequence) {
                    stats.skipped += 1;
                    continue;
                }
                stats.admitted += 1;
                if let Some(signals) = analyzer.observe(&frame) {
                    if let Some(plan) = planner.observe(source_fps, signals, Utc::now()) {
                        sink.record(TelemetryEvent::new(
                            TelemetryKind::SkipPlanUpdated,
                            session_id,
                            json!({
                                "stride": plan.stride,
                                "motion_intensity": signals.motion_intensity,
                                "scene_complexity": signals.scene_complexity,
                            }),
                        ));
                    }
                }
                let limit = *limit_rx.borrow();
                if let Some(batch) = assembler.offer(frame, limit) {
                    if batch_tx.send(batch).await.is_err() {
                        return stats;
                    }
                }
            }
            _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                if let Some(batch) = assembler.expire(Instant::now()) {
                    debug!(
                        session_id = %session_id,
                        batch_size = batch.len(),
                        "max wait elapsed, dispatching partial batch"
                    );
                    if batch_tx.send(batch).await.is_err() {
                        return stats;
                    }
                }
            }
        }
    }

    // Shutdown or end of stream: the partial batch still gets processed.
    if let Some(batch) = assembler.flush() {
        let _ = batch_tx.send(batch).await;
    }
    stats
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        // Guarded out by `if deadline.is_some()`; never completes.
        None => std::future::pending().await,
    }
}
