//! End-to-end pipeline tests with scripted external capabilities.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use vigil_engine::{
    AcceleratorControl, DetectionModel, DeviceLease, EngineConfig, EngineError, InferenceFault,
    InferenceSession, MetricsSink, SessionSummary,
};
use vigil_models::{
    BatchOutcome, BatchResult, BoundingBox, Detection, Frame, MemorySample, PrecisionMode,
    TelemetryEvent, TelemetryKind,
};

/// Model that pops one scripted fault per call, succeeding once the script
/// runs dry. Successful calls return one detection per frame tagged with
/// the frame's sequence.
struct ScriptedModel {
    script: Mutex<Vec<InferenceFault>>,
    call_sizes: Mutex<Vec<usize>>,
}

impl ScriptedModel {
    fn clean() -> Self {
        Self::with_script(Vec::new())
    }

    fn with_script(script: Vec<InferenceFault>) -> Self {
        Self {
            script: Mutex::new(script),
            call_sizes: Mutex::new(Vec::new()),
        }
    }

    fn call_sizes(&self) -> Vec<usize> {
        self.call_sizes.lock().unwrap().clone()
    }
}

#[async_trait]
impl DetectionModel for ScriptedModel {
    async fn infer(
        &self,
        frames: &[Frame],
        _precision: PrecisionMode,
        _resolution_cap: Option<u32>,
    ) -> Result<Vec<Vec<Detection>>, InferenceFault> {
        self.call_sizes.lock().unwrap().push(frames.len());
        let next = {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                None
            } else {
                Some(script.remove(0))
            }
        };
        if let Some(fault) = next {
            return Err(fault);
        }
        Ok(frames
            .iter()
            .map(|frame| {
                vec![Detection {
                    label: "loitering".to_string(),
                    confidence: 0.8,
                    bbox: BoundingBox {
                        x: frame.sequence as f32,
                        y: 0.0,
                        width: 1.0,
                        height: 1.0,
                    },
                }]
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Accelerator reporting a fixed utilization; counts cache clears.
struct FakeAccelerator {
    utilization: f64,
    clears: AtomicUsize,
}

impl FakeAccelerator {
    fn with_utilization(utilization: f64) -> Self {
        Self {
            utilization,
            clears: AtomicUsize::new(0),
        }
    }

    fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AcceleratorControl for FakeAccelerator {
    async fn memory_sample(&self) -> MemorySample {
        MemorySample::now((self.utilization * 1000.0) as u64, 1000)
    }

    async fn clear_cache(&self) {
        self.clears.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink collecting every event for later inspection.
#[derive(Default)]
struct CollectingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl CollectingSink {
    fn kinds(&self) -> Vec<TelemetryKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind).collect()
    }
}

impl MetricsSink for CollectingSink {
    fn record(&self, event: TelemetryEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn frame(sequence: u64) -> Frame {
    Frame::new(sequence, 64, 64, vec![128u8; 64 * 64])
}

fn invalid_frame(sequence: u64) -> Frame {
    Frame::new(sequence, 64, 64, vec![128u8; 10])
}

/// Run a session over the given frames and collect everything it emits.
async fn run_session(
    config: EngineConfig,
    source_fps: f64,
    model: Arc<ScriptedModel>,
    accelerator: Arc<FakeAccelerator>,
    sink: Arc<CollectingSink>,
    frames: Vec<Frame>,
) -> (Result<SessionSummary, EngineError>, Vec<BatchResult>) {
    let session_id = Uuid::new_v4();
    let session = InferenceSession::new(
        config,
        source_fps,
        model,
        accelerator,
        sink,
        DeviceLease::exclusive(session_id),
    )
    .unwrap();

    let (frame_tx, frame_rx) = mpsc::channel(frames.len().max(1));
    let (result_tx, mut result_rx) = mpsc::channel(4);
    let run = tokio::spawn(session.run(frame_rx, result_tx));

    for f in frames {
        frame_tx.send(f).await.unwrap();
    }
    drop(frame_tx);

    let mut results = Vec::new();
    while let Some(result) = result_rx.recv().await {
        results.push(result);
    }
    (run.await.unwrap(), results)
}

/// Stride-1 config so every offered frame is admitted.
fn dense_config() -> EngineConfig {
    EngineConfig {
        motion_low_threshold: 0.0,
        ..Default::default()
    }
}

#[tokio::test]
async fn end_to_end_results_are_ordered_and_complete() {
    // 30 fps source, 10 fps target, zero-motion frames: stride 4.
    let model = Arc::new(ScriptedModel::clean());
    let accelerator = Arc::new(FakeAccelerator::with_utilization(0.7));
    let sink = Arc::new(CollectingSink::default());

    let frames: Vec<Frame> = (0..40).map(frame).collect();
    let (summary, results) = run_session(
        EngineConfig::default(),
        30.0,
        Arc::clone(&model),
        accelerator,
        sink,
        frames,
    )
    .await;

    let summary = summary.unwrap();
    assert_eq!(summary.frames_offered, 40);
    assert_eq!(summary.frames_admitted, 10);
    assert_eq!(summary.frames_skipped, 30);
    assert_eq!(summary.frames_dropped_invalid, 0);

    let sequences: Vec<u64> = results.iter().flat_map(|r| r.sequences.clone()).collect();
    let expected: Vec<u64> = (0..10).map(|i| i * 4).collect();
    assert_eq!(sequences, expected);
    for result in &results {
        assert_eq!(result.outcome, BatchOutcome::Success);
        assert_eq!(result.detections.len(), result.sequences.len());
    }
    assert_eq!(summary.batches_completed, results.len() as u64);
}

#[tokio::test]
async fn oom_batch_splits_and_recovers_in_order() {
    // First inference call (size 8) OOMs; both size-4 halves succeed.
    let model = Arc::new(ScriptedModel::with_script(vec![InferenceFault::OutOfMemory]));
    let accelerator = Arc::new(FakeAccelerator::with_utilization(0.7));
    let sink = Arc::new(CollectingSink::default());

    let frames: Vec<Frame> = (0..8).map(frame).collect();
    let (summary, results) = run_session(
        dense_config(),
        10.0,
        Arc::clone(&model),
        accelerator,
        Arc::clone(&sink),
        frames,
    )
    .await;

    summary.unwrap();
    assert_eq!(model.call_sizes(), vec![8, 4, 4]);
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.outcome, BatchOutcome::Success);
    assert_eq!(result.detections.len(), 8);
    for (i, per_frame) in result.detections.iter().enumerate() {
        assert_eq!(per_frame[0].bbox.x, i as f32);
    }
    assert!(sink.kinds().contains(&TelemetryKind::BatchSplit));
}

#[tokio::test]
async fn invalid_frames_are_dropped_without_aborting() {
    let model = Arc::new(ScriptedModel::clean());
    let accelerator = Arc::new(FakeAccelerator::with_utilization(0.7));
    let sink = Arc::new(CollectingSink::default());

    let mut frames: Vec<Frame> = (0..8).map(frame).collect();
    frames.insert(3, invalid_frame(100));
    frames.insert(6, invalid_frame(101));

    let (summary, results) = run_session(
        dense_config(),
        10.0,
        model,
        accelerator,
        Arc::clone(&sink),
        frames,
    )
    .await;

    let summary = summary.unwrap();
    assert_eq!(summary.frames_dropped_invalid, 2);
    assert_eq!(summary.frames_admitted, 8);
    let total: usize = results.iter().map(|r| r.sequences.len()).sum();
    assert_eq!(total, 8);
    assert!(sink.kinds().contains(&TelemetryKind::FrameDropped));
}

#[tokio::test]
async fn device_errors_on_every_tier_are_fatal_with_full_log() {
    // Default ladder has 4 tiers; a device error on each exhausts them all.
    let model = Arc::new(ScriptedModel::with_script(vec![
        InferenceFault::Device("t0".to_string()),
        InferenceFault::Device("t1".to_string()),
        InferenceFault::Device("t2".to_string()),
        InferenceFault::Device("t3".to_string()),
    ]));
    let accelerator = Arc::new(FakeAccelerator::with_utilization(0.7));
    let sink = Arc::new(CollectingSink::default());

    let frames: Vec<Frame> = (0..8).map(frame).collect();
    let (outcome, results) = run_session(
        dense_config(),
        10.0,
        model,
        Arc::clone(&accelerator),
        Arc::clone(&sink),
        frames,
    )
    .await;

    assert!(results.is_empty());
    match outcome {
        Err(EngineError::AllTiersExhausted { attempts }) => {
            assert_eq!(attempts.len(), 4);
            let ranks: Vec<u8> = attempts.iter().map(|a| a.tier_rank).collect();
            assert_eq!(ranks, vec![0, 1, 2, 3]);
        }
        other => panic!("expected AllTiersExhausted, got {other:?}"),
    }
    assert!(sink.kinds().contains(&TelemetryKind::SessionExhausted));
    // Device released even on the fatal path.
    assert!(accelerator.clears() >= 1);
}

#[tokio::test]
async fn memory_pressure_halves_next_batch() {
    // Utilization 0.93: every governance pass halves the target and
    // requests a cache clear.
    let model = Arc::new(ScriptedModel::clean());
    let accelerator = Arc::new(FakeAccelerator::with_utilization(0.93));
    let sink = Arc::new(CollectingSink::default());

    let frames: Vec<Frame> = (0..12).map(frame).collect();
    let (summary, results) = run_session(
        dense_config(),
        10.0,
        Arc::clone(&model),
        Arc::clone(&accelerator),
        Arc::clone(&sink),
        frames,
    )
    .await;

    summary.unwrap();
    // First batch fills to the initial target of 8; the remaining 4 frames
    // can never exceed the halved target.
    let sizes: Vec<usize> = results.iter().map(|r| r.sequences.len()).collect();
    assert_eq!(sizes.iter().sum::<usize>(), 12);
    assert_eq!(sizes[0], 8);
    assert!(sizes[1..].iter().all(|&s| s <= 4));
    // Critical pressure cache clears plus the final release.
    assert!(accelerator.clears() >= 2);
    assert!(sink.kinds().contains(&TelemetryKind::MemoryPressure));
    assert!(sink.kinds().contains(&TelemetryKind::CacheClear));
}

#[tokio::test]
async fn shutdown_flushes_partial_batch_and_returns() {
    let model = Arc::new(ScriptedModel::clean());
    let accelerator = Arc::new(FakeAccelerator::with_utilization(0.7));
    let sink = Arc::new(CollectingSink::default());

    let config = EngineConfig {
        // Long max-wait so only shutdown can flush the partial batch.
        max_wait: Duration::from_secs(30),
        ..dense_config()
    };
    let session_id = Uuid::new_v4();
    let session = InferenceSession::new(
        config,
        10.0,
        model,
        accelerator,
        sink,
        DeviceLease::exclusive(session_id),
    )
    .unwrap();
    let handle = session.shutdown_handle();

    let (frame_tx, frame_rx) = mpsc::channel(8);
    let (result_tx, mut result_rx) = mpsc::channel(4);
    let run = tokio::spawn(session.run(frame_rx, result_tx));

    frame_tx.send(frame(0)).await.unwrap();
    frame_tx.send(frame(1)).await.unwrap();
    // Partial batch of 2 is buffered; the stream stays open.
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.shutdown();

    let result = result_rx.recv().await.expect("flushed batch result");
    assert_eq!(result.sequences, vec![0, 1]);
    assert!(result_rx.recv().await.is_none());

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.frames_admitted, 2);
    assert_eq!(summary.batches_completed, 1);

    // Source still open; the session must have returned regardless.
    drop(frame_tx);
}
