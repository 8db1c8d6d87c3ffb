//! Adaptive accelerator-bound batch inference engine.
//!
//! Processes an ordered stream of video frames through a behavior-detection
//! model while maximizing accelerator utilization and degrading gracefully
//! under resource pressure. This crate provides:
//! - Content-aware frame skipping (analyzer + planner)
//! - Time-bounded batch assembly with an adaptive size policy
//! - Memory-pressure governance of the batch-size target
//! - An inference executor with split-and-retry OOM recovery
//! - A tiered fallback orchestrator (device, precision, resolution, cap)
//! - A session pipeline wiring the stages with bounded queues and
//!   graceful shutdown

pub mod analyzer;
pub mod assembler;
pub mod config;
pub mod error;
pub mod executor;
pub mod fallback;
pub mod governor;
pub mod model;
pub mod planner;
pub mod session;
pub mod telemetry;

pub use analyzer::ContentAnalyzer;
pub use assembler::BatchAssembler;
pub use config::{ConfigError, EngineConfig};
pub use error::{EngineError, EngineResult};
pub use executor::InferenceExecutor;
pub use fallback::{Escalation, FallbackOrchestrator};
pub use governor::{GovernorVerdict, MemoryGovernor, SizeAdjustment};
pub use model::{AcceleratorControl, DetectionModel, DeviceLease, InferenceFault};
pub use planner::FrameSkipPlanner;
pub use session::{InferenceSession, SessionSummary, ShutdownHandle};
pub use telemetry::{ChannelSink, MetricsSink, NullSink, TracingSink};
